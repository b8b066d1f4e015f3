//! Error type definitions.
//!
//! `PortalError` is the protocol-facing taxonomy from the portal client
//! design; `CatalogError` and `EpgError` cover the durable stores; `WebError`
//! is what the HTTP surface converts everything into.

use thiserror::Error;

/// Top-level application error.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Portal error: {0}")]
    Portal(#[from] PortalError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("EPG error: {0}")]
    Epg(#[from] EpgError),

    #[error("Web error: {0}")]
    Web(#[from] WebError),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Operation already in progress: {operation_type} on {resource}")]
    OperationInProgress {
        operation_type: String,
        resource: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }
}

/// Errors surfaced by the portal client (§4.A / §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// Network/transport failure. Retried by the client up to the retry budget.
    #[error("portal unreachable: {0}")]
    Unreachable(String),

    /// Protocol-level auth failure (bad token, missing field). Never retried.
    #[error("portal auth failed: {0}")]
    AuthFailed(String),

    /// HTTP 429/503. Retried with backoff.
    #[error("portal throttled: {0}")]
    Throttled(String),

    /// Portal returned a sentinel null/empty `cmd` for a channel.
    #[error("portal returned no stream link for channel {channel_id}")]
    NoLink { channel_id: String },
}

impl PortalError {
    /// Only these two kinds get retried per the retry policy in §4.A.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PortalError::Unreachable(_) | PortalError::Throttled(_))
    }
}

/// Errors from the catalog store (§4.B) and its repositories.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A concurrent write attempt on the same portal; the caller should
    /// coalesce rather than fail the refresh (§7).
    #[error("concurrent refresh already in progress for portal {portal_id}")]
    Conflict { portal_id: String },

    #[error("portal not found: {0}")]
    PortalNotFound(String),

    #[error("channel not found: {portal_id}/{channel_id}")]
    ChannelNotFound {
        portal_id: String,
        channel_id: String,
    },
}

/// Errors from EPG ingestion (§4.E / §7).
#[derive(Error, Debug)]
pub enum EpgError {
    #[error("fetch failed for source {source_id}: {message}")]
    FetchFailed { source_id: String, message: String },

    /// A malformed XMLTV element; the element is skipped, not the whole feed.
    #[error("parse error in source {source_id} at {context}: {message}")]
    ParseError {
        source_id: String,
        context: String,
        message: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Web-layer errors, converted to HTTP responses at the edge.
#[derive(Error, Debug)]
pub enum WebError {
    #[error("invalid request: {field} - {message}")]
    InvalidRequest { field: String, message: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Maps to HTTP 409 — a concurrent refresh already in progress
    /// (`CatalogConflict`/`OperationInProgress` in §7), not a client error.
    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("all MACs exhausted for {portal_id}/{channel_id}")]
    StreamUnavailable {
        portal_id: String,
        channel_id: String,
    },

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl From<AppError> for WebError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation { message } => WebError::InvalidRequest {
                field: "request".to_string(),
                message,
            },
            AppError::NotFound { resource, .. } => WebError::NotFound { resource },
            AppError::Catalog(CatalogError::Conflict { portal_id }) => WebError::Conflict {
                message: format!("refresh already in progress for portal {portal_id}"),
            },
            AppError::Catalog(CatalogError::PortalNotFound(portal_id)) => WebError::NotFound {
                resource: format!("portal {portal_id}"),
            },
            AppError::Catalog(CatalogError::ChannelNotFound { portal_id, channel_id }) => {
                WebError::NotFound {
                    resource: format!("channel {portal_id}/{channel_id}"),
                }
            }
            AppError::OperationInProgress {
                operation_type,
                resource,
            } => WebError::Conflict {
                message: format!("{operation_type} already in progress on {resource}"),
            },
            other => WebError::Upstream(other.to_string()),
        }
    }
}
