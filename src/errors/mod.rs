//! Centralized error handling.
//!
//! Mirrors the error taxonomy in the error-handling design: portal-protocol
//! errors, catalog/repository errors, EPG parse errors and web-layer errors
//! all roll up into [`AppError`].

pub mod types;

pub use types::*;

/// Convenience alias for results returned across the crate boundary.
pub type AppResult<T> = Result<T, AppError>;
