//! Small ambient helpers shared across the web and job layers.

use sea_orm::{ConnectionTrait, DatabaseConnection};

/// Removes trailing slashes and ensures a scheme is present, defaulting to
/// `http://` when the caller didn't supply one.
pub fn sanitize_base_url(base_url: &str) -> String {
    let mut url = base_url.trim().trim_end_matches('/').to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{url}");
    }
    url
}

/// `PUBLIC_HOST` wins when configured; otherwise falls back to the request's
/// `Host` header (§4.G, §4.F). Both are passed through [`sanitize_base_url`]
/// so callers never have to special-case a trailing slash or missing scheme.
pub fn resolve_base_url(public_host: &str, host_header: Option<&str>) -> String {
    let raw = if !public_host.trim().is_empty() {
        public_host
    } else {
        host_header.unwrap_or("")
    };
    sanitize_base_url(raw)
}

/// A lightweight readiness probe backing `GET /health` — `ping()`
/// round-trips a trivial query through the pool without touching any table.
pub async fn database_ready(db: &DatabaseConnection) -> bool {
    db.ping().await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_trailing_slash_and_adds_scheme() {
        assert_eq!(sanitize_base_url("localhost:8080/"), "http://localhost:8080");
        assert_eq!(sanitize_base_url("https://example.com/"), "https://example.com");
    }

    #[test]
    fn resolve_prefers_public_host_over_header() {
        assert_eq!(
            resolve_base_url("proxy.example.com", Some("internal:8080")),
            "http://proxy.example.com"
        );
    }

    #[test]
    fn resolve_falls_back_to_host_header() {
        assert_eq!(resolve_base_url("", Some("192.168.1.5:8080")), "http://192.168.1.5:8080");
    }

    #[test]
    fn resolve_with_neither_yields_bare_scheme() {
        assert_eq!(resolve_base_url("", None), "http://");
    }
}
