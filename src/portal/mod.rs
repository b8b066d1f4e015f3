//! Portal Client & Session Manager (§4.A).
//!
//! Speaks the Stalker/MAC portal JSON-over-HTTP protocol for exactly one
//! `(portal_url, mac)` pair, the way the teacher's `XtreamSourceHandler`
//! speaks the sibling Xtream Codes protocol for one `(url, username,
//! password)` triple: constructed per call, short-lived, with a dedicated
//! `reqwest::Client` carrying the configured timeout and optional proxy.

pub mod client;
pub mod protocol;
pub mod retry;

pub use client::PortalClient;
pub use protocol::{PortalProfile, RawChannel, RawGenre};
