//! HTTP surface for adfs-bridge.
//!
//! This crate mounts the ADFS sign-in flow on an Axum router:
//!
//! - `GET /auth/adfs` starts a sign-in and redirects to the provider.
//! - `GET|POST /auth/adfs.callback` completes it and sets the session cookie.
//! - `GET /auth/adfs.config` describes the provider to the login page.
//! - `GET|POST /logout` ends the session.
//!
//! The three `/auth/adfs*` routes exist only when the integration is fully
//! configured; `/logout` is always available.

pub mod routes;
pub mod server;
pub mod state;

pub use server::{WebServer, router};
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
    /// Take the requester IP from `X-Forwarded-For` (set behind a reverse
    /// proxy that overwrites the header).
    pub trust_proxy: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
            secure_cookies: false,
            trust_proxy: false,
        }
    }
}
