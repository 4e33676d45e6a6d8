//! CLI argument definitions for adfs-bridge.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use clap::{Parser, Subcommand};

/// adfs-bridge -- ADFS single sign-on for a web application.
#[derive(Parser)]
#[command(
    name = "adfs-bridge",
    version,
    about = "adfs-bridge -- ADFS single sign-on bridge",
    long_about = "Signs users in against an ADFS identity provider, maps them onto teams \
                  by email domain and rotates their access tokens. Configuration is read \
                  from the environment and an optional .env file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server with the sign-in and logout routes.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on.
        #[arg(long, short, default_value_t = 3000)]
        port: u16,

        /// Mark the session cookie `Secure` (use behind HTTPS).
        #[arg(long)]
        secure_cookies: bool,

        /// Trust `X-Forwarded-For` for the requester IP (use behind a
        /// reverse proxy).
        #[arg(long)]
        trust_proxy: bool,
    },

    /// Show the resolved ADFS configuration.
    Status,

    /// Exchange a refresh token for a new access token.
    Rotate {
        /// The current access token.
        #[arg(long, default_value = "")]
        access_token: String,

        /// The refresh token to redeem.
        #[arg(long)]
        refresh_token: String,

        /// Token endpoint to use instead of `{ADFS_URI}/adfs/oauth2/token`.
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Print the claims carried by an access token (no signature check).
    Decode {
        /// The JWT to decode.
        token: String,

        /// Print only this dotted claim path.
        #[arg(long, short)]
        claim: Option<String>,
    },
}
