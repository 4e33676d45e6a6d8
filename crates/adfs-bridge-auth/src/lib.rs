//! ADFS single sign-on for adfs-bridge.
//!
//! This crate signs users in against an ADFS (or other OIDC-compatible)
//! identity provider and maps them onto internal accounts:
//!
//! - **Token client** ([`AdfsClient`]): authorization-code exchange and
//!   refresh-token rotation against `{base}/adfs/oauth2/token`
//! - **Identity callback** ([`IdentityCallback`]): validates the profile,
//!   derives the team from the email domain and calls the provisioner
//! - **Strategy** ([`AdfsStrategy`]): starts and completes the handshake,
//!   guarding it with a single-use `state`
//! - **Logout** ([`perform_logout`]): ends the session and picks the
//!   provider logout page
//!
//! Accounts, sessions and team lookup are external collaborators behind the
//! traits in [`traits`]; [`memory`] provides in-process versions.
//!
//! # Architecture
//!
//! ```text
//! AdfsStrategy
//! ├── AdfsClient        (token endpoint, JWT payload decoding)
//! ├── StateStore        (handshake state, moka TTL cache)
//! └── IdentityCallback
//!     ├── TeamResolver
//!     └── AccountProvisioner
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use adfs_bridge_auth::{AdfsConfig, AdfsStrategy, MemoryAccounts, MemoryStateStore};
//!
//! # fn example() -> adfs_bridge_auth::error::Result<()> {
//! let config = AdfsConfig::from_env()?;
//! let accounts = Arc::new(MemoryAccounts::new());
//! let strategy = AdfsStrategy::from_config(
//!     &config,
//!     Arc::new(MemoryStateStore::new()),
//!     accounts.clone(),
//!     accounts,
//! )?;
//! println!("callback: {}", strategy.callback_url());
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod claims;
pub mod config;
pub mod email;
pub mod error;
pub mod logout;
pub mod memory;
pub mod oauth;
pub mod state;
pub mod strategy;
pub mod traits;
pub mod types;

// Re-export key types at the crate root for convenience.
pub use callback::{CallbackSettings, IdentityCallback};
pub use claims::{Profile, decode_payload, resolve_claim};
pub use config::{AdfsConfig, Credentials, PROVIDER_ID};
pub use error::{AuthError, BoxError, Result};
pub use logout::{LogoutSettings, logout_destination, perform_logout};
pub use memory::{MemoryAccounts, MemorySessions, SESSION_IDLE_TTL};
pub use oauth::{AdfsClient, TokenGrant, TokenSet};
pub use state::{HandshakeState, MemoryStateStore, StateStore};
pub use strategy::{AdfsStrategy, CallbackParams};
pub use traits::{AccountProvisioner, NoTeamResolver, SessionStore, TeamResolver};
pub use types::{AuthenticationResult, Client, ProvisionOutcome, ProvisionRequest, RequestContext};
