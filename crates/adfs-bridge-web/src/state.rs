//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers. Everything in it is immutable after startup; the collaborators
//! handle their own synchronisation.

use std::sync::Arc;

use adfs_bridge_auth::{
    AccountProvisioner, AdfsConfig, AdfsStrategy, LogoutSettings, MemoryAccounts,
    MemorySessions, MemoryStateStore, SessionStore, StateStore, TeamResolver,
};

use crate::WebConfig;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Web server configuration.
    pub config: WebConfig,

    /// ADFS integration settings.
    pub adfs: Arc<AdfsConfig>,

    /// Sign-in strategy; `None` when the integration is not configured.
    pub strategy: Option<AdfsStrategy>,

    /// Session persistence.
    pub sessions: Arc<dyn SessionStore>,

    /// Where to send the browser after logout.
    pub logout: LogoutSettings,
}

impl AppState {
    /// Build the state from configuration and collaborators.
    ///
    /// The strategy is only assembled when [`AdfsConfig::is_enabled`] holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy cannot be built from an enabled
    /// configuration.
    pub fn new(
        config: WebConfig,
        adfs: AdfsConfig,
        states: Arc<dyn StateStore>,
        provisioner: Arc<dyn AccountProvisioner>,
        teams: Arc<dyn TeamResolver>,
        sessions: Arc<dyn SessionStore>,
    ) -> adfs_bridge_auth::Result<Self> {
        let strategy = if adfs.is_enabled() {
            Some(AdfsStrategy::from_config(&adfs, states, provisioner, teams)?)
        } else {
            None
        };
        let logout = LogoutSettings::from(&adfs);

        Ok(Self {
            config,
            adfs: Arc::new(adfs),
            strategy,
            sessions,
            logout,
        })
    }

    /// State backed by the in-process collaborators.
    ///
    /// # Errors
    ///
    /// See [`AppState::new`].
    pub fn in_memory(config: WebConfig, adfs: AdfsConfig) -> adfs_bridge_auth::Result<Self> {
        let accounts = Arc::new(MemoryAccounts::new());
        Self::new(
            config,
            adfs,
            Arc::new(MemoryStateStore::new()),
            accounts.clone(),
            accounts,
            Arc::new(MemorySessions::new()),
        )
    }
}
