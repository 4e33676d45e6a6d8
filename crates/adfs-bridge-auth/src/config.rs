//! ADFS integration configuration.
//!
//! [`AdfsConfig`] is built once at startup from environment-style key/value
//! pairs and shared by reference with every component that needs it. It is
//! never read as ambient global state.
//!
//! The integration is only active when client id, client secret and the
//! provider base URL are all supplied (see [`AdfsConfig::is_enabled`]).
//! Supplying some but not all of them is a configuration error.

use std::fmt;

use url::Url;

use crate::error::{AuthError, Result};

/// Key under which the provider is registered (`/auth/adfs`).
pub const PROVIDER_ID: &str = "adfs";

/// Default sign-in button label.
pub const DEFAULT_DISPLAY_NAME: &str = "ADFS Connect";

/// Default claim used as the user's display name when `name` is absent.
pub const DEFAULT_USERNAME_CLAIM: &str = "email";

/// Default space-separated scope list.
pub const DEFAULT_SCOPES: &str = "openid profile email";

/// Default ADFS resource identifier.
pub const DEFAULT_RESOURCE: &str = "outline";

/// Default application URL when `URL` is not set.
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";

/// Maximum length of [`AdfsConfig::display_name`].
pub const MAX_DISPLAY_NAME_LEN: usize = 50;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// OAuth client credentials. Immutable once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// The OAuth client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The OAuth client secret.
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the ADFS integration.
#[derive(Debug, Clone)]
pub struct AdfsConfig {
    /// Client id (`ADFS_CLIENT_ID`).
    pub client_id: Option<String>,

    /// Client secret (`ADFS_CLIENT_SECRET`).
    pub client_secret: Option<String>,

    /// Provider base URL (`ADFS_URI`), e.g. `https://adfs.example.com`.
    pub base_url: Option<Url>,

    /// Sign-in button label (`ADFS_DISPLAY_NAME`).
    pub display_name: String,

    /// Dotted claim path used as the user's name (`ADFS_USERNAME_CLAIM`).
    pub username_claim: String,

    /// Requested scopes (`ADFS_SCOPES`).
    pub scopes: Vec<String>,

    /// ADFS resource identifier (`ADFS_RESOURCE`).
    pub resource: String,

    /// Disable automatic redirect to the provider (`ADFS_DISABLE_REDIRECT`).
    pub disable_redirect: bool,

    /// Explicit logout endpoint overriding the derived one (`ADFS_LOGOUT_URI`).
    pub logout_url: Option<Url>,

    /// Public URL of the application (`URL`).
    pub app_url: Url,
}

impl AdfsConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] when a value is malformed or
    /// the credential group is incomplete.
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] when a value is malformed or
    /// the credential group is incomplete.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = get("ADFS_URI")
            .map(|raw| parse_url("ADFS_URI", &raw))
            .transpose()?;
        let logout_url = get("ADFS_LOGOUT_URI")
            .map(|raw| parse_url("ADFS_LOGOUT_URI", &raw))
            .transpose()?;
        let app_url = parse_url(
            "URL",
            &get("URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
        )?;

        let disable_redirect = match get("ADFS_DISABLE_REDIRECT") {
            Some(raw) => parse_bool("ADFS_DISABLE_REDIRECT", &raw)?,
            None => false,
        };

        let config = Self {
            client_id: get("ADFS_CLIENT_ID"),
            client_secret: get("ADFS_CLIENT_SECRET"),
            base_url,
            display_name: get("ADFS_DISPLAY_NAME")
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            username_claim: get("ADFS_USERNAME_CLAIM")
                .unwrap_or_else(|| DEFAULT_USERNAME_CLAIM.to_string()),
            scopes: split_scopes(
                &get("ADFS_SCOPES").unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            ),
            resource: get("ADFS_RESOURCE").unwrap_or_else(|| DEFAULT_RESOURCE.to_string()),
            disable_redirect,
            logout_url,
            app_url,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check field constraints and the credential interdependencies.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(invalid(format!(
                "ADFS_DISPLAY_NAME must be at most {MAX_DISPLAY_NAME_LEN} characters"
            )));
        }

        if self.client_id.is_some() {
            if self.client_secret.is_none() {
                return Err(invalid("ADFS_CLIENT_ID cannot be used without ADFS_CLIENT_SECRET"));
            }
            if self.base_url.is_none() {
                return Err(invalid("ADFS_CLIENT_ID cannot be used without ADFS_URI"));
            }
            if self.resource.is_empty() {
                return Err(invalid("ADFS_CLIENT_ID cannot be used without ADFS_RESOURCE"));
            }
        }

        if self.client_secret.is_some() && self.client_id.is_none() {
            return Err(invalid("ADFS_CLIENT_SECRET cannot be used without ADFS_CLIENT_ID"));
        }

        Ok(())
    }

    /// Whether the integration should register its routes.
    pub fn is_enabled(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.base_url.is_some()
    }

    /// The client credentials, when both halves are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Some(Credentials::new(id, secret)),
            _ => None,
        }
    }

    /// URL the provider redirects back to after sign-in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UrlParse`] if the application URL cannot be
    /// joined with the callback path.
    pub fn callback_url(&self) -> Result<Url> {
        Ok(self
            .app_url
            .join(&format!("/auth/{PROVIDER_ID}.callback"))?)
    }

    /// Space-joined scope list, as sent to the provider.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

impl Default for AdfsConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: None,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            username_claim: DEFAULT_USERNAME_CLAIM.to_string(),
            scopes: split_scopes(DEFAULT_SCOPES),
            resource: DEFAULT_RESOURCE.to_string(),
            disable_redirect: false,
            logout_url: None,
            app_url: Url::parse(DEFAULT_APP_URL).expect("default app URL is valid"),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn invalid(reason: impl Into<String>) -> AuthError {
    AuthError::InvalidConfig {
        reason: reason.into(),
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| invalid(format!("{key}: {e}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(format!("{key}: expected a boolean, got {raw:?}"))),
    }
}

fn split_scopes(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(String::from).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
