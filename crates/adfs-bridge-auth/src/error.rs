//! Error types for the ADFS sign-in crate.
//!
//! Every operation surfaces failures through [`AuthError`]. Errors raised on
//! the callback path are treated as a denied sign-in by the web layer: no
//! session is established and nothing is retried.

/// Unified error type for ADFS authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// An outbound call to the identity provider could not be completed, or
    /// its response could not be read.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// The underlying transport or decoding message.
        reason: String,
    },

    /// The identity provider rejected the request, or the sign-in could not
    /// be completed for a non-specific reason.
    #[error("{}", authentication_failed_message(.reason))]
    AuthenticationFailed {
        /// Optional human-readable detail. Provider error bodies are never
        /// copied here.
        reason: Option<String>,
    },

    /// A claim required to sign the user in was missing from the profile.
    #[error("malformed profile: an {field} field was not returned in the profile, but is required")]
    MalformedProfile {
        /// Name of the missing claim.
        field: &'static str,
    },

    /// The email claim was present but its domain could not be parsed.
    #[error("malformed user info: the email domain returned by the identity provider is invalid")]
    MalformedUserInfo,

    /// A signed token could not be decoded into claims.
    #[error("token decode error: {reason}")]
    TokenDecode {
        /// What was wrong with the token.
        reason: String,
    },

    /// The handshake `state` parameter was missing, unknown, expired or reused.
    #[error("invalid state: {reason}")]
    InvalidState {
        /// Why the state was rejected.
        reason: String,
    },

    /// The provisioning collaborator failed.
    #[error("provisioning failed: {reason}")]
    Provisioning {
        /// Message from the collaborator.
        reason: String,
    },

    /// The session collaborator failed.
    #[error("session error: {reason}")]
    Session {
        /// Message from the collaborator.
        reason: String,
    },

    /// Configuration is missing, inconsistent or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl AuthError {
    /// Shorthand for [`AuthError::AuthenticationFailed`] with a reason.
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: Some(reason.into()),
        }
    }

    /// Short, URL-safe code the web layer appends to a failed sign-in
    /// redirect as `?notice=`.
    pub fn notice(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid-request",
            Self::AuthenticationFailed { .. } => "auth-error",
            Self::MalformedProfile { .. } => "malformed-profile",
            Self::MalformedUserInfo => "malformed-user-info",
            Self::TokenDecode { .. } => "invalid-token",
            Self::InvalidState { .. } => "state-mismatch",
            Self::Provisioning { .. } | Self::Session { .. } => "auth-error",
            Self::InvalidConfig { .. } | Self::UrlParse(_) => "config-error",
        }
    }
}

fn authentication_failed_message(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!("authentication failed: {reason}"),
        None => "authentication failed".to_string(),
    }
}

/// Error type returned by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
