//! Request context and the records exchanged with the provisioning
//! collaborator.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which client started the sign-in.
///
/// Carried through the handshake so the session layer can hand the result
/// back to the right place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Client {
    /// The browser application.
    #[default]
    Web,
    /// The desktop application.
    Desktop,
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web => f.write_str("web"),
            Self::Desktop => f.write_str("desktop"),
        }
    }
}

impl FromStr for Client {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Self::Web),
            "desktop" => Ok(Self::Desktop),
            other => Err(format!("unknown client: {other}")),
        }
    }
}

/// Per-request context built by the web layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Requester IP address.
    pub ip: Option<IpAddr>,
    /// `Host` the request arrived on, used to find an existing team.
    pub host: Option<String>,
    /// Client that initiated the sign-in.
    pub client: Client,
}

// ---------------------------------------------------------------------------
// Provisioning request
// ---------------------------------------------------------------------------

/// Team the user should land in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDescriptor {
    /// Existing team, when one could be resolved from the request.
    pub team_id: Option<String>,
    /// Display name for a newly created team.
    pub name: String,
    /// Email domain of the user.
    pub domain: String,
    /// Slug derived from `domain`.
    pub subdomain: String,
}

/// The user being signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescriptor {
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// The authentication provider the user signed in with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Provider key, e.g. `adfs`.
    pub name: String,
    /// Identifier of the provider instance; the user's email domain.
    pub provider_id: String,
}

/// Tokens and identity issued by the provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationDescriptor {
    /// Stable external user id (`sub`, else `id`).
    pub provider_id: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scopes: Vec<String>,
}

impl fmt::Debug for AuthenticationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationDescriptor")
            .field("provider_id", &self.provider_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Everything the provisioning collaborator needs to find or create the
/// user and team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub ip: Option<IpAddr>,
    pub team: TeamDescriptor,
    pub user: UserDescriptor,
    pub authentication_provider: ProviderDescriptor,
    pub authentication: AuthenticationDescriptor,
}

// ---------------------------------------------------------------------------
// Provisioning result
// ---------------------------------------------------------------------------

/// A user record as returned by provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// A team record as returned by provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedTeam {
    pub id: String,
    pub name: String,
    pub subdomain: String,
}

/// Outcome of a provisioning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub user: ProvisionedUser,
    pub team: ProvisionedTeam,
    /// The user record was created by this call.
    pub is_new_user: bool,
    /// The team record was created by this call.
    pub is_new_team: bool,
}

/// Result of a successful sign-in, handed to the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub user: ProvisionedUser,
    pub team: ProvisionedTeam,
    pub is_new_user: bool,
    pub is_new_team: bool,
    /// Client that initiated the sign-in.
    pub client: Client,
}

impl AuthenticationResult {
    /// Augment a provisioning outcome with the resolved client.
    pub fn from_outcome(outcome: ProvisionOutcome, client: Client) -> Self {
        Self {
            user: outcome.user,
            team: outcome.team,
            is_new_user: outcome.is_new_user,
            is_new_team: outcome.is_new_team,
            client,
        }
    }
}
