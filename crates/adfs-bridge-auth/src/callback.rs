//! Identity callback: maps a verified ADFS identity to an internal account.
//!
//! [`IdentityCallback::verify`] runs once per sign-in, after the
//! authorization code has been exchanged and the access token decoded. It
//! is a single linear pass:
//!
//! ```text
//! validate profile -> derive identifiers -> provision -> result | error
//! ```
//!
//! Validation failures never reach the provisioner, and nothing is persisted
//! by this module on any failure.

use std::sync::Arc;

use crate::claims::Profile;
use crate::config::{AdfsConfig, PROVIDER_ID};
use crate::email;
use crate::error::{AuthError, Result};
use crate::oauth::TokenGrant;
use crate::traits::{AccountProvisioner, TeamResolver};
use crate::types::{
    AuthenticationDescriptor, AuthenticationResult, ProviderDescriptor, ProvisionRequest,
    RequestContext, TeamDescriptor, UserDescriptor,
};

/// Placeholder name for teams created during sign-in; the team owner renames
/// it afterwards.
pub const DEFAULT_TEAM_NAME: &str = "Wiki";

/// Settings the callback reads from [`AdfsConfig`].
#[derive(Debug, Clone)]
pub struct CallbackSettings {
    /// Provider key recorded on the authentication provider.
    pub provider: String,
    /// Dotted claim path consulted when `name` is absent.
    pub username_claim: String,
    /// Scopes recorded on the authentication.
    pub scopes: Vec<String>,
}

impl From<&AdfsConfig> for CallbackSettings {
    fn from(config: &AdfsConfig) -> Self {
        Self {
            provider: PROVIDER_ID.to_string(),
            username_claim: config.username_claim.clone(),
            scopes: config.scopes.clone(),
        }
    }
}

/// Verify function run after the provider redirects back.
#[derive(Clone)]
pub struct IdentityCallback {
    settings: CallbackSettings,
    provisioner: Arc<dyn AccountProvisioner>,
    teams: Arc<dyn TeamResolver>,
}

impl IdentityCallback {
    /// Create a callback backed by the given collaborators.
    pub fn new(
        settings: CallbackSettings,
        provisioner: Arc<dyn AccountProvisioner>,
        teams: Arc<dyn TeamResolver>,
    ) -> Self {
        Self {
            settings,
            provisioner,
            teams,
        }
    }

    /// Build the provisioning request for `profile`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedProfile`] when `email` is missing.
    /// - [`AuthError::MalformedUserInfo`] when the email domain is unusable.
    /// - [`AuthError::AuthenticationFailed`] when no name can be resolved.
    /// - [`AuthError::Provisioning`] when the team lookup fails.
    pub async fn build_request(
        &self,
        ctx: &RequestContext,
        grant: &TokenGrant,
        profile: &Profile,
    ) -> Result<ProvisionRequest> {
        let email = profile
            .email()
            .ok_or(AuthError::MalformedProfile { field: "email" })?;

        let domain = email::parse_email(&email)
            .map(|parsed| parsed.domain)
            .filter(|domain| email::is_valid_domain(domain))
            .ok_or(AuthError::MalformedUserInfo)?;

        let subdomain = email::slugify_domain(&domain);

        let name = profile
            .name()
            .or_else(|| profile.resolve(&self.settings.username_claim))
            .or_else(|| profile.username())
            .ok_or_else(|| {
                AuthError::authentication(
                    "Neither a name or username was returned in the profile, \
                     but at least one is required",
                )
            })?;

        let team_id = self
            .teams
            .resolve(ctx)
            .await
            .map_err(|e| AuthError::Provisioning {
                reason: format!("team lookup failed: {e}"),
            })?;

        Ok(ProvisionRequest {
            ip: ctx.ip,
            team: TeamDescriptor {
                team_id,
                name: DEFAULT_TEAM_NAME.to_string(),
                domain: domain.clone(),
                subdomain,
            },
            user: UserDescriptor {
                name,
                email,
                avatar_url: profile.picture(),
            },
            authentication_provider: ProviderDescriptor {
                name: self.settings.provider.clone(),
                provider_id: domain,
            },
            authentication: AuthenticationDescriptor {
                provider_id: profile.subject(),
                access_token: grant.access_token.clone(),
                refresh_token: grant.refresh_token.clone(),
                expires_in: grant.expires_in,
                scopes: self.settings.scopes.clone(),
            },
        })
    }

    /// Validate the profile, provision the account and return the result.
    ///
    /// # Errors
    ///
    /// Any error from [`IdentityCallback::build_request`], or
    /// [`AuthError::Provisioning`] if the provisioner fails.
    pub async fn verify(
        &self,
        ctx: &RequestContext,
        grant: &TokenGrant,
        profile: &Profile,
    ) -> Result<AuthenticationResult> {
        let request = self.build_request(ctx, grant, profile).await?;
        let domain = request.team.domain.clone();

        let outcome = self
            .provisioner
            .provision(request)
            .await
            .map_err(|e| AuthError::Provisioning {
                reason: e.to_string(),
            })?;

        tracing::info!(
            user_id = %outcome.user.id,
            team_id = %outcome.team.id,
            domain = %domain,
            is_new_user = outcome.is_new_user,
            "identity verified"
        );

        Ok(AuthenticationResult::from_outcome(outcome, ctx.client))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
