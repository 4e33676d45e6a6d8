//! Interfaces of the external collaborators.
//!
//! Account provisioning, team lookup and session persistence live outside
//! this crate. [`crate::memory`] ships in-memory implementations used by the
//! binary and the tests.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::types::{AuthenticationResult, ProvisionOutcome, ProvisionRequest, RequestContext};

/// Finds or creates the internal user and team for an external identity.
#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    /// Provision the account described by `request`.
    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionOutcome, BoxError>;
}

/// Resolves an existing team from the request, typically from its host.
#[async_trait]
pub trait TeamResolver: Send + Sync {
    /// Return the id of the team the request belongs to, if any.
    async fn resolve(&self, ctx: &RequestContext) -> Result<Option<String>, BoxError>;
}

/// Establishes and tears down sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session for a signed-in user. Returns the session id.
    async fn establish(&self, result: &AuthenticationResult) -> Result<String, BoxError>;

    /// Destroy a session. Unknown ids are not an error.
    async fn logout(&self, session_id: &str) -> Result<(), BoxError>;
}

/// Team resolver that never finds a team.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTeamResolver;

#[async_trait]
impl TeamResolver for NoTeamResolver {
    async fn resolve(&self, _ctx: &RequestContext) -> Result<Option<String>, BoxError> {
        Ok(None)
    }
}
