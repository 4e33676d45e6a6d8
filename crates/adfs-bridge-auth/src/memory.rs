//! In-memory collaborators.
//!
//! [`MemoryAccounts`] keeps users and teams in concurrent maps for the
//! lifetime of the process. [`MemorySessions`] drops sessions that go
//! unused for [`SESSION_IDLE_TTL`]. Both back the `serve` command and the
//! tests; a real deployment plugs its own stores in through the traits in
//! [`crate::traits`].

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use moka::future::Cache;
use tracing::debug;
use uuid::Uuid;

use crate::error::BoxError;
use crate::traits::{AccountProvisioner, SessionStore, TeamResolver};
use crate::types::{
    AuthenticationResult, ProvisionOutcome, ProvisionRequest, ProvisionedTeam, ProvisionedUser,
    RequestContext,
};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Users and teams keyed the way the provisioning contract expects:
/// teams by email domain, users by team and lowercased email.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    /// team id -> team
    teams: DashMap<String, ProvisionedTeam>,
    /// email domain -> team id
    domains: DashMap<String, String>,
    /// (team id, lowercased email) -> user
    users: DashMap<(String, String), ProvisionedUser>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a team by id.
    pub fn team(&self, id: &str) -> Option<ProvisionedTeam> {
        self.teams.get(id).map(|t| t.value().clone())
    }

    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn find_or_create_team(&self, request: &ProvisionRequest) -> Result<(ProvisionedTeam, bool), BoxError> {
        if let Some(id) = &request.team.team_id {
            return self
                .team(id)
                .map(|team| (team, false))
                .ok_or_else(|| format!("unknown team: {id}").into());
        }

        match self.domains.entry(request.team.domain.clone()) {
            Entry::Occupied(entry) => {
                let id = entry.get().clone();
                drop(entry);
                let team = self
                    .team(&id)
                    .ok_or_else(|| format!("team {id} vanished"))?;
                Ok((team, false))
            }
            Entry::Vacant(entry) => {
                let team = ProvisionedTeam {
                    id: Uuid::now_v7().to_string(),
                    name: request.team.name.clone(),
                    subdomain: request.team.subdomain.clone(),
                };
                self.teams.insert(team.id.clone(), team.clone());
                entry.insert(team.id.clone());
                Ok((team, true))
            }
        }
    }
}

#[async_trait]
impl AccountProvisioner for MemoryAccounts {
    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionOutcome, BoxError> {
        let (team, is_new_team) = self.find_or_create_team(&request)?;

        let key = (team.id.clone(), request.user.email.to_lowercase());
        let (user, is_new_user) = match self.users.entry(key) {
            Entry::Occupied(mut entry) => {
                let user = entry.get_mut();
                user.name = request.user.name.clone();
                user.avatar_url = request.user.avatar_url.clone();
                (user.clone(), false)
            }
            Entry::Vacant(entry) => {
                let user = ProvisionedUser {
                    id: Uuid::now_v7().to_string(),
                    name: request.user.name.clone(),
                    email: request.user.email.clone(),
                    avatar_url: request.user.avatar_url.clone(),
                };
                entry.insert(user.clone());
                (user, true)
            }
        };

        debug!(
            team_id = %team.id,
            user_id = %user.id,
            is_new_team,
            is_new_user,
            "account provisioned"
        );

        Ok(ProvisionOutcome {
            user,
            team,
            is_new_user,
            is_new_team,
        })
    }
}

#[async_trait]
impl TeamResolver for MemoryAccounts {
    /// Matches the first label of the request host against team subdomains,
    /// so `acme.wiki.test` resolves the team with subdomain `acme`.
    async fn resolve(&self, ctx: &RequestContext) -> Result<Option<String>, BoxError> {
        let Some(host) = ctx.host.as_deref() else {
            return Ok(None);
        };
        let host = host.split(':').next().unwrap_or(host);
        let Some((label, _)) = host.split_once('.') else {
            return Ok(None);
        };
        Ok(self
            .teams
            .iter()
            .find(|t| t.subdomain.eq_ignore_ascii_case(label))
            .map(|t| t.id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// How long a session may go unused before it is dropped.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const MAX_SESSIONS: u64 = 100_000;

/// Session ids (UUID v7) mapped to the sign-in they were created for.
#[derive(Clone)]
pub struct MemorySessions {
    sessions: Cache<String, AuthenticationResult>,
}

impl MemorySessions {
    /// Create a store with the default idle timeout.
    pub fn new() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TTL)
    }

    /// Create a store that drops sessions unused for `idle`.
    pub fn with_idle_timeout(idle: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle)
            .build();
        Self { sessions }
    }

    /// Look up a live session. Reading it resets its idle timer.
    pub async fn get(&self, session_id: &str) -> Option<AuthenticationResult> {
        self.sessions.get(session_id).await
    }

    /// Number of live sessions.
    pub async fn len(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemorySessions {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemorySessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessions")
            .field("entries", &self.sessions.entry_count())
            .finish()
    }
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn establish(&self, result: &AuthenticationResult) -> Result<String, BoxError> {
        let id = Uuid::now_v7().to_string();
        self.sessions.insert(id.clone(), result.clone()).await;
        debug!(user_id = %result.user.id, "session established");
        Ok(id)
    }

    async fn logout(&self, session_id: &str) -> Result<(), BoxError> {
        self.sessions.invalidate(session_id).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
