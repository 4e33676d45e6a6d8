//! Handshake state storage.
//!
//! When a sign-in begins, the strategy stores a [`HandshakeState`] under a
//! random key and sends that key to the provider as the OAuth `state`
//! parameter. The callback takes the entry back out. An entry can be taken
//! only once, and unused entries expire after [`STATE_TTL`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use moka::future::Cache;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::types::{Client, RequestContext};

/// Lifetime of an unused handshake entry.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Number of random bytes in a state key.
pub const STATE_KEY_LEN: usize = 16;

const MAX_PENDING: u64 = 100_000;

/// What the callback needs to remember from the start of the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeState {
    /// Host the sign-in started on.
    pub host: Option<String>,
    /// Client that started the sign-in.
    pub client: Client,
    /// Query parameters of the request that started the sign-in.
    pub original_query: Vec<(String, String)>,
}

impl HandshakeState {
    /// Capture the handshake state for a request.
    pub fn from_request(ctx: &RequestContext, original_query: Vec<(String, String)>) -> Self {
        Self {
            host: ctx.host.clone(),
            client: ctx.client,
            original_query,
        }
    }
}

/// Opaque storage for in-flight handshakes.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store `state` and return the key to send as the OAuth `state`.
    async fn store(&self, state: HandshakeState) -> Result<String>;

    /// Remove and return the entry for `key`.
    ///
    /// Returns `None` for unknown, expired or already taken keys.
    async fn take(&self, key: &str) -> Result<Option<HandshakeState>>;
}

/// In-process [`StateStore`] backed by a `moka` cache.
#[derive(Clone)]
pub struct MemoryStateStore {
    inner: Cache<String, Arc<HandshakeState>>,
    rng: Arc<SystemRandom>,
}

impl MemoryStateStore {
    /// Create a store with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(STATE_TTL)
    }

    /// Create a store whose entries expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(MAX_PENDING)
            .time_to_live(ttl)
            .build();
        Self {
            inner,
            rng: Arc::new(SystemRandom::new()),
        }
    }

    /// Approximate number of pending handshakes.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    fn generate_key(&self) -> Result<String> {
        let mut buf = [0u8; STATE_KEY_LEN];
        self.rng.fill(&mut buf).map_err(|_| AuthError::InvalidState {
            reason: "failed to generate random state".to_string(),
        })?;
        Ok(URL_SAFE_NO_PAD.encode(buf))
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn store(&self, state: HandshakeState) -> Result<String> {
        let key = self.generate_key()?;
        self.inner.insert(key.clone(), Arc::new(state)).await;
        debug!("handshake state stored");
        Ok(key)
    }

    async fn take(&self, key: &str) -> Result<Option<HandshakeState>> {
        let taken = self.inner.remove(key).await;
        debug!(found = taken.is_some(), "handshake state taken");
        Ok(taken.map(Arc::unwrap_or_clone))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
