//! Identity claims.
//!
//! A [`Profile`] is the loosely typed claim set returned by the identity
//! provider. ADFS carries the claims directly inside the signed access
//! token, so [`decode_payload`] simply base64url-decodes the middle segment.
//! Signature verification is not performed here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, Result};

/// Claim set returned by the identity provider.
///
/// Only presence checks are applied to it; values are not validated.
/// The standard OpenID Connect claims are listed at
/// <https://openid.net/specs/openid-connect-core-1_0.html#StandardClaims>.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile {
    claims: Map<String, Value>,
}

impl Profile {
    /// Wrap an already decoded claim map.
    pub fn new(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Build a profile from `(claim, value)` string pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let claims = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        Self { claims }
    }

    /// Raw claim value.
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.claims.get(claim)
    }

    /// Top-level claim as a non-empty string.
    pub fn string(&self, claim: &str) -> Option<String> {
        self.get(claim).and_then(value_as_string)
    }

    /// Look up a dotted claim path, see [`resolve_claim`].
    pub fn resolve(&self, path: &str) -> Option<String> {
        resolve_claim(self, path)
    }

    /// `email` claim.
    pub fn email(&self) -> Option<String> {
        self.string("email")
    }

    /// `name` claim.
    pub fn name(&self) -> Option<String> {
        self.string("name")
    }

    /// `username` claim.
    pub fn username(&self) -> Option<String> {
        self.string("username")
    }

    /// `picture` claim.
    pub fn picture(&self) -> Option<String> {
        self.string("picture")
    }

    /// Stable external identifier: `sub`, falling back to `id`.
    pub fn subject(&self) -> Option<String> {
        self.string("sub").or_else(|| self.string("id"))
    }

    /// Number of claims.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether no claims are present.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Borrow the underlying claim map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// Resolve a dotted claim path (`"a.b.c"`) against a profile.
///
/// Each segment indexes into a nested JSON object. Strings are returned as
/// is, numbers and booleans as their textual form. Empty strings, `null`,
/// arrays, objects and missing segments all resolve to `None`.
pub fn resolve_claim(profile: &Profile, path: &str) -> Option<String> {
    let mut segments = path.split('.');
    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = profile.get(first)?;
    for segment in segments {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    value_as_string(current)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Decode the payload segment of a compact JWS (`header.payload.signature`).
///
/// # Errors
///
/// Returns [`AuthError::TokenDecode`] if the token does not have three
/// segments, the payload is not base64url, or it is not a JSON object.
pub fn decode_payload(token: &str) -> Result<Profile> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(decode_error("expected three dot-separated segments"));
    };

    // Some issuers pad their segments despite RFC 7515.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| decode_error(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(Profile::new(claims)),
        Ok(_) => Err(decode_error("payload is not a JSON object")),
        Err(e) => Err(decode_error(format!("payload is not JSON: {e}"))),
    }
}

fn decode_error(reason: impl Into<String>) -> AuthError {
    AuthError::TokenDecode {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
