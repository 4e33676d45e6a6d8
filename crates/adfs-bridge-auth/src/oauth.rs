//! OAuth 2.0 client for an ADFS token endpoint.
//!
//! [`AdfsClient`] holds the client credentials and performs the two grants
//! this integration needs against `{base}/adfs/oauth2/token`:
//!
//! - the authorization-code grant, once per sign-in;
//! - the refresh-token grant ([`AdfsClient::rotate_token`]), whenever the
//!   session layer needs a fresh access token.
//!
//! Each call is a single attempt. Retry policy, if any, belongs to the
//! caller.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::claims::{self, Profile};
use crate::config::{AdfsConfig, Credentials};
use crate::error::{AuthError, Result};

/// Path of the token endpoint below the provider base URL.
pub const TOKEN_PATH: &str = "/adfs/oauth2/token";

/// Path of the authorization endpoint below the provider base URL.
pub const AUTHORIZE_PATH: &str = "/adfs/oauth2/authorize";

/// Path of the logout endpoint below the provider base URL.
pub const LOGOUT_PATH: &str = "/adfs/oauth2/logout";

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Result of a refresh-token grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// The new access token.
    pub access_token: String,

    /// A rotated refresh token, when the provider issued one.
    pub refresh_token: Option<String>,

    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

/// Tokens returned by the authorization-code grant, handed to the identity
/// callback together with the decoded profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Access token; for ADFS this is a JWT carrying the user's claims.
    pub access_token: String,

    /// Refresh token, when the provider issued one.
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds.
    pub expires_in: Option<i64>,
}

/// Raw token response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert into a [`TokenSet`], computing `expires_at` from `expires_in`
    /// relative to `now`.
    fn into_token_set(self, now: DateTime<Utc>) -> Result<TokenSet> {
        let expires_in = self.expires_in.ok_or_else(|| AuthError::InvalidRequest {
            reason: "token response is missing expires_in".to_string(),
        })?;
        let expires_at = (expires_in >= 0)
            .then(|| Duration::try_seconds(expires_in))
            .flatten()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| AuthError::InvalidRequest {
                reason: "expires_in out of range".to_string(),
            })?;
        Ok(TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }

    fn into_grant(self) -> TokenGrant {
        TokenGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// OAuth client bound to one ADFS deployment.
///
/// Cheap to share behind an `Arc`; the inner `reqwest::Client` pools
/// connections across requests.
#[derive(Debug, Clone)]
pub struct AdfsClient {
    credentials: Credentials,
    base_url: Url,
    resource: String,
    http: reqwest::Client,
}

impl AdfsClient {
    /// Create a client for the provider at `base_url`.
    pub fn new(credentials: Credentials, base_url: Url) -> Self {
        Self {
            credentials,
            base_url,
            resource: crate::config::DEFAULT_RESOURCE.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Create a client from a complete integration config.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the client id, secret or
    /// provider URL is missing.
    pub fn from_config(config: &AdfsConfig) -> Result<Self> {
        let credentials = config.credentials().ok_or_else(|| AuthError::InvalidConfig {
            reason: "ADFS_CLIENT_ID and ADFS_CLIENT_SECRET are required".to_string(),
        })?;
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| AuthError::InvalidConfig {
                reason: "ADFS_URI is required".to_string(),
            })?;
        Ok(Self::new(credentials, base_url).with_resource(config.resource.clone()))
    }

    /// Set the ADFS resource identifier sent with the authorization-code grant.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Use a custom HTTP client (connection pool reuse, timeouts, tests).
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The configured credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The provider base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/adfs/oauth2/token`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UrlParse`] if the base URL cannot be joined.
    pub fn token_endpoint(&self) -> Result<Url> {
        self.endpoint(TOKEN_PATH)
    }

    /// `{base}/adfs/oauth2/logout`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UrlParse`] if the base URL cannot be joined.
    pub fn logout_endpoint(&self) -> Result<Url> {
        self.endpoint(LOGOUT_PATH)
    }

    /// Build the provider authorization URL with the given query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UrlParse`] if the base URL cannot be joined.
    pub fn authorization_url<K, V>(&self, params: &[(K, V)]) -> Result<Url>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self.endpoint(AUTHORIZE_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key.as_ref(), value.as_ref());
            }
        }
        Ok(url)
    }

    /// Decode the claims carried by an ADFS access token.
    ///
    /// No network call and no signature verification is performed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenDecode`] if the token is malformed.
    pub fn fetch_user_info(&self, access_token: &str) -> Result<Profile> {
        claims::decode_payload(access_token)
    }

    /// Refresh an access token at the default token endpoint.
    ///
    /// # Errors
    ///
    /// See [`AdfsClient::rotate_token_at`].
    pub async fn rotate_token(&self, access_token: &str, refresh_token: &str) -> Result<TokenSet> {
        let endpoint = self.token_endpoint()?;
        self.rotate_token_at(access_token, refresh_token, &endpoint)
            .await
    }

    /// Refresh an access token at an explicit token endpoint.
    ///
    /// The current access token is accepted for interface symmetry but is not
    /// sent: the refresh grant only needs the refresh token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRequest`] if `refresh_token` is empty, the
    ///   request cannot be sent, or the success body is not a token response.
    /// - [`AuthError::AuthenticationFailed`] if the provider answers with a
    ///   non-2xx status. The provider's error body is not surfaced.
    pub async fn rotate_token_at(
        &self,
        _access_token: &str,
        refresh_token: &str,
        endpoint: &Url,
    ) -> Result<TokenSet> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidRequest {
                reason: "refresh token must not be empty".to_string(),
            });
        }

        let params = [
            ("client_id", self.credentials.client_id()),
            ("client_secret", self.credentials.client_secret()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        tracing::debug!(endpoint = %endpoint, "rotating token");

        let response = self.post_form(endpoint, &params).await?;
        response.into_token_set(Utc::now())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Same mapping as [`AdfsClient::rotate_token_at`].
    pub async fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<TokenGrant> {
        let endpoint = self.token_endpoint()?;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", self.credentials.client_id()),
            ("client_secret", self.credentials.client_secret()),
            ("resource", self.resource.as_str()),
        ];

        tracing::debug!(endpoint = %endpoint, "exchanging authorization code");

        let response = self.post_form(&endpoint, &params).await?;
        Ok(response.into_grant())
    }

    /// POST a form to the token endpoint and decode a successful response.
    async fn post_form(&self, endpoint: &Url, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(endpoint.clone())
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::InvalidRequest {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(endpoint = %endpoint, status = %status, "token endpoint rejected request");
            return Err(AuthError::AuthenticationFailed { reason: None });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::InvalidRequest {
                reason: e.to_string(),
            })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        // Keep any path prefix of the base URL (`https://host/prefix`).
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
