//! The ADFS sign-in strategy.
//!
//! [`AdfsStrategy`] ties together the token client, the handshake state
//! store and the identity callback. The web layer calls [`AdfsStrategy::begin`]
//! to send the browser to the provider and [`AdfsStrategy::authenticate`]
//! when the provider redirects back.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::callback::{CallbackSettings, IdentityCallback};
use crate::config::AdfsConfig;
use crate::error::{AuthError, Result};
use crate::oauth::AdfsClient;
use crate::state::{HandshakeState, StateStore};
use crate::traits::{AccountProvisioner, TeamResolver};
use crate::types::{AuthenticationResult, RequestContext};

/// Query or form parameters the provider sends to the callback route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Authorization-code strategy against one ADFS deployment.
#[derive(Clone)]
pub struct AdfsStrategy {
    client: Arc<AdfsClient>,
    states: Arc<dyn StateStore>,
    identity: IdentityCallback,
    callback_url: Url,
    scope: String,
    resource: String,
}

impl AdfsStrategy {
    pub fn new(
        client: Arc<AdfsClient>,
        states: Arc<dyn StateStore>,
        identity: IdentityCallback,
        callback_url: Url,
        scope: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            client,
            states,
            identity,
            callback_url,
            scope: scope.into(),
            resource: resource.into(),
        }
    }

    /// Assemble the strategy from configuration and collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] when the integration is not
    /// enabled, or [`AuthError::UrlParse`] if the callback URL is invalid.
    pub fn from_config(
        config: &AdfsConfig,
        states: Arc<dyn StateStore>,
        provisioner: Arc<dyn AccountProvisioner>,
        teams: Arc<dyn TeamResolver>,
    ) -> Result<Self> {
        let client = AdfsClient::from_config(config)?;
        let identity = IdentityCallback::new(CallbackSettings::from(config), provisioner, teams);
        Ok(Self::new(
            Arc::new(client),
            states,
            identity,
            config.callback_url()?,
            config.scope_param(),
            config.resource.clone(),
        ))
    }

    /// The token client used by this strategy.
    pub fn client(&self) -> &AdfsClient {
        &self.client
    }

    /// Where the provider redirects back to.
    pub fn callback_url(&self) -> &Url {
        &self.callback_url
    }

    /// Merge the query of the originating request with the strategy's own
    /// authorization parameters.
    ///
    /// The original pairs come first; any key the strategy sets replaces
    /// the original value.
    pub fn build_authorization_params(
        &self,
        original_query: &[(String, String)],
        state: &str,
    ) -> Vec<(String, String)> {
        let own = [
            ("response_type", "code"),
            ("client_id", self.client.credentials().client_id()),
            ("redirect_uri", self.callback_url.as_str()),
            ("scope", self.scope.as_str()),
            ("resource", self.resource.as_str()),
            ("state", state),
        ];
        let overridden: HashSet<&str> = own.iter().map(|(k, _)| *k).collect();

        original_query
            .iter()
            .filter(|(k, _)| !overridden.contains(k.as_str()))
            .cloned()
            .chain(own.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .collect()
    }

    /// Start a sign-in: remember the handshake and return the provider URL
    /// to redirect the browser to.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be stored or the URL cannot be
    /// built.
    pub async fn begin(
        &self,
        ctx: &RequestContext,
        original_query: Vec<(String, String)>,
    ) -> Result<Url> {
        let key = self
            .states
            .store(HandshakeState::from_request(ctx, original_query.clone()))
            .await?;
        let params = self.build_authorization_params(&original_query, &key);
        self.client.authorization_url(&params)
    }

    /// Complete a sign-in from the provider's callback parameters.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthenticationFailed`] if the provider reported an
    ///   error or no code was returned.
    /// - [`AuthError::InvalidState`] if the state is missing, unknown,
    ///   expired or reused.
    /// - Any error from the code exchange, token decoding or the identity
    ///   callback.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        params: &CallbackParams,
    ) -> Result<AuthenticationResult> {
        if let Some(error) = params.error.as_deref() {
            let reason = params
                .error_description
                .clone()
                .unwrap_or_else(|| error.to_string());
            return Err(AuthError::authentication(reason));
        }

        let key = params
            .state
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::InvalidState {
                reason: "missing state parameter".to_string(),
            })?;

        let handshake = self
            .states
            .take(key)
            .await?
            .ok_or_else(|| AuthError::InvalidState {
                reason: "unknown or expired state".to_string(),
            })?;

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::authentication("no authorization code returned"))?;

        let grant = self.client.exchange_code(code, &self.callback_url).await?;
        let profile = self.client.fetch_user_info(&grant.access_token)?;

        let ctx = RequestContext {
            ip: ctx.ip,
            host: ctx.host.clone().or(handshake.host),
            client: handshake.client,
        };
        self.identity.verify(&ctx, &grant, &profile).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::extract::{Form, State};
    use axum::routing::post;
    use axum::{Json, Router};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::{Value, json};

    use super::*;
    use crate::config::Credentials;
    use crate::error::BoxError;
    use crate::state::MemoryStateStore;
    use crate::traits::NoTeamResolver;
    use crate::types::{Client, ProvisionOutcome, ProvisionRequest, ProvisionedTeam, ProvisionedUser};

    #[derive(Default)]
    struct CountingProvisioner {
        calls: Mutex<Vec<ProvisionRequest>>,
    }

    #[async_trait]
    impl AccountProvisioner for CountingProvisioner {
        async fn provision(&self, request: ProvisionRequest) -> std::result::Result<ProvisionOutcome, BoxError> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(ProvisionOutcome {
                user: ProvisionedUser {
                    id: "u".into(),
                    name: request.user.name,
                    email: request.user.email,
                    avatar_url: None,
                },
                team: ProvisionedTeam {
                    id: "t".into(),
                    name: request.team.name,
                    subdomain: request.team.subdomain,
                },
                is_new_user: false,
                is_new_team: false,
            })
        }
    }

    fn jwt(claims: Value) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    async fn spawn_token_server(access_token: String) -> SocketAddr {
        let app = Router::new()
            .route(
                "/adfs/oauth2/token",
                post(|State(token): State<String>, Form(_form): Form<HashMap<String, String>>| async move {
                    Json(json!({
                        "access_token": token,
                        "refresh_token": "rt",
                        "expires_in": 3600
                    }))
                }),
            )
            .with_state(access_token);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn strategy(base: &str, provisioner: Arc<CountingProvisioner>) -> AdfsStrategy {
        let client = AdfsClient::new(
            Credentials::new("client-1", "secret-1"),
            Url::parse(base).unwrap(),
        );
        let identity = IdentityCallback::new(
            CallbackSettings {
                provider: "adfs".into(),
                username_claim: "email".into(),
                scopes: vec!["openid".into()],
            },
            provisioner,
            Arc::new(NoTeamResolver),
        );
        AdfsStrategy::new(
            Arc::new(client),
            Arc::new(MemoryStateStore::new()),
            identity,
            Url::parse("http://localhost:3000/auth/adfs.callback").unwrap(),
            "openid profile email",
            "outline",
        )
    }

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn strategy_params_override_original_query() {
        let s = strategy("https://adfs.example.com", Arc::default());
        let original = vec![
            ("prompt".to_string(), "login".to_string()),
            ("client_id".to_string(), "evil".to_string()),
            ("scope".to_string(), "everything".to_string()),
        ];
        let params = s.build_authorization_params(&original, "st");
        assert_eq!(params[0], ("prompt".to_string(), "login".to_string()));

        let map: HashMap<_, _> = params.into_iter().collect();
        assert_eq!(map["client_id"], "client-1");
        assert_eq!(map["scope"], "openid profile email");
        assert_eq!(map["response_type"], "code");
        assert_eq!(map["resource"], "outline");
        assert_eq!(map["state"], "st");
        assert_eq!(map["redirect_uri"], "http://localhost:3000/auth/adfs.callback");
    }

    #[tokio::test]
    async fn begin_builds_authorize_url_with_stored_state() {
        let s = strategy("https://adfs.example.com", Arc::default());
        let url = s
            .begin(&RequestContext::default(), vec![("prompt".into(), "login".into())])
            .await
            .unwrap();

        assert_eq!(url.path(), "/adfs/oauth2/authorize");
        let q = query_map(&url);
        assert_eq!(q["prompt"], "login");
        assert_eq!(q["client_id"], "client-1");
        assert!(!q["state"].is_empty());
        assert!(s.states.take(&q["state"]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn provider_error_is_authentication_failure() {
        let s = strategy("https://adfs.example.com", Arc::default());
        let params = CallbackParams {
            error: Some("access_denied".into()),
            error_description: Some("User cancelled".into()),
            ..CallbackParams::default()
        };
        let err = s.authenticate(&RequestContext::default(), &params).await.unwrap_err();
        assert_eq!(err.to_string(), "authentication failed: User cancelled");
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let s = strategy("https://adfs.example.com", Arc::default());
        let params = CallbackParams {
            code: Some("c".into()),
            state: Some("forged".into()),
            ..CallbackParams::default()
        };
        let err = s.authenticate(&RequestContext::default(), &params).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidState { .. }));

        let params = CallbackParams {
            code: Some("c".into()),
            ..CallbackParams::default()
        };
        let err = s.authenticate(&RequestContext::default(), &params).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn full_handshake_provisions_with_stored_client() {
        let token = jwt(json!({ "email": "jane@example.com", "sub": "s-1" }));
        let addr = spawn_token_server(token).await;
        let provisioner = Arc::new(CountingProvisioner::default());
        let s = strategy(&format!("http://{addr}"), Arc::clone(&provisioner));

        let start_ctx = RequestContext {
            ip: None,
            host: Some("wiki.example.com".into()),
            client: Client::Desktop,
        };
        let url = s.begin(&start_ctx, vec![]).await.unwrap();
        let state = query_map(&url)["state"].clone();

        let params = CallbackParams {
            code: Some("auth-code".into()),
            state: Some(state.clone()),
            ..CallbackParams::default()
        };
        let result = s.authenticate(&RequestContext::default(), &params).await.unwrap();

        assert_eq!(result.client, Client::Desktop);
        // Name falls back to the configured `email` claim.
        assert_eq!(result.user.name, "jane@example.com");
        assert_eq!(provisioner.calls.lock().unwrap().len(), 1);

        // Replaying the callback fails: the state was consumed.
        let err = s.authenticate(&RequestContext::default(), &params).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidState { .. }));
        assert_eq!(provisioner.calls.lock().unwrap().len(), 1);
    }
}
