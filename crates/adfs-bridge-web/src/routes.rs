//! Route handlers for sign-in and logout.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Form, FromRequestParts, Query, RawQuery, State};
use axum::http::HeaderMap;
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

use adfs_bridge_auth::{
    AuthError, CallbackParams, Client, PROVIDER_ID, RequestContext, perform_logout,
};

use crate::state::AppState;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "adfs_bridge_session";

/// Where a signed-in user lands.
pub const HOME_PATH: &str = "/home";

/// Path that starts the sign-in.
pub const LOGIN_PATH: &str = "/auth/adfs";

/// Path the provider redirects back to.
pub const CALLBACK_PATH: &str = "/auth/adfs.callback";

/// Path of the public provider descriptor.
pub const CONFIG_PATH: &str = "/auth/adfs.config";

// ---------------------------------------------------------------------------
// Request context
// ---------------------------------------------------------------------------

/// Extracts the [`RequestContext`] of an incoming request.
///
/// The IP is the peer address when the server was started with connect
/// info. The first `X-Forwarded-For` entry takes precedence only when
/// [`WebConfig::trust_proxy`](crate::WebConfig::trust_proxy) is set.
#[derive(Debug, Clone)]
pub struct Ctx(pub RequestContext);

impl FromRequestParts<Arc<AppState>> for Ctx {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self(RequestContext {
            ip: client_ip(&parts.headers, peer, state.config.trust_proxy),
            host,
            client: Client::Web,
        }))
    }
}

/// The requester IP: the first `X-Forwarded-For` entry behind a trusted
/// proxy, else the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> Option<IpAddr> {
    if !trust_proxy {
        return peer;
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .or(peer)
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Provider routes, registered only when the integration is enabled.
pub fn auth_routes(state: &AppState) -> Router<Arc<AppState>> {
    if state.strategy.is_none() {
        tracing::info!(provider = PROVIDER_ID, "ADFS not configured, sign-in routes disabled");
        return Router::new();
    }

    tracing::info!(provider = PROVIDER_ID, "ADFS sign-in routes registered");
    Router::new()
        .route(LOGIN_PATH, get(begin))
        .route(CALLBACK_PATH, get(callback_query).post(callback_form))
        .route(CONFIG_PATH, get(provider_config))
}

/// Logout route, always registered.
pub fn logout_routes() -> Router<Arc<AppState>> {
    Router::new().route("/logout", get(logout).post(logout))
}

// ---------------------------------------------------------------------------
// GET /auth/adfs
// ---------------------------------------------------------------------------

/// Start a sign-in and redirect to the provider.
///
/// A `client=desktop` query parameter marks the sign-in as coming from the
/// desktop app.
pub async fn begin(
    State(state): State<Arc<AppState>>,
    Ctx(mut ctx): Ctx,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(strategy) = &state.strategy else {
        return failure_redirect(&AuthError::InvalidConfig {
            reason: "ADFS is not configured".to_string(),
        });
    };

    let original_query: Vec<(String, String)> = query
        .as_deref()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    if let Some((_, client)) = original_query.iter().find(|(k, _)| k == "client") {
        ctx.client = client.parse().unwrap_or_default();
    }

    match strategy.begin(&ctx, original_query).await {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "could not start sign-in");
            failure_redirect(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// GET|POST /auth/adfs.callback
// ---------------------------------------------------------------------------

/// Provider callback delivered as a query string.
pub async fn callback_query(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    complete(&state, &ctx, jar, &params).await
}

/// Provider callback delivered as a `form_post`.
pub async fn callback_form(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    jar: CookieJar,
    Form(params): Form<CallbackParams>,
) -> Response {
    complete(&state, &ctx, jar, &params).await
}

async fn complete(
    state: &AppState,
    ctx: &RequestContext,
    jar: CookieJar,
    params: &CallbackParams,
) -> Response {
    let Some(strategy) = &state.strategy else {
        return failure_redirect(&AuthError::InvalidConfig {
            reason: "ADFS is not configured".to_string(),
        });
    };

    let result = match strategy.authenticate(ctx, params).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, notice = e.notice(), "sign-in denied");
            return failure_redirect(&e);
        }
    };

    let session_id = match state.sessions.establish(&result).await {
        Ok(id) => id,
        Err(e) => {
            let e = AuthError::Session {
                reason: e.to_string(),
            };
            tracing::warn!(error = %e, "could not establish session");
            return failure_redirect(&e);
        }
    };

    tracing::info!(
        user_id = %result.user.id,
        team_id = %result.team.id,
        client = %result.client,
        is_new_user = result.is_new_user,
        "signed in"
    );

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .secure(state.config.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/");

    (jar.add(cookie), Redirect::to(HOME_PATH)).into_response()
}

// ---------------------------------------------------------------------------
// GET /auth/adfs.config
// ---------------------------------------------------------------------------

/// Public description of the provider for the login page.
#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: String,
    pub auth_url: &'static str,
    pub disable_redirect: bool,
}

pub async fn provider_config(State(state): State<Arc<AppState>>) -> Json<ProviderInfo> {
    Json(ProviderInfo {
        id: PROVIDER_ID,
        name: state.adfs.display_name.clone(),
        auth_url: LOGIN_PATH,
        disable_redirect: state.adfs.disable_redirect,
    })
}

// ---------------------------------------------------------------------------
// GET|POST /logout
// ---------------------------------------------------------------------------

/// End the session and redirect to the provider's logout page.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let destination =
        perform_logout(state.sessions.as_ref(), session_id.as_deref(), &state.logout).await;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to(&destination)).into_response()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Redirect to the application root with the error's notice code.
fn failure_redirect(error: &AuthError) -> Response {
    Redirect::to(&format!("/?notice={}", error.notice())).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use super::*;

    use adfs_bridge_auth::AdfsConfig;

    use crate::WebConfig;

    /// Echo the extracted context as `ip|host`.
    async fn extract(trust_proxy: bool, peer: Option<SocketAddr>) -> String {
        let config = WebConfig {
            trust_proxy,
            ..WebConfig::default()
        };
        let state = Arc::new(AppState::in_memory(config, AdfsConfig::default()).unwrap());
        let app: Router = Router::new()
            .route(
                "/",
                get(|Ctx(ctx): Ctx| async move { format!("{:?}|{:?}", ctx.ip, ctx.host) }),
            )
            .with_state(state);

        let mut request = Request::builder()
            .uri("/")
            .header(header::HOST, "wiki.example.com")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        if let Some(addr) = peer {
            request.extensions_mut().insert(ConnectInfo(addr));
        }

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn ctx_uses_forwarded_for_behind_trusted_proxy() {
        let peer: SocketAddr = "10.0.0.1:51000".parse().unwrap();
        assert_eq!(
            extract(true, Some(peer)).await,
            "Some(203.0.113.9)|Some(\"wiki.example.com\")"
        );
    }

    #[tokio::test]
    async fn ctx_ignores_forwarded_for_by_default() {
        let peer: SocketAddr = "198.51.100.7:51000".parse().unwrap();
        assert_eq!(
            extract(false, Some(peer)).await,
            "Some(198.51.100.7)|Some(\"wiki.example.com\")"
        );
        assert_eq!(extract(false, None).await, "None|Some(\"wiki.example.com\")");
    }

    #[test]
    fn client_ip_falls_back_to_peer_on_bad_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        let peer = Some("192.0.2.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer, true), peer);
    }

    #[test]
    fn failure_redirect_carries_notice() {
        let response = failure_redirect(&AuthError::MalformedUserInfo);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/?notice=malformed-user-info"
        );
    }
}
