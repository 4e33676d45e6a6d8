//! Integration tests for the adfs-bridge-web router.
//!
//! Requests go through the real router with `tower::ServiceExt::oneshot`.
//! The ADFS token endpoint is a small Axum server bound to an ephemeral
//! port that hands out unsigned JWTs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Form, State};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

use adfs_bridge_auth::{AdfsConfig, MemoryAccounts, MemorySessions, MemoryStateStore};
use adfs_bridge_web::{AppState, WebConfig, router};

// ── helpers ──────────────────────────────────────────────────────────────────

fn jwt(claims: Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Start a fake token endpoint that answers every grant with `claims`.
async fn start_token_server(claims: Value) -> SocketAddr {
    let app = Router::new()
        .route(
            "/adfs/oauth2/token",
            post(
                |State(token): State<String>, Form(form): Form<HashMap<String, String>>| async move {
                    assert_eq!(form.get("grant_type").map(String::as_str), Some("authorization_code"));
                    Json(json!({
                        "access_token": token,
                        "refresh_token": "refresh-1",
                        "expires_in": 3600,
                        "token_type": "bearer"
                    }))
                },
            ),
        )
        .with_state(jwt(claims));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to port 0");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

fn config(pairs: &[(&str, String)]) -> AdfsConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    AdfsConfig::from_source(|key| map.get(key).cloned()).expect("valid config")
}

fn enabled_config(base: &str) -> AdfsConfig {
    config(&[
        ("ADFS_CLIENT_ID", "wiki-client".into()),
        ("ADFS_CLIENT_SECRET", "wiki-secret".into()),
        ("ADFS_URI", base.into()),
        ("ADFS_DISPLAY_NAME", "Corporate Login".into()),
        ("URL", "https://wiki.example.com".into()),
    ])
}

struct Harness {
    app: Router,
    sessions: Arc<MemorySessions>,
    accounts: Arc<MemoryAccounts>,
}

fn harness(adfs: AdfsConfig) -> Harness {
    let accounts = Arc::new(MemoryAccounts::new());
    let sessions = Arc::new(MemorySessions::new());
    let state = AppState::new(
        WebConfig::default(),
        adfs,
        Arc::new(MemoryStateStore::new()),
        accounts.clone(),
        accounts.clone(),
        sessions.clone(),
    )
    .expect("state");
    Harness {
        app: router(Arc::new(state)),
        sessions,
        accounts,
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("infallible")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

fn query(url: &str) -> HashMap<String, String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect()
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("adfs_bridge_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Run `GET /auth/adfs` and return the `state` sent to the provider.
async fn begin(app: &Router, uri: &str) -> String {
    let response = send(app, get(uri)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    query(&location(&response))["state"].clone()
}

// ── configuration ────────────────────────────────────────────────────────────

#[test]
fn web_config_defaults() {
    let config = WebConfig::default();
    assert_eq!(config.bind_addr, "127.0.0.1");
    assert_eq!(config.port, 3000);
    assert!(!config.secure_cookies);
    assert!(!config.trust_proxy);
}

// ── registration guard ───────────────────────────────────────────────────────

#[tokio::test]
async fn routes_absent_when_not_configured() {
    let h = harness(config(&[]));

    for uri in ["/auth/adfs", "/auth/adfs.callback?code=x&state=y", "/auth/adfs.config"] {
        let response = send(&h.app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    // Logout is always available and falls back to the root.
    let response = send(&h.app, get("/logout")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn provider_descriptor_is_public() {
    let h = harness(enabled_config("https://adfs.example.com"));
    let response = send(&h.app, get("/auth/adfs.config")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["id"], "adfs");
    assert_eq!(json["name"], "Corporate Login");
    assert_eq!(json["auth_url"], "/auth/adfs");
    assert_eq!(json["disable_redirect"], false);
}

// ── sign-in ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn begin_redirects_to_provider() {
    let h = harness(enabled_config("https://adfs.example.com"));
    let response = send(&h.app, get("/auth/adfs?prompt=login&scope=override")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with("https://adfs.example.com/adfs/oauth2/authorize?"));

    let q = query(&target);
    assert_eq!(q["prompt"], "login");
    assert_eq!(q["scope"], "openid profile email");
    assert_eq!(q["client_id"], "wiki-client");
    assert_eq!(q["response_type"], "code");
    assert_eq!(q["resource"], "outline");
    assert_eq!(q["redirect_uri"], "https://wiki.example.com/auth/adfs.callback");
    assert!(!q["state"].is_empty());
}

#[tokio::test]
async fn callback_signs_in_and_sets_session() {
    let addr = start_token_server(json!({
        "email": "Jane@Example.com",
        "name": "Jane Doe",
        "sub": "adfs-subject-1"
    }))
    .await;
    let h = harness(enabled_config(&format!("http://{addr}")));

    let state = begin(&h.app, "/auth/adfs?client=desktop").await;
    let response = send(
        &h.app,
        get(&format!("/auth/adfs.callback?code=abc&state={state}")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/home");
    let cookie = session_cookie(&response).expect("session cookie");
    let session_id = cookie.trim_start_matches("adfs_bridge_session=");

    let session = h.sessions.get(session_id).await.expect("session stored");
    assert_eq!(session.user.name, "Jane Doe");
    assert_eq!(session.user.email, "Jane@Example.com");
    assert_eq!(session.team.subdomain, "example");
    assert_eq!(session.client, adfs_bridge_auth::Client::Desktop);
    assert!(session.is_new_user);
    assert_eq!(h.accounts.user_count(), 1);
}

#[tokio::test]
async fn callback_accepts_form_post() {
    let addr = start_token_server(json!({ "email": "a@example.com", "name": "A" })).await;
    let h = harness(enabled_config(&format!("http://{addr}")));

    let state = begin(&h.app, "/auth/adfs").await;
    let request = Request::builder()
        .method("POST")
        .uri("/auth/adfs.callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("code=abc&state={state}")))
        .unwrap();
    let response = send(&h.app, request).await;

    assert_eq!(location(&response), "/home");
    assert_eq!(h.sessions.len().await, 1);
}

#[tokio::test]
async fn replayed_callback_is_rejected() {
    let addr = start_token_server(json!({ "email": "a@example.com", "name": "A" })).await;
    let h = harness(enabled_config(&format!("http://{addr}")));

    let state = begin(&h.app, "/auth/adfs").await;
    let uri = format!("/auth/adfs.callback?code=abc&state={state}");
    assert_eq!(location(&send(&h.app, get(&uri)).await), "/home");

    let replay = send(&h.app, get(&uri)).await;
    assert_eq!(location(&replay), "/?notice=state-mismatch");
    assert_eq!(h.sessions.len().await, 1);
}

#[tokio::test]
async fn provider_error_is_denied() {
    let h = harness(enabled_config("https://adfs.example.com"));
    let response = send(
        &h.app,
        get("/auth/adfs.callback?error=access_denied&error_description=cancelled"),
    )
    .await;
    assert_eq!(location(&response), "/?notice=auth-error");
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn invalid_identity_creates_nothing() {
    let cases = [
        (json!({ "name": "No Email" }), "/?notice=malformed-profile"),
        (json!({ "email": "jane@.com", "name": "J" }), "/?notice=malformed-user-info"),
        (json!({ "email": "jane@example.com", "sub": "s" }), "/?notice=auth-error"),
    ];

    for (claims, expected) in cases {
        let addr = start_token_server(claims.clone()).await;
        let mut adfs = enabled_config(&format!("http://{addr}"));
        // Point the name fallback at a claim that is never present.
        adfs.username_claim = "upn".into();
        let h = harness(adfs);

        let state = begin(&h.app, "/auth/adfs").await;
        let response = send(
            &h.app,
            get(&format!("/auth/adfs.callback?code=abc&state={state}")),
        )
        .await;

        assert_eq!(location(&response), expected, "claims {claims}");
        assert!(session_cookie(&response).is_none());
        assert!(h.sessions.is_empty().await);
        assert_eq!(h.accounts.user_count(), 0);
        assert_eq!(h.accounts.team_count(), 0);
    }
}

// ── logout ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn logout_ends_session_and_redirects_to_provider() {
    let addr = start_token_server(json!({ "email": "a@example.com", "name": "A" })).await;
    let base = format!("http://{addr}");
    let h = harness(enabled_config(&base));

    let state = begin(&h.app, "/auth/adfs").await;
    let signed_in = send(
        &h.app,
        get(&format!("/auth/adfs.callback?code=abc&state={state}")),
    )
    .await;
    let cookie = session_cookie(&signed_in).unwrap();
    assert_eq!(h.sessions.len().await, 1);

    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = send(&h.app, request).await;

    assert!(h.sessions.is_empty().await);
    let target = location(&response);
    assert!(target.starts_with(&format!("{base}/adfs/oauth2/logout?")));
    assert_eq!(
        query(&target)["post_logout_redirect_uri"],
        "https://wiki.example.com/"
    );
}

#[tokio::test]
async fn logout_prefers_explicit_url() {
    let mut adfs = enabled_config("https://adfs.example.com");
    adfs.logout_url = Some(url::Url::parse("https://sso.example.com/signout").unwrap());
    let h = harness(adfs);

    let response = send(&h.app, get("/logout")).await;
    assert!(location(&response).starts_with("https://sso.example.com/signout?post_logout_redirect_uri="));
}
