#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tower::ServiceExt;

use portcullis_gateway::app_state::AppState;
use portcullis_gateway::config;
use portcullis_gateway::router::build_router;

const CONFIG: &str = r#"
version: 1
mechanisms:
  authenticators:
    - { id: basic, type: basic_auth, config: { user_id: alice, password: secret } }
    - { id: anon, type: anonymous }
  authorizers:
    - { id: allow, type: allow }
    - { id: deny, type: deny }
  contextualizers:
    - { id: tenant, type: static, config: { attributes: { tenant: acme } } }
  finalizers:
    - { id: headers, type: header, config: { values: { x-user: "{subject}", x-tenant: "{attr:tenant}" } } }
    - { id: session, type: cookie, config: { values: { user: "{subject}" } } }
  error_handlers:
    - { id: challenge, type: www_authenticate, config: { realm: api } }
    - { id: login, type: redirect, config: { to: "https://login.example.com/" } }
default_pipeline:
  authenticators: [{ id: basic }]
  authorizers: [{ id: allow }]
  contextualizers: [{ id: tenant }]
  finalizers: [{ id: headers }]
  error_handlers: [{ id: challenge }]
rules:
  - id: admin
    match: { path_prefix: /admin, methods: [GET] }
    authorizers: [{ id: deny }]
    error_handlers: [{ id: login }]
  - id: public
    match: { path_prefix: /public }
    authenticators: [{ id: anon }]
    finalizers: [{ id: session }]
  - id: api
    match: { path_prefix: /api }
"#;

fn state() -> AppState {
    AppState::new(config::load_from_str(CONFIG).expect("config")).expect("state")
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

async fn call(app: &AppState, method: &str, uri: &str, auth: Option<String>) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        req = req.header("authorization", auth);
    }
    build_router(app.clone())
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn allowed_request_carries_mutations() {
    let app = state();
    let auth = Some(basic("alice", "secret"));
    let resp = call(&app, "GET", "/decisions/api/items?page=2", auth).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("x-user").unwrap(), "alice");
    assert_eq!(resp.headers().get("x-tenant").unwrap(), "acme");
}

#[tokio::test]
async fn cookies_are_combined_into_one_header() {
    let app = state();
    let resp = call(&app, "POST", "/decisions/public/page", None).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("cookie").unwrap(), "user=anonymous");
    assert!(resp.headers().get("x-user").is_none());
}

#[tokio::test]
async fn handled_error_uses_handler_response() {
    let app = state();
    let resp = call(&app, "GET", "/decisions/api/items", None).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get("www-authenticate").unwrap(),
        "Basic realm=\"api\""
    );
}

#[tokio::test]
async fn unhandled_error_maps_to_status() {
    let app = state();
    // deny -> authorization error; the redirect handler only handles authentication errors
    let resp = call(&app, "GET", "/decisions/admin/users", Some(basic("alice", "secret"))).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "authorization_error");
}

#[tokio::test]
async fn redirect_for_unauthenticated_admin() {
    let app = state();
    let resp = call(&app, "GET", "/decisions/admin/users", None).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("location").unwrap(),
        "https://login.example.com/"
    );
}

#[tokio::test]
async fn no_matching_rule() {
    let app = state();
    // admin only matches GET
    let resp = call(&app, "DELETE", "/decisions/admin/users", None).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "no_rule");
}

#[tokio::test]
async fn failed_reload_keeps_serving_old_rules() {
    let app = state();
    assert_eq!(app.snapshot().rules.len(), 3);

    let broken = config::load_from_str(
        r#"
version: 1
rules:
  - id: api
    authenticators: [{ id: missing }]
"#,
    )
    .unwrap();
    assert!(app.reload(broken).is_err());
    assert_eq!(app.snapshot().rules.len(), 3);

    let resp = call(&app, "GET", "/decisions/api/items", Some(basic("alice", "secret"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn successful_reload_swaps_rules() {
    let app = state();
    let before = app.snapshot();

    let next = config::load_from_str(
        r#"
version: 1
mechanisms:
  authenticators: [{ id: anon, type: anonymous }]
  authorizers: [{ id: allow, type: allow }]
  mutators: [{ id: noop, type: noop }]
  error_handlers: [{ id: default, type: default }]
default_pipeline:
  authenticators: [{ id: anon }]
  authorizers: [{ id: allow }]
  mutators: [{ id: noop }]
  error_handlers: [{ id: default }]
rules:
  - id: everything
"#,
    )
    .unwrap();
    app.reload(next).unwrap();

    assert_eq!(app.snapshot().rules.len(), 1);
    // snapshots taken before the swap stay usable
    assert_eq!(before.rules.len(), 3);

    let resp = call(&app, "GET", "/decisions/admin/users", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
