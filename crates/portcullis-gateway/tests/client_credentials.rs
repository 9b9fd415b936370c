#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::future::join_all;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Request};
use url::Url;

use portcullis_core::error::ErrorCode;
use portcullis_core::Context;
use portcullis_gateway::endpoint::{
    AuthStrategy, ClientCredentialsConfig, ClientCredentialsStrategy,
};

use common::{token_json, ScriptedEndpoint};

fn strategy(base: &str, scopes: &[&str]) -> ClientCredentialsStrategy {
    ClientCredentialsStrategy::new(ClientCredentialsConfig {
        client_id: "client-1".into(),
        client_secret: "p@ss".into(),
        token_url: format!("{base}/oauth2/token"),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
    })
    .expect("strategy")
}

fn upstream_request() -> Request {
    Request::new(Method::GET, Url::parse("http://upstream.invalid/api").unwrap())
}

fn authorization(req: &Request) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap().to_string())
}

#[tokio::test]
async fn token_is_cached_until_near_expiry() {
    let server = ScriptedEndpoint::new(vec![token_json("t1", 3600)]);
    let base = server.serve().await;
    let cc = strategy(&base, &[]);

    let mut first = upstream_request();
    cc.apply(&Context::background(), &mut first).await.unwrap();
    let mut second = upstream_request();
    cc.apply(&Context::background(), &mut second).await.unwrap();

    assert_eq!(authorization(&first).as_deref(), Some("Bearer t1"));
    assert_eq!(authorization(&second).as_deref(), Some("Bearer t1"));
    assert_eq!(server.hits(), 1);
    assert_eq!(cc.cached_token().unwrap().access_token, "t1");
}

#[tokio::test]
async fn token_inside_margin_is_refetched() {
    // 10s of lifetime is already inside the 15s margin
    let server =
        ScriptedEndpoint::new(vec![token_json("t1", 10), token_json("t2", 3600)]);
    let base = server.serve().await;
    let cc = strategy(&base, &[]);

    let mut req = upstream_request();
    cc.apply(&Context::background(), &mut req).await.unwrap();
    assert_eq!(authorization(&req).as_deref(), Some("Bearer t1"));
    assert!(cc.cached_token().is_none());

    let mut req = upstream_request();
    cc.apply(&Context::background(), &mut req).await.unwrap();
    assert_eq!(authorization(&req).as_deref(), Some("Bearer t2"));

    let mut req = upstream_request();
    cc.apply(&Context::background(), &mut req).await.unwrap();
    assert_eq!(authorization(&req).as_deref(), Some("Bearer t2"));
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn huge_expires_in_is_clamped() {
    let server = ScriptedEndpoint::new(vec![token_json("t1", u64::MAX)]);
    let base = server.serve().await;
    let cc = strategy(&base, &[]);

    let mut req = upstream_request();
    cc.apply(&Context::background(), &mut req).await.unwrap();
    assert_eq!(authorization(&req).as_deref(), Some("Bearer t1"));

    let mut req = upstream_request();
    cc.apply(&Context::background(), &mut req).await.unwrap();
    assert_eq!(authorization(&req).as_deref(), Some("Bearer t1"));
    assert_eq!(server.hits(), 1);
    assert!(cc.cached_token().is_some());
}

#[tokio::test]
async fn concurrent_callers_share_the_cached_token() {
    let server = ScriptedEndpoint::new(vec![token_json("t1", 3600)])
        .with_delay(Duration::from_millis(50));
    let base = server.serve().await;
    let cc = strategy(&base, &[]);

    let calls = (0..16).map(|_| async {
        let mut req = upstream_request();
        cc.apply(&Context::background(), &mut req).await.map(|_| req)
    });
    for res in join_all(calls).await {
        let req = res.unwrap();
        assert_eq!(authorization(&req).as_deref(), Some("Bearer t1"));
    }
    // fetches race on a cold cache; every caller gets a token regardless
    let cold_hits = server.hits();
    assert!((1..=16).contains(&cold_hits));

    let calls = (0..16).map(|_| async {
        let mut req = upstream_request();
        cc.apply(&Context::background(), &mut req).await.map(|_| req)
    });
    for res in join_all(calls).await {
        assert_eq!(authorization(&res.unwrap()).as_deref(), Some("Bearer t1"));
    }
    assert_eq!(server.hits(), cold_hits);
}

#[tokio::test]
async fn failed_fetch_leaves_request_untouched() {
    let server = ScriptedEndpoint::new(vec![(StatusCode::INTERNAL_SERVER_ERROR, "boom".into())]);
    let base = server.serve().await;
    let cc = strategy(&base, &[]);

    let mut req = upstream_request();
    let err = cc
        .apply(&Context::background(), &mut req)
        .await
        .expect_err("token endpoint fails");

    assert_eq!(err.code(), ErrorCode::Communication);
    assert!(authorization(&req).is_none());
    assert!(cc.cached_token().is_none());
}

#[tokio::test]
async fn malformed_token_response_is_internal() {
    let server = ScriptedEndpoint::new(vec![(StatusCode::OK, "not json".into())]);
    let base = server.serve().await;
    let cc = strategy(&base, &[]);

    let mut req = upstream_request();
    let err = cc.apply(&Context::background(), &mut req).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);
    assert!(authorization(&req).is_none());
}

#[tokio::test]
async fn deadline_during_fetch_caches_nothing() {
    let server = ScriptedEndpoint::new(vec![token_json("slow", 3600)])
        .with_delay(Duration::from_millis(500));
    let base = server.serve().await;
    let cc = strategy(&base, &[]);

    let ctx = Context::with_timeout(Duration::from_millis(50));
    let mut req = upstream_request();
    let err = cc.apply(&ctx, &mut req).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::CommunicationTimeout);
    assert!(authorization(&req).is_none());
    assert!(cc.cached_token().is_none());
}

#[tokio::test]
async fn token_request_shape() {
    let server = ScriptedEndpoint::new(vec![token_json("t1", 3600)]);
    let base = server.serve().await;
    let cc = strategy(&base, &["read", "write"]);

    let mut req = upstream_request();
    cc.apply(&Context::background(), &mut req).await.unwrap();

    let recorded = server.requests();
    assert_eq!(recorded.len(), 1);
    let token_req = &recorded[0];

    assert_eq!(token_req.body, "grant_type=client_credentials&scope=read+write");
    assert_eq!(
        token_req.headers.get("content-type").unwrap(),
        "application/x-www-form-urlencoded"
    );
    assert_eq!(token_req.headers.get("accept").unwrap(), "application/json");

    // id and secret are form-encoded before basic auth
    let expected = format!("Basic {}", STANDARD.encode("client-1:p%40ss"));
    assert_eq!(
        token_req.headers.get("authorization").unwrap().to_str().unwrap(),
        expected
    );
}

#[test]
fn missing_credentials_rejected() {
    let err = ClientCredentialsStrategy::new(ClientCredentialsConfig {
        client_id: String::new(),
        client_secret: "s".into(),
        token_url: "http://127.0.0.1:1/token".into(),
        scopes: Vec::new(),
    })
    .err()
    .expect("must fail");
    assert_eq!(err.code(), ErrorCode::Configuration);
}
