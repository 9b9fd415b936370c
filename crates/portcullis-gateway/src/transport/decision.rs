//! `ANY /decisions/*path`: run the matching rule and answer with its
//! decision.
//!
//! - allow: 200 carrying the headers (and a combined `cookie` header) the
//!   mutators produced, for the proxy to forward upstream
//! - handled error: the error handler's status and headers
//! - unhandled error: status derived from the error code, JSON body

use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::{Context, SubjectContext};

use crate::app_state::AppState;
use crate::mechanisms::error_handlers::status_for;
use crate::mechanisms::ErrorResponse;
use crate::rules::Decision;
use crate::transport::request_data::RequestData;

const PREFIX: &str = "/decisions";

pub async fn decide(
    State(app): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = match uri.path().strip_prefix(PREFIX) {
        Some(p) if p.starts_with('/') => p,
        _ => "/",
    };

    let snapshot = app.snapshot();
    let Some(rule) = snapshot.rules.find(method.as_str(), path) else {
        tracing::debug!(%method, path, "no rule matched");
        return error_json(StatusCode::NOT_FOUND, "no_rule", "no rule matches the request");
    };

    let ads = RequestData::new(headers, uri.query());
    let ctx = Context::with_timeout(Duration::from_millis(snapshot.cfg.serve.timeout_ms));

    let rendered = match rule.execute(&ctx, &ads).await {
        Ok(Decision::Allow(sc)) => allow_response(&sc),
        Ok(Decision::Respond(resp)) => handled_response(resp),
        Err(e) => return unhandled_response(&e),
    };

    rendered.unwrap_or_else(|e| {
        tracing::warn!(rule = %rule.id(), error = %e, "failed to render decision");
        unhandled_response(&e)
    })
}

fn allow_response(sc: &SubjectContext) -> Result<Response> {
    let mut resp = StatusCode::OK.into_response();
    let out = resp.headers_mut();
    for (name, value) in &sc.headers {
        out.insert(header_name(name)?, header_value(value)?);
    }
    if !sc.cookies.is_empty() {
        let cookies = sc
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        out.insert(axum::http::header::COOKIE, header_value(&cookies)?);
    }
    Ok(resp)
}

fn handled_response(er: ErrorResponse) -> Result<Response> {
    let mut resp = er.status.into_response();
    let out = resp.headers_mut();
    for (name, value) in &er.headers {
        out.append(header_name(name)?, header_value(value)?);
    }
    Ok(resp)
}

fn unhandled_response(err: &PortcullisError) -> Response {
    error_json(status_for(err), err.root().code().as_str(), &err.to_string())
}

fn error_json(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "code": code, "message": message }))).into_response()
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| PortcullisError::internal_caused_by(format!("invalid header name {name}"), e))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| PortcullisError::internal_caused_by("invalid header value", e))
}
