//! [`AuthDataSource`] over an inbound HTTP request.

use std::collections::HashMap;

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use url::form_urlencoded;

use portcullis_core::AuthDataSource;

pub struct RequestData {
    headers: HeaderMap,
    cookies: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl RequestData {
    pub fn new(headers: HeaderMap, query: Option<&str>) -> Self {
        let cookies = parse_cookies(&headers);
        let query = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self {
            headers,
            cookies,
            query,
        }
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

impl AuthDataSource for RequestData {
    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn query(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }
}
