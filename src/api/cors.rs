//! Cross-origin handling / 跨域处理
//!
//! Preflight requests are answered directly with an empty 200. The
//! `Access-Control-*` headers are only attached when CORS is enabled.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::state::AppState;

const ALLOW_METHODS: &str = "POST,GET,OPTIONS";

/// A preflight carries the origin and both `Access-Control-Request-*` headers / 是否为预检请求
pub fn is_preflight(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key("origin")
        && headers.contains_key("access-control-request-method")
        && headers.contains_key("access-control-request-headers")
}

pub async fn cors(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let mut response = if is_preflight(request.method(), request.headers()) {
        tracing::debug!("Answering preflight for {}", request.uri());
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    if state.config.server.cors_enabled {
        let headers = response.headers_mut();
        headers.insert("access-control-allow-methods", HeaderValue::from_static(ALLOW_METHODS));
        headers.insert("access-control-allow-headers", HeaderValue::from_static("*"));
        headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
        headers.insert("access-control-max-age", HeaderValue::from_static("0"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_preflight() {
        let mut headers = HeaderMap::new();
        headers.insert("origin", HeaderValue::from_static("http://a"));
        headers.insert("access-control-request-method", HeaderValue::from_static("POST"));
        assert!(!is_preflight(&Method::OPTIONS, &headers));

        headers.insert("access-control-request-headers", HeaderValue::from_static("content-type"));
        assert!(is_preflight(&Method::OPTIONS, &headers));
        assert!(!is_preflight(&Method::GET, &headers));
    }
}
