pub mod assets;
pub mod cors;
pub mod download;
pub mod search;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::archive::ArchiveError;
use crate::search::SearchError;
use crate::state::AppState;

/// Success code understood by the front-end / 成功码
pub const CODE_SUCCESS: i32 = 20000;
/// Error code understood by the front-end / 错误码
pub const CODE_ERROR: i32 = 40000;

/// JSON envelope of every API response / 统一响应结构
#[derive(Debug, Serialize)]
pub struct ResBody<T = ()> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
    pub pages: usize,
}

impl<T> ResBody<T> {
    pub fn success(data: Option<T>, pages: usize) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: "success".to_string(),
            data,
            pages,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            code: CODE_ERROR,
            message: format!("error: {}", message),
            data: None,
            pages: 0,
        }
    }
}

/// Handler failures, rendered as an error envelope / 处理错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("parameters error")]
    InvalidParameters,

    #[error("waiting for search results too long")]
    SearchTimeout,

    #[error("{0}")]
    SearchFailed(String),

    #[error("error request")]
    BadRequest,

    #[error("Directory too large")]
    DirectoryTooLarge,

    #[error("{0}")]
    Io(String),

    #[error("error request")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameters | ApiError::SearchTimeout | ApiError::SearchFailed(_) => StatusCode::OK,
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::DirectoryTooLarge => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Io(ref detail) = self {
            tracing::error!("Request failed: {}", detail);
        }
        (self.status(), Json(ResBody::<()>::error(&self.to_string()))).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::TimedOut(_) => ApiError::SearchTimeout,
            SearchError::Backend(_) => ApiError::SearchFailed(e.to_string()),
        }
    }
}

impl From<ArchiveError> for ApiError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::NotFound(_) | ArchiveError::NotADirectory(_) => ApiError::BadRequest,
            other => ApiError::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Io(e.to_string())
    }
}

/// Query-string parameters; malformed strings become a parameters error / 查询参数
pub struct Params(pub HashMap<String, String>);

impl Params {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Params {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(map) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InvalidParameters)?;
        Ok(Params(map))
    }
}

/// Everything no route claims: bundled resources, download-by-name, else an error / 兜底处理
///
/// The front-end downloads with `GET /<name>?filePath=...` so the browser
/// keeps a readable file name.
pub async fn fallback(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    params: Params,
) -> Response {
    if method == Method::GET {
        if let Some(resp) = assets::serve_asset(uri.path()) {
            return resp;
        }
        if let Some(file_path) = params.get("filePath") {
            return download::serve_download(&state, file_path).await.into_response();
        }
    }
    tracing::debug!("Unhandled request: {} {}", method, uri);
    ApiError::NotFound.into_response()
}

/// Build the application router / 构建路由
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(search::search).fallback(fallback))
        .route("/results", get(search::results).fallback(fallback))
        .route("/download", get(download::download).fallback(fallback))
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), cors::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
