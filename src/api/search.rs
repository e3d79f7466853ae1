//! Search and result paging endpoints / 搜索与分页接口

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, Params, ResBody};
use crate::search::{page, Query};
use crate::state::AppState;

/// One row of `/results` / 结果条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub file_path: String,
    pub is_dir: bool,
}

/// `POST /search?inputText=...` / 发起搜索并等待结果
///
/// Replies only once the backend has produced results or the wait times out.
pub async fn search(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<Json<ResBody>, ApiError> {
    let input = params.get("inputText").unwrap_or_default();
    let len = input.chars().count();
    if len == 0 || len >= state.config.search.max_input_chars {
        tracing::debug!("Rejected search input of {} chars", len);
        return Err(ApiError::InvalidParameters);
    }

    let query = Query::parse(input).ok_or(ApiError::InvalidParameters)?;
    state.coordinator.submit(query).await?;
    let results = state.coordinator.wait_for_results(state.wait_timeout).await?;
    tracing::debug!("Search answered with {} results", results.len());

    Ok(Json(ResBody::success(None, 0)))
}

/// `GET /results?pageNum=N&pageSize=M` / 分页获取结果
pub async fn results(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<Json<ResBody<Vec<ResultItem>>>, ApiError> {
    let page_num = positive(params.get("pageNum"))?;
    let page_size = match params.get("pageSize") {
        Some(raw) => positive(Some(raw))?,
        None => state.config.results.max_results_per_page,
    };

    let all = state.coordinator.results().unwrap_or_default();
    let current = page(all.as_slice(), page_num, page_size);

    let mut items = Vec::with_capacity(current.items.len());
    for file_path in current.items {
        let is_dir = tokio::fs::metadata(&file_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        items.push(ResultItem { file_path, is_dir });
    }

    Ok(Json(ResBody::success(Some(items), current.total_pages)))
}

fn positive(raw: Option<&str>) -> Result<usize, ApiError> {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v >= 1)
        .ok_or(ApiError::InvalidParameters)
}

