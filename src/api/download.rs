//! File and directory downloads / 文件与目录下载

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ApiError, Params};
use crate::archive;
use crate::config::ConfigSource;
use crate::download::{content_disposition, FileStream, TempFileGuard};
use crate::mime::OCTET_STREAM;
use crate::state::AppState;

/// `GET /download?filePath=...` / 下载文件或目录
pub async fn download(State(state): State<Arc<AppState>>, params: Params) -> Result<Response, ApiError> {
    let file_path = params.get("filePath").ok_or(ApiError::BadRequest)?;
    serve_download(&state, file_path).await
}

/// Stream a file as is, or a directory as a freshly built zip / 下载文件，目录先打包
pub async fn serve_download(state: &AppState, file_path: &str) -> Result<Response, ApiError> {
    if file_path.is_empty() {
        return Err(ApiError::BadRequest);
    }
    let path = PathBuf::from(file_path);
    let meta = tokio::fs::metadata(&path).await.map_err(|e| {
        tracing::debug!("Download target {:?} unavailable: {}", path, e);
        ApiError::BadRequest
    })?;

    if meta.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string());
        tracing::info!("Downloading file {:?}", path);
        return stream_file(&path, &name, None).await;
    }
    if !meta.is_dir() {
        return Err(ApiError::BadRequest);
    }

    let guard = build_directory_archive(state, &path).await?;
    tracing::info!("Downloading directory {:?} as {:?}", path, guard.path());
    let name = archive::archive_download_name(&path);
    let archive_path = guard.path().to_path_buf();
    stream_file(&archive_path, &name, Some(guard)).await
}

async fn build_directory_archive(state: &AppState, dir: &Path) -> Result<TempFileGuard, ApiError> {
    let max_bytes = state.config.download.max_archive_bytes;
    let temp_dir = state.config.temp_path();
    let source = dir.to_path_buf();

    let built = tokio::task::spawn_blocking(move || -> Result<Option<TempFileGuard>, archive::ArchiveError> {
        let report = archive::probe_size(&source, max_bytes)?;
        if report.exceeded {
            tracing::warn!(
                "Refusing to archive {:?}: over {} bytes after {} files",
                source, max_bytes, report.files_scanned
            );
            return Ok(None);
        }
        std::fs::create_dir_all(&temp_dir)?;
        let guard = TempFileGuard::new(archive::unique_archive_path(&temp_dir, &source));
        // a failed build drops the guard and removes the partial archive
        archive::build_archive(&source, guard.path())?;
        Ok(Some(guard))
    })
    .await
    .map_err(|e| ApiError::Io(format!("archive task failed: {}", e)))??;

    built.ok_or(ApiError::DirectoryTooLarge)
}

async fn stream_file(path: &Path, name: &str, cleanup: Option<TempFileGuard>) -> Result<Response, ApiError> {
    let (stream, len) = FileStream::open(path, cleanup).await?;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, OCTET_STREAM)
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition(name))
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Io(e.to_string()))
}
