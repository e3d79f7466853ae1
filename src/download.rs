//! Download streaming / 下载流
//!
//! Files are streamed, never loaded into memory. A temporary archive is
//! tied to its response stream and removed when the stream is dropped,
//! whether the transfer finished, failed or the client went away.
//! 临时压缩包与响应流绑定，流被释放时删除。

use bytes::Bytes;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::io::ReaderStream;

/// Removes a temporary file on drop / 释放时删除临时文件
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temporary file {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove temporary file {:?}: {}", self.path, e),
        }
    }
}

/// File byte stream with transfer accounting / 带流量统计的文件流
pub struct FileStream {
    inner: ReaderStream<tokio::fs::File>,
    path: PathBuf,
    bytes_transferred: u64,
    expected: u64,
    _cleanup: Option<TempFileGuard>,
}

impl FileStream {
    /// Open `path` for streaming; returns the stream and the file length / 打开文件流
    ///
    /// When `cleanup` is given the file is deleted once the stream is dropped,
    /// including when opening fails here.
    pub async fn open(path: &Path, cleanup: Option<TempFileGuard>) -> io::Result<(Self, u64)> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok((
            Self {
                inner: ReaderStream::new(file),
                path: path.to_path_buf(),
                bytes_transferred: 0,
                expected: len,
                _cleanup: cleanup,
            },
            len,
        ))
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }
}

impl Stream for FileStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                self.bytes_transferred += bytes.len() as u64;
                Poll::Ready(Some(Ok(bytes)))
            }
            other => other,
        }
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        if self.bytes_transferred < self.expected {
            tracing::info!(
                "Download of {:?} ended early: {}/{} bytes",
                self.path, self.bytes_transferred, self.expected
            );
        } else {
            tracing::debug!("Download of {:?} finished: {} bytes", self.path, self.bytes_transferred);
        }
    }
}

/// `Content-Disposition` value for a download name / 生成 Content-Disposition
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && !c.is_ascii_control() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(filename)
    )
}
