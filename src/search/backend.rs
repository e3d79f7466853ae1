//! Search backends / 搜索后端
//!
//! - `LocalSearchBackend`: scans configured roots on a blocking worker
//! - `CoreHttpBackend`: forwards the query to a File-Engine core over HTTP
//!
//! Both return from `start_search` right away and report through [`ResultSink`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::coordinator::{ResultSink, SearchTicket};
use super::query::Query;

/// Filter: files only / 仅文件
pub const FILTER_FILE: &str = "f";
/// Filter: directories only / 仅文件夹
pub const FILTER_DIR: &str = "d";
/// Filter: whole name must equal the keyword / 全字匹配
pub const FILTER_FULL: &str = "full";
/// Filter: case sensitive / 区分大小写
pub const FILTER_CASE: &str = "case";
/// Filter: match against the full path / 匹配完整路径
pub const FILTER_PATH: &str = "p";

/// Search engine seen from the HTTP side / 搜索引擎接口
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start a search and return without waiting for it / 启动搜索（不等待完成）
    async fn start_search(&self, ticket: SearchTicket, query: Query, sink: ResultSink) -> anyhow::Result<()>;
}

/// In-process filename search / 本地文件名搜索
pub struct LocalSearchBackend {
    roots: Vec<PathBuf>,
    max_results: usize,
}

impl LocalSearchBackend {
    pub fn new(roots: Vec<PathBuf>, max_results: usize) -> Self {
        Self { roots, max_results }
    }
}

#[async_trait]
impl SearchBackend for LocalSearchBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn start_search(&self, ticket: SearchTicket, query: Query, sink: ResultSink) -> anyhow::Result<()> {
        let roots = self.roots.clone();
        let max_results = self.max_results;

        tokio::spawn(async move {
            let scan_sink = sink.clone();
            let handle = tokio::task::spawn_blocking(move || {
                scan_roots(&roots, &query, max_results, || scan_sink.is_current(ticket))
            });
            match handle.await {
                Ok(results) => {
                    sink.deliver(ticket, results);
                }
                Err(e) => {
                    sink.fail(ticket, format!("scan task aborted: {}", e));
                }
            }
        });
        Ok(())
    }
}

/// Breadth-first scan of `roots`; stops early once `still_wanted` turns false / 广度优先扫描
pub fn scan_roots(
    roots: &[PathBuf],
    query: &Query,
    max_results: usize,
    still_wanted: impl Fn() -> bool,
) -> Vec<String> {
    let mut results = Vec::new();
    if query.keywords.is_empty() || max_results == 0 {
        return results;
    }

    let mut queue: VecDeque<PathBuf> = roots.iter().cloned().collect();
    let mut visited_dirs = 0usize;

    while let Some(dir) = queue.pop_front() {
        visited_dirs += 1;
        if visited_dirs % 64 == 0 && !still_wanted() {
            tracing::debug!("Local scan abandoned after {} directories", visited_dirs);
            break;
        }

        let mut entries: Vec<_> = match std::fs::read_dir(&dir) {
            Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
            Err(e) => {
                tracing::debug!("Skipping unreadable directory {:?}: {}", dir, e);
                continue;
            }
        };
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let Ok(file_type) = entry.file_type() else { continue };
            if file_type.is_symlink() {
                continue;
            }
            let path = entry.path();
            let is_dir = file_type.is_dir();

            if matches_query(query, &path, is_dir) {
                results.push(path.to_string_lossy().into_owned());
                if results.len() >= max_results {
                    return results;
                }
            }
            if is_dir {
                queue.push_back(path);
            }
        }
    }
    results
}

/// Whether `path` satisfies the keywords and case filters / 判断路径是否匹配
pub fn matches_query(query: &Query, path: &Path, is_dir: bool) -> bool {
    if query.has_filter(FILTER_FILE) && is_dir {
        return false;
    }
    if query.has_filter(FILTER_DIR) && !is_dir {
        return false;
    }

    let target = if query.has_filter(FILTER_PATH) {
        path.to_string_lossy().into_owned()
    } else {
        match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return false,
        }
    };

    let case_sensitive = query.has_filter(FILTER_CASE);
    let target = if case_sensitive { target } else { target.to_lowercase() };
    let full = query.has_filter(FILTER_FULL);

    query.keywords.iter().all(|keyword| {
        let keyword = if case_sensitive { keyword.clone() } else { keyword.to_lowercase() };
        if full {
            target == keyword
        } else {
            target.contains(&keyword)
        }
    })
}

/// File-Engine core reachable over HTTP / 通过HTTP调用的核心搜索服务
pub struct CoreHttpBackend {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl CoreHttpBackend {
    /// Core listening on localhost / 本机核心服务
    pub fn new(core_port: u16, max_results: usize) -> anyhow::Result<Self> {
        Self::with_base_url(format!("http://127.0.0.1:{}", core_port), max_results)
    }

    pub fn with_base_url(base_url: impl Into<String>, max_results: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_results,
        })
    }
}

/// Wire form of a query for the core / 核心服务使用的搜索文本格式
///
/// `keyword;keyword|filter;filter` when filters exist, the plain text otherwise.
pub fn core_search_text(query: &Query) -> String {
    match &query.case_filters {
        Some(filters) => format!("{}|{}", query.keywords.join(";"), filters.join(";")),
        None => query.search_text.clone(),
    }
}

#[async_trait]
impl SearchBackend for CoreHttpBackend {
    fn name(&self) -> &'static str {
        "core"
    }

    async fn start_search(&self, ticket: SearchTicket, query: Query, sink: ResultSink) -> anyhow::Result<()> {
        let request = self
            .client
            .post(format!("{}/search", self.base_url))
            .query(&[
                ("searchText", core_search_text(&query)),
                ("maxResultNum", self.max_results.to_string()),
            ]);

        tokio::spawn(async move {
            let outcome = async {
                let resp = request.send().await?.error_for_status()?;
                Ok::<_, reqwest::Error>(resp.json::<Vec<String>>().await?)
            }
            .await;

            match outcome {
                Ok(results) => {
                    sink.deliver(ticket, results);
                }
                Err(e) => {
                    sink.fail(ticket, format!("core search request failed: {}", e));
                }
            }
        });
        Ok(())
    }
}
