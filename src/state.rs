use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, BackendKind};
use crate::search::{CoreHttpBackend, LocalSearchBackend, SearchBackend, SearchCoordinator};

/// Shared state handed to every request handler / 请求处理共享状态
pub struct AppState {
    pub config: AppConfig,
    pub coordinator: SearchCoordinator,
    /// How long `/search` waits for the backend / 搜索等待时长
    pub wait_timeout: Duration,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Arc<dyn SearchBackend>) -> Self {
        let wait_timeout = config.wait_timeout();
        Self {
            config,
            coordinator: SearchCoordinator::new(backend),
            wait_timeout,
        }
    }
}

/// Build the search backend selected in the config / 根据配置创建搜索后端
pub fn backend_from_config(config: &AppConfig) -> anyhow::Result<Arc<dyn SearchBackend>> {
    let search = &config.search;
    let backend: Arc<dyn SearchBackend> = match search.backend {
        BackendKind::Local => {
            let roots = search.roots.iter().map(PathBuf::from).collect();
            Arc::new(LocalSearchBackend::new(roots, search.max_results))
        }
        BackendKind::Core => Arc::new(CoreHttpBackend::new(search.core_port, search.max_results)?),
    };
    Ok(backend)
}
