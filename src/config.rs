//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location / 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "FILE_ENGINE_REMOTE_CONFIG";

/// Environment switch that forces CORS headers on / 强制开启CORS的环境变量
pub const CORS_ENV: &str = "File_Engine_Remote_CORS";

/// Collaborator view of the configuration / 配置源接口
///
/// The HTTP layer only ever needs a port and two storage locations.
pub trait ConfigSource {
    fn port(&self) -> u16;
    fn temp_path(&self) -> PathBuf;
    fn config_path(&self) -> PathBuf;
}

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Storage paths / 存储路径配置
    pub storage: StorageConfig,
    /// Search configuration / 搜索配置
    pub search: SearchConfig,
    /// Result paging configuration / 结果分页配置
    pub results: ResultsConfig,
    /// Download configuration / 下载配置
    pub download: DownloadConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
    /// Attach CORS headers to every response / 是否添加CORS响应头
    pub cors_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for temporary archives / 临时压缩包目录
    pub temp_dir: String,
    /// Directory holding plugin configuration files / 配置文件目录
    pub config_dir: String,
}

/// Which search engine answers queries / 搜索后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process filename scanner / 本地扫描
    Local,
    /// File-Engine core reachable over HTTP / 通过HTTP访问核心服务
    Core,
}

/// Search configuration / 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub backend: BackendKind,
    /// Root directories scanned by the local backend / 本地后端扫描的根目录
    pub roots: Vec<String>,
    /// Port of the File-Engine core service / 核心服务端口
    pub core_port: u16,
    /// Maximum number of results per search / 单次搜索最大结果数
    pub max_results: usize,
    /// Seconds a search request waits for results / 等待搜索结果的秒数
    pub wait_timeout_secs: u64,
    /// Maximum accepted input length in characters / 输入最大字符数
    pub max_input_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    /// Page size used when the client omits one / 默认每页结果数
    pub max_results_per_page: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directories larger than this are refused / 目录打包大小上限
    pub max_archive_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 23333,
            cors_enabled: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: "tmp".to_string(),
            config_dir: ".".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            roots: default_roots(),
            core_port: 50721,
            max_results: 200,
            wait_timeout_secs: 10,
            max_input_chars: 300,
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self { max_results_per_page: 20 }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self { max_archive_bytes: 100 * 1024 * 1024 }
    }
}

fn default_roots() -> Vec<String> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| "/".to_string());
    vec![home]
}

impl AppConfig {
    /// Get the temporary archive directory / 获取临时目录
    ///
    /// A relative `temp_dir` is resolved against `config_dir`.
    pub fn get_temp_dir(&self) -> PathBuf {
        let temp_dir = PathBuf::from(&self.storage.temp_dir);
        if temp_dir.is_absolute() {
            temp_dir
        } else {
            PathBuf::from(&self.storage.config_dir).join(temp_dir)
        }
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Search wait deadline / 搜索等待超时
    pub fn wait_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.search.wait_timeout_secs)
    }

    /// Apply environment overrides / 应用环境变量覆盖
    pub fn apply_env(&mut self) {
        if std::env::var(CORS_ENV).map(|v| v == "true").unwrap_or(false) {
            self.server.cors_enabled = true;
        }
    }
}

impl ConfigSource for AppConfig {
    fn port(&self) -> u16 {
        self.server.port
    }

    fn temp_path(&self) -> PathBuf {
        self.get_temp_dir()
    }

    fn config_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.config_dir)
    }
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    let mut config = if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        config
    } else {
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        config
    };
    config.apply_env();
    Ok(config)
}

/// Save configuration to file / 保存配置到文件
pub fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_created_on_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.port(), 23333);
        assert_eq!(config.search.wait_timeout_secs, 10);
        assert_eq!(config.download.max_archive_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"server":{"port":8080},"search":{"backend":"core"}}"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.search.backend, BackendKind::Core);
        assert_eq!(config.results.max_results_per_page, 20);
    }

    #[test]
    fn test_temp_dir_relative_to_config_dir() {
        let mut config = AppConfig::default();
        config.storage.config_dir = "/srv/fileengine".to_string();
        assert_eq!(config.temp_path(), PathBuf::from("/srv/fileengine/tmp"));
        assert_eq!(config.config_path(), PathBuf::from("/srv/fileengine"));

        let absolute = std::env::temp_dir().join("fer-archives");
        config.storage.temp_dir = absolute.to_string_lossy().into_owned();
        assert_eq!(config.temp_path(), absolute);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config_from(&path).is_err());
    }
}
