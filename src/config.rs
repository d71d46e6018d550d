//! 配置模块
//!
//! 支持从 JSON 文件加载系统配置

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 工作线程数（0 表示使用 CPU 核心数）
    #[serde(default)]
    pub workers: usize,
}

/// 数据配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// 价格数据文件
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
    /// 写入请求的 schema 文件
    #[serde(default = "default_schema_path")]
    pub schema_path: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 数据配置
    #[serde(default)]
    pub data: DataConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
    /// 配置来源（文件路径），未找到时为空
    #[serde(skip)]
    pub source: Option<String>,
}

// 默认值函数
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8888 }
fn default_csv_path() -> String { "data/nifty50_all.csv".to_string() }
fn default_schema_path() -> String { "schema/stocks/create.json".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            schema_path: default_schema_path(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 加载配置
    ///
    /// 优先使用 NIFTY_CONFIG 指定的文件，其次 config.json、config/config.json，
    /// 都不存在时使用默认值。日志系统此时尚未初始化，错误直接返回
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = env::var("NIFTY_CONFIG") {
            let mut config = Self::from_file(&path)
                .map_err(|e| anyhow::anyhow!("加载配置文件 {} 失败: {}", path, e))?;
            config.source = Some(path);
            return Ok(config);
        }

        for path in ["config.json", "config/config.json"] {
            if Path::new(path).exists() {
                let mut config = Self::from_file(path)
                    .map_err(|e| anyhow::anyhow!("加载配置文件 {} 失败: {}", path, e))?;
                config.source = Some(path.to_string());
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    /// 获取服务器绑定地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
