//! 配置管理系统 (Configuration Management)
//!
//! 负责 `config.toml` 的反序列化及其层级结构映射，支持环境变量与默认值回退机制。

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::core::error::{CrawlError, Result};

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct AppConfig {
    /// 持久化存储连接串
    #[serde(default = "default_database_url")]
    #[builder(default = default_database_url())]
    pub database_url: String,

    /// HTTP 客户端参数
    #[serde(default)]
    #[builder(default)]
    pub http: HttpConfig,

    /// 抓取调度参数
    #[serde(default)]
    #[builder(default)]
    pub crawl: CrawlConfig,

    /// 站点特定配置覆盖映射 (键为站点标识)
    #[serde(default)]
    #[builder(default)]
    pub sites: HashMap<String, SiteConfig>,

    /// 触发接口监听参数
    #[serde(default)]
    #[builder(default)]
    pub server: ServerConfig,
}

/// HTTP 客户端配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    #[builder(default = default_user_agent())]
    pub user_agent: String,
    /// 预置 Cookie
    pub cookie: Option<String>,
    /// 出口代理 (http/socks5)
    pub proxy: Option<String>,
    #[serde(default = "default_connect_timeout")]
    #[builder(default = default_connect_timeout())]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    #[builder(default = default_timeout())]
    pub timeout_secs: u64,
    #[serde(default = "default_pool_idle")]
    #[builder(default = default_pool_idle())]
    pub pool_max_idle_per_host: usize,
}

/// 调度引擎参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct CrawlConfig {
    /// 单批次内同时执行的抓取上限 (准入闸门容量)
    #[serde(default = "default_max_concurrency")]
    #[builder(default = default_max_concurrency())]
    pub max_concurrency: usize,
    /// 宏批次大小
    #[serde(default = "default_macro_batch")]
    #[builder(default = default_macro_batch())]
    pub macro_batch_size: usize,
    /// 持久化子批次大小
    #[serde(default = "default_persist_batch")]
    #[builder(default = default_persist_batch())]
    pub persist_batch_size: usize,
    /// 宏批次之间的冷却秒数
    #[serde(default = "default_cooldown")]
    #[builder(default = default_cooldown())]
    pub cooldown_secs: u64,
    #[serde(default)]
    #[builder(default)]
    pub retry: RetryConfig,
    /// 裸故事名解析所用的基准地址
    #[serde(default = "default_base_url")]
    #[builder(default = default_base_url())]
    pub default_base_url: String,
}

/// 重试策略
#[derive(Debug, Deserialize, Builder, Clone, Copy)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    #[builder(default = default_max_attempts())]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    #[builder(default = default_base_delay())]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    #[builder(default = default_max_delay())]
    pub max_delay_ms: u64,
}

/// 站点特定配置覆盖
#[derive(Debug, Deserialize, Builder, Clone, Default)]
pub struct SiteConfig {
    /// 自定义域名 (用于镜像站点)
    pub base_url: Option<String>,
    /// 独立的数据接口域名
    pub api_base_url: Option<String>,
    /// 密钥恢复失败时使用的回退密钥
    pub fallback_key: Option<String>,
}

/// 触发接口配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    #[builder(default = default_bind())]
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            cookie: None,
            proxy: None,
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
            pool_max_idle_per_host: default_pool_idle(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            macro_batch_size: default_macro_batch(),
            persist_batch_size: default_persist_batch(),
            cooldown_secs: default_cooldown(),
            retry: RetryConfig::default(),
            default_base_url: default_base_url(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn default_database_url() -> String {
    "sqlite://readstory.db?mode=rwc".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_timeout() -> u64 {
    30
}
fn default_pool_idle() -> usize {
    32
}
fn default_max_concurrency() -> usize {
    10
}
fn default_macro_batch() -> usize {
    400
}
fn default_persist_batch() -> usize {
    100
}
fn default_cooldown() -> u64 {
    600
}
fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    8_000
}
fn default_base_url() -> String {
    "https://truyenfull.vision".to_string()
}
fn default_bind() -> String {
    "0.0.0.0:8082".to_string()
}

impl CrawlConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl AppConfig {
    /// 从文件系统及环境变量中加载并解析配置
    ///
    /// 环境变量示例: `READSTORY__CRAWL__MAX_CONCURRENCY=4`
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let builder = Config::builder();

        let builder = if config_path.exists() {
            builder.add_source(File::from(config_path))
        } else {
            builder
        };

        let settings = builder
            .add_source(
                Environment::with_prefix("READSTORY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(CrawlError::Config)?;
        settings.try_deserialize().map_err(CrawlError::Config)
    }

    /// 读取站点覆盖配置，缺省时返回空配置
    pub fn site(&self, site_id: &str) -> SiteConfig {
        self.sites.get(site_id).cloned().unwrap_or_default()
    }
}
