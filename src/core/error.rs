//! 错误处理体系 (Error Handling System)
//!
//! 定义抓取领域的错误类型及全局 Result 别名。

use reqwest::StatusCode;
use thiserror::Error;

/// 全局错误定义 (Crawl Domain Errors)
#[derive(Error, Debug)]
pub enum CrawlError {
    /// 空白或非法的故事标识，立即拒绝，不重试
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 没有任何策略匹配该来源主机
    #[error("Unsupported source host: {host}")]
    UnsupportedSource { host: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// 非 2xx 响应
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    /// 重试次数耗尽，携带最后一次的失败原因
    #[error("Retry exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<CrawlError>,
    },

    /// 退避等待或批次冷却被取消
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Other error: {0}")]
    Custom(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, CrawlError>;
