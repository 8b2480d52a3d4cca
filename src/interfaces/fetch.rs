//! 抓取设施接口 (Fetch Facility)
//!
//! 只负责单次请求：给定 URL 返回正文。重试与并发控制由引擎层负责。

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::core::error::{CrawlError, Result};

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 获取文本内容
    ///
    /// 网络故障、非 2xx 响应均以错误返回，由重试执行器决定是否重试。
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// 获取并反序列化 JSON 响应
pub async fn fetch_json<T: DeserializeOwned>(fetcher: &dyn Fetcher, url: &str) -> Result<T> {
    let body = fetcher.get_text(url).await?;
    serde_json::from_str(&body).map_err(CrawlError::Serialization)
}
