//! 抓取会话态 (Crawl Session)
//!
//! 每次抓取创建一份，显式传入策略；不同故事之间不共享任何缓存。

use std::future::Future;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::error::Result;
use crate::core::model::Story;

/// 单次抓取的会话
pub struct CrawlSession {
    pub story: Story,
    /// 站点动态密钥缓存 (仅需要解密的站点使用)
    pub keys: KeyCache,
}

impl CrawlSession {
    pub fn new(story: Story) -> Self {
        Self {
            story,
            keys: KeyCache::new(None),
        }
    }

    pub fn with_fallback_key(story: Story, fallback: impl Into<String>) -> Self {
        Self {
            story,
            keys: KeyCache::new(Some(fallback.into())),
        }
    }
}

/// 动态密钥缓存
///
/// 只缓存成功恢复的密钥；并发调用者排队等待，拿到锁时若已有密钥则直接复用。
/// 恢复未找到密钥时本次使用回退密钥，但不写入缓存，下一章节会重新尝试恢复。
/// 恢复过程中的传输错误原样返回，交由重试执行器处理。
pub struct KeyCache {
    fallback: Option<String>,
    current: Mutex<Option<String>>,
}

impl KeyCache {
    pub fn new(fallback: Option<String>) -> Self {
        Self {
            fallback,
            current: Mutex::new(None),
        }
    }

    pub async fn get_or_recover<F, Fut>(&self, recover: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        let mut current = self.current.lock().await;
        if let Some(key) = current.as_ref() {
            return Ok(key.clone());
        }

        match recover().await? {
            Some(key) => {
                info!("动态密钥已恢复并缓存");
                *current = Some(key.clone());
                Ok(key)
            }
            None => {
                warn!("动态密钥恢复失败，本章节使用回退密钥");
                Ok(self.fallback.clone().unwrap_or_default())
            }
        }
    }
}
