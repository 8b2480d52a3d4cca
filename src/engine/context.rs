//! 引擎运行时上下文 (Runtime Context)
//!
//! 维护同一次抓取内并发任务间的共享状态与资源配额。

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::interfaces::CrawlStrategy;

use super::retry::{RetryExecutor, RetrySpec};
use super::session::CrawlSession;

/// 任务执行运行时上下文
///
/// 聚合站点策略、会话态、准入信号量及重试执行器。
pub struct RuntimeContext {
    /// 目标站点策略
    pub strategy: Arc<dyn CrawlStrategy>,
    /// 单次抓取会话 (密钥缓存)
    pub session: Arc<CrawlSession>,
    /// 准入闸门 (Throttling)
    pub semaphore: Arc<Semaphore>,
    pub retry: RetryExecutor,
    pub retry_spec: RetrySpec,
    /// 停机信号
    pub shutdown: CancellationToken,
}

impl RuntimeContext {
    pub fn new(
        strategy: Arc<dyn CrawlStrategy>,
        session: Arc<CrawlSession>,
        concurrency: usize,
        retry_spec: RetrySpec,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            strategy,
            session,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            retry: RetryExecutor::new(shutdown.clone()),
            retry_spec,
            shutdown,
        }
    }
}
