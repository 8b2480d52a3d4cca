//! 重试执行器 (Retry Executor)
//!
//! 有界次数 + 确定性指数退避 (无抖动)。退避等待可被取消，取消即放弃当前任务。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::config::RetryConfig;
use crate::core::error::{CrawlError, Result};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySpec {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetrySpec {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// 第 `attempt` 次失败后的等待时长：`min(base * 2^(attempt-1), max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500), Duration::from_secs(8))
    }
}

impl From<RetryConfig> for RetrySpec {
    fn from(cfg: RetryConfig) -> Self {
        Self::new(
            cfg.max_attempts,
            Duration::from_millis(cfg.base_delay_ms),
            Duration::from_millis(cfg.max_delay_ms),
        )
    }
}

/// 重试执行器
#[derive(Clone, Default)]
pub struct RetryExecutor {
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// 执行工作单元，失败则退避重试
    ///
    /// 连续失败 `max_attempts` 次后返回 `RetryExhausted`，包裹最后一次的错误。
    /// 最后一次失败之后不再等待。
    pub async fn execute<T, F, Fut>(
        &self,
        desc: impl Display,
        spec: &RetrySpec,
        mut task: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = spec.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match task().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(CrawlError::RetryExhausted {
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }

                    let wait = spec.delay_for(attempt);
                    warn!(
                        "任务失败 [{}] (第 {}/{} 次): {}。将在 {:?} 后重试...",
                        desc, attempt, max_attempts, e, wait
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(CrawlError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let spec = RetrySpec::default();
        let delays: Vec<_> = (1..=7).map(|a| spec.delay_for(a).as_millis()).collect();
        assert_eq!(delays, [500, 1000, 2000, 4000, 8000, 8000, 8000]);

        for a in 1..64 {
            assert!(spec.delay_for(a) <= spec.delay_for(a + 1));
            assert!(spec.delay_for(a) <= spec.max_delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_work_is_attempted_max_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<()> = RetryExecutor::default()
            .execute("always-fails", &RetrySpec::default(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CrawlError::Parse("boom".into()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match result {
            Err(CrawlError::RetryExhausted { attempts, source }) => {
                assert_eq!(attempts, 5);
                assert!(matches!(*source, CrawlError::Parse(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // 500 + 1000 + 2000 + 4000
        assert_eq!(started.elapsed(), Duration::from_millis(7_500));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let value = RetryExecutor::default()
            .execute("flaky", &RetrySpec::default(), || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CrawlError::Custom("reset".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_backoff_abandons_the_task() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = RetryExecutor::new(token)
            .execute("cancelled", &RetrySpec::default(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CrawlError::Custom("down".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(CrawlError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
