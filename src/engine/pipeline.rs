//! 批处理流水线 (Batch Pipeline)
//!
//! 宏批次 -> 并发抓取 -> 按完成顺序消费 -> 持久化子批次 -> 冷却。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::config::CrawlConfig;
use crate::core::event::{CrawlEvent, EventSender};
use crate::core::model::{ChapterResponse, ChapterTask, NewChapter};
use crate::interfaces::{CrawlStrategy, Store};

use super::context::RuntimeContext;
use super::retry::RetrySpec;
use super::session::CrawlSession;
use super::task::{TaskOutcome, run_chapter_task};

/// 流水线参数
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub max_concurrency: usize,
    pub macro_batch_size: usize,
    pub persist_batch_size: usize,
    pub cooldown: Duration,
    pub retry: RetrySpec,
}

impl From<&CrawlConfig> for PipelineSettings {
    fn from(cfg: &CrawlConfig) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency,
            macro_batch_size: cfg.macro_batch_size,
            persist_batch_size: cfg.persist_batch_size,
            cooldown: cfg.cooldown(),
            retry: cfg.retry.into(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&CrawlConfig::default())
    }
}

/// 批处理流水线
pub struct CrawlPipeline {
    store: Arc<dyn Store>,
    settings: PipelineSettings,
    shutdown: CancellationToken,
    events: Option<EventSender>,
}

impl CrawlPipeline {
    pub fn new(store: Arc<dyn Store>, settings: PipelineSettings, shutdown: CancellationToken) -> Self {
        Self {
            store,
            settings,
            shutdown,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref sender) = self.events {
            sender.emit(event);
        }
    }

    /// 处理全部待抓取任务，返回本次新写入章节的回执
    ///
    /// 单章节失败不会影响其他章节；停机信号到达后不再开启新批次。
    pub async fn run(
        &self,
        strategy: Arc<dyn CrawlStrategy>,
        session: Arc<CrawlSession>,
        tasks: Vec<ChapterTask>,
    ) -> Vec<ChapterResponse> {
        let batch_size = self.settings.macro_batch_size.max(1);
        let total_batches = tasks.len().div_ceil(batch_size);

        let ctx = Arc::new(RuntimeContext::new(
            strategy,
            session,
            self.settings.max_concurrency,
            self.settings.retry,
            self.shutdown.clone(),
        ));

        let mut responses = Vec::new();

        for (index, batch) in tasks.chunks(batch_size).enumerate() {
            if self.shutdown.is_cancelled() {
                warn!("收到停机信号，停止派发剩余批次");
                break;
            }

            info!(
                "开始处理第 {}/{} 批次，共 {} 章",
                index + 1,
                total_batches,
                batch.len()
            );
            self.emit(CrawlEvent::BatchStarted {
                index: index + 1,
                total: total_batches,
                size: batch.len(),
            });

            self.process_batch(&ctx, batch, &mut responses).await;

            if index + 1 < total_batches && !self.cooldown().await {
                break;
            }
        }

        responses
    }

    /// 批次间冷却；被停机信号打断时返回 false
    async fn cooldown(&self) -> bool {
        let wait = self.settings.cooldown;
        if wait.is_zero() {
            return !self.shutdown.is_cancelled();
        }

        info!("批次完成，冷却 {:?} 后继续...", wait);
        self.emit(CrawlEvent::Cooldown {
            secs: wait.as_secs(),
        });

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                warn!("冷却期间收到停机信号");
                false
            }
            _ = tokio::time::sleep(wait) => true,
        }
    }

    async fn process_batch(
        &self,
        ctx: &Arc<RuntimeContext>,
        batch: &[ChapterTask],
        responses: &mut Vec<ChapterResponse>,
    ) {
        let persist_size = self.settings.persist_batch_size.max(1);
        let mut join_set = JoinSet::new();

        for task in batch {
            join_set.spawn(run_chapter_task(task.clone(), ctx.clone()));
        }

        let mut buffer: Vec<NewChapter> = Vec::with_capacity(persist_size);

        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(TaskOutcome::Fetched(chapter)) => {
                    buffer.push(chapter);
                    if buffer.len() >= persist_size {
                        self.flush(&mut buffer, responses).await;
                    }
                }
                Ok(TaskOutcome::Skipped { key, reason }) => {
                    warn!("章节 {} 已跳过: {}", key, reason);
                    self.emit(CrawlEvent::ChapterSkipped { key, reason });
                }
                Err(e) => {
                    error!("并发调度错误: {}", e);
                }
            }
        }

        if !buffer.is_empty() {
            self.flush(&mut buffer, responses).await;
        }
    }

    /// 写入一个持久化子批次；失败仅记录日志，该子批次丢弃
    async fn flush(&self, buffer: &mut Vec<NewChapter>, responses: &mut Vec<ChapterResponse>) {
        let pending = std::mem::take(buffer);
        let count = pending.len();

        match self.store.save_chapters(pending).await {
            Ok(saved) => {
                info!("已写入 {} 个章节 (提交 {} 个)", saved.len(), count);
                for chapter in &saved {
                    self.emit(CrawlEvent::ChapterSaved {
                        key: chapter.key,
                        title: chapter.title.clone(),
                    });
                    responses.push(chapter.into());
                }
            }
            Err(e) => {
                error!("章节批量写入失败，丢弃 {} 个章节: {}", count, e);
            }
        }
    }
}
