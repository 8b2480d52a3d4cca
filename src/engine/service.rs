//! 抓取编排服务 (Crawl Orchestrator)
//!
//! 负责协调一次抓取的生命周期：解析 -> 建档 -> 枚举 -> 去重 -> 流水线

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use url::Url;

use crate::core::config::AppConfig;
use crate::core::error::{CrawlError, Result};
use crate::core::event::{CrawlEvent, EventSender};
use crate::core::model::{ChapterResponse, NewStory, Story};
use crate::interfaces::{CrawlStrategy, Store};
use crate::sites::StrategyRegistry;

use super::dedup;
use super::pipeline::{CrawlPipeline, PipelineSettings};
use super::retry::{RetryExecutor, RetrySpec};

/// 一次抓取的汇总
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub story: Story,
    /// 目录中的章节总数
    pub discovered: usize,
    /// 本次新写入的章节
    pub saved: Vec<ChapterResponse>,
}

/// 抓取编排服务
pub struct CrawlService {
    registry: StrategyRegistry,
    store: Arc<dyn Store>,
    config: Arc<AppConfig>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    events: Option<EventSender>,
}

impl CrawlService {
    pub fn new(registry: StrategyRegistry, store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self {
            registry,
            store,
            config,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref sender) = self.events {
            sender.emit(event);
        }
    }

    /// 规范化抓取标识
    ///
    /// 绝对 URL 原样接受 (去除末尾斜杠)；裸故事名拼接到默认基准地址之后。
    pub fn normalize_identifier(&self, identifier: &str) -> Result<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(CrawlError::InvalidInput("url must not be blank".into()));
        }

        if identifier.contains("://") {
            let parsed = Url::parse(identifier)
                .map_err(|e| CrawlError::InvalidInput(format!("{}: {}", identifier, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(CrawlError::InvalidInput(format!(
                    "not an http(s) url: {}",
                    identifier
                )));
            }
            return Ok(identifier.trim_end_matches('/').to_string());
        }

        let is_slug = identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !is_slug {
            return Err(CrawlError::InvalidInput(format!(
                "not a url or story name: {}",
                identifier
            )));
        }

        Ok(format!(
            "{}/{}",
            self.config.crawl.default_base_url.trim_end_matches('/'),
            identifier
        ))
    }

    /// 触发后台抓取 (Fire-and-forget)
    ///
    /// 输入校验与站点匹配同步完成并返回错误；其余阶段在后台执行，结果仅记录日志。
    /// 停机开始后拒绝新的触发请求。
    pub fn crawl(self: &Arc<Self>, identifier: &str) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }
        let url = self.normalize_identifier(identifier)?;
        let strategy = self.registry.resolve(&url)?;

        info!("已受理抓取请求 [{}]: {}", strategy.id(), url);

        let service = self.clone();
        self.tracker.spawn(async move {
            if let Err(e) = service.run(strategy, &url).await {
                error!("后台抓取失败 [{}]: {}", url, e);
            }
        });
        Ok(())
    }

    /// 同步执行完整抓取并返回汇总
    pub async fn crawl_story(&self, identifier: &str) -> Result<CrawlReport> {
        let url = self.normalize_identifier(identifier)?;
        let strategy = self.registry.resolve(&url)?;
        self.run(strategy, &url).await
    }

    async fn run(&self, strategy: Arc<dyn CrawlStrategy>, url: &str) -> Result<CrawlReport> {
        match self.execute(strategy, url).await {
            Ok(report) => {
                info!(
                    "抓取完成: {} (目录 {} 章，新增 {} 章)",
                    report.story.title,
                    report.discovered,
                    report.saved.len()
                );
                self.emit(CrawlEvent::CrawlCompleted {
                    story: report.story.name.clone(),
                    saved: report.saved.len(),
                });
                Ok(report)
            }
            Err(e) => {
                self.emit(CrawlEvent::CrawlFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&self, strategy: Arc<dyn CrawlStrategy>, url: &str) -> Result<CrawlReport> {
        let retry = RetryExecutor::new(self.shutdown.clone());
        let spec = RetrySpec::from(self.config.crawl.retry);

        let draft = retry
            .execute("解析落地页", &spec, || strategy.parse_story(url))
            .await?;
        let story = self.get_or_create_story(&draft).await?;

        self.emit(CrawlEvent::CrawlStarted {
            story: story.name.clone(),
            title: story.title.clone(),
        });

        let tasks = retry
            .execute("获取章节目录", &spec, || strategy.parse_chapter_tasks(url, &story))
            .await?;
        let discovered = tasks.len();

        let pending = dedup::filter_existing(self.store.as_ref(), story.id, tasks).await?;
        self.emit(CrawlEvent::TasksDiscovered {
            total: discovered,
            pending: pending.len(),
        });

        if pending.is_empty() {
            info!("没有需要抓取的新章节: {}", story.name);
            return Ok(CrawlReport {
                story,
                discovered,
                saved: Vec::new(),
            });
        }

        let session = Arc::new(strategy.open_session(story.clone()));
        let pipeline = CrawlPipeline::new(
            self.store.clone(),
            PipelineSettings::from(&self.config.crawl),
            self.shutdown.clone(),
        )
        .with_events(self.events.clone());

        let saved = pipeline.run(strategy, session, pending).await;

        Ok(CrawlReport {
            story,
            discovered,
            saved,
        })
    }

    /// 按 name 复用或创建故事；已有记录仅回填缺失的标题
    async fn get_or_create_story(&self, draft: &NewStory) -> Result<Story> {
        let Some(mut existing) = self.store.find_story_by_name(&draft.name).await? else {
            let story = self.store.save_story(draft).await?;
            info!("新建故事: {} ({})", story.title, story.name);
            return Ok(story);
        };

        let missing_title = existing.title.trim().is_empty() || existing.title == existing.name;
        if missing_title && draft.title != draft.name {
            info!("回填故事标题: {} -> {}", existing.name, draft.title);
            self.store.backfill_title(existing.id, &draft.title).await?;
            existing.title = draft.title.clone();
        } else {
            info!("故事已存在: {} ({})", existing.title, existing.name);
        }

        Ok(existing)
    }

    /// 停止接收新批次并等待后台抓取退出
    pub async fn shutdown(&self) {
        warn!("正在停止抓取服务...");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
