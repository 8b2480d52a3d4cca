#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use readstory::core::config::{AppConfig, CrawlConfig, SiteConfig};
use readstory::core::error::{CrawlError, Result};
use readstory::core::model::{Chapter, ChapterTask, NewChapter, NewStory, Source, Story};
use readstory::engine::CrawlService;
use readstory::engine::session::CrawlSession;
use readstory::interfaces::{CrawlStrategy, Fetcher, Store};
use readstory::sites::StrategyRegistry;
use readstory::store::MemoryStore;

pub const FAKE_BASE: &str = "https://fake.test";

/// 可编排行为的假站点
#[derive(Default)]
pub struct FakeSite {
    pub chapters: Vec<u32>,
    /// 始终抛出传输错误的章节
    pub failing: BTreeSet<u32>,
    /// 页面结构缺失的章节
    pub missing: BTreeSet<u32>,
    pub delay: Duration,
    fetches: Mutex<HashMap<u32, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSite {
    pub fn with_chapters(keys: impl IntoIterator<Item = u32>) -> Self {
        Self {
            chapters: keys.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn fetch_count(&self, key: u32) -> usize {
        self.fetches.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    pub fn fetched_keys(&self) -> BTreeSet<u32> {
        self.fetches.lock().unwrap().keys().copied().collect()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrawlStrategy for FakeSite {
    fn id(&self) -> &str {
        "fake"
    }

    fn source(&self) -> Source {
        Source::TruyenFull
    }

    fn base_url(&self) -> &str {
        FAKE_BASE
    }

    async fn parse_story(&self, _url: &str) -> Result<NewStory> {
        Ok(NewStory::new("fake-story", Some("Fake Story".into()), Source::TruyenFull))
    }

    async fn parse_chapter_tasks(&self, _url: &str, _story: &Story) -> Result<Vec<ChapterTask>> {
        Ok(self
            .chapters
            .iter()
            .map(|k| ChapterTask::new(format!("Chương {}", k), *k, format!("chuong-{}", k)))
            .collect())
    }

    async fn parse_chapter(
        &self,
        session: &CrawlSession,
        task: &ChapterTask,
    ) -> Result<Option<NewChapter>> {
        let key = task.chapter_key;
        *self.fetches.lock().unwrap().entry(key).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            // 延迟随章节变化，完成顺序与提交顺序不同
            tokio::time::sleep(self.delay * (key % 3 + 1)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&key) {
            return Err(CrawlError::Custom(format!("connection reset on {}", key)));
        }
        if self.missing.contains(&key) {
            return Ok(None);
        }

        Ok(Some(NewChapter {
            story_id: session.story.id,
            key,
            title: task.display_name.clone(),
            content: format!("<p>content {}</p>", key),
        }))
    }
}

/// 按 URL 返回固定响应并记录命中次数
#[derive(Default)]
pub struct StubFetcher {
    routes: HashMap<String, String>,
    /// 前 N 次请求返回传输错误
    flaky: HashMap<String, usize>,
    hits: Mutex<HashMap<String, usize>>,
}

impl StubFetcher {
    pub fn route(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.routes.insert(url.into(), body.into());
        self
    }

    pub fn fail_first(mut self, url: impl Into<String>, times: usize) -> Self {
        self.flaky.insert(url.into(), times);
        self
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        let hit = {
            let mut hits = self.hits.lock().unwrap();
            let count = hits.entry(url.to_string()).or_default();
            *count += 1;
            *count
        };
        if hit <= self.flaky.get(url).copied().unwrap_or(0) {
            return Err(CrawlError::Custom(format!("connection reset on {}", url)));
        }
        self.routes
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlError::Custom(format!("no route for {}", url)))
    }
}

pub fn crawl_config(concurrency: usize, macro_batch: usize, persist_batch: usize) -> Arc<AppConfig> {
    Arc::new(
        AppConfig::builder()
            .crawl(
                CrawlConfig::builder()
                    .max_concurrency(concurrency)
                    .macro_batch_size(macro_batch)
                    .persist_batch_size(persist_batch)
                    .cooldown_secs(0)
                    .build(),
            )
            .build(),
    )
}

/// 只注册假站点的编排服务
pub fn fake_service(site: Arc<FakeSite>, store: Arc<dyn Store>, config: Arc<AppConfig>) -> CrawlService {
    let mut registry = StrategyRegistry::empty(Arc::new(StubFetcher::default()));
    registry.register("fake", FAKE_BASE, SiteConfig::default(), move |_, _| {
        site.clone() as Arc<dyn CrawlStrategy>
    });
    CrawlService::new(registry, store, config)
}

/// 记录每次批量写入大小的存储；可指定第 N 次写入失败
pub struct RecordingStore {
    pub inner: MemoryStore,
    /// 从 1 开始计数
    fail_on: Option<usize>,
    flushes: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn new(fail_on: Option<usize>) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on,
            flushes: Mutex::new(Vec::new()),
        }
    }

    pub fn flush_sizes(&self) -> Vec<usize> {
        self.flushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn find_story_by_name(&self, name: &str) -> Result<Option<Story>> {
        self.inner.find_story_by_name(name).await
    }

    async fn save_story(&self, story: &NewStory) -> Result<Story> {
        self.inner.save_story(story).await
    }

    async fn backfill_title(&self, story_id: i64, title: &str) -> Result<()> {
        self.inner.backfill_title(story_id, title).await
    }

    async fn existing_chapter_keys(
        &self,
        story_id: i64,
        candidates: &BTreeSet<u32>,
    ) -> Result<BTreeSet<u32>> {
        self.inner.existing_chapter_keys(story_id, candidates).await
    }

    async fn save_chapters(&self, batch: Vec<NewChapter>) -> Result<Vec<Chapter>> {
        let nth = {
            let mut flushes = self.flushes.lock().unwrap();
            flushes.push(batch.len());
            flushes.len()
        };
        if self.fail_on == Some(nth) {
            return Err(CrawlError::Custom("database is locked".into()));
        }
        self.inner.save_chapters(batch).await
    }

    async fn count_chapters(&self, story_id: i64) -> Result<u64> {
        self.inner.count_chapters(story_id).await
    }
}
