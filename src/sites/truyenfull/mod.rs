//! TruyenFull 站点策略
//!
//! 目录通过 `ajax.php?type=chapter_option` 获取，章节正文为明文 HTML。

mod selectors;

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::config::SiteConfig;
use crate::core::error::{CrawlError, Result};
use crate::core::model::{ChapterTask, NewChapter, NewStory, Source, Story};
use crate::engine::session::CrawlSession;
use crate::interfaces::{CrawlStrategy, Fetcher};
use crate::network::html;
use crate::utils::path_segments;

pub use selectors::SiteSelectors;

pub const SITE_ID: &str = "truyenfull";
pub const DEFAULT_BASE_URL: &str = "https://truyenfull.vision";

/// 单章节页面解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPage {
    pub title: Option<String>,
    pub content: String,
}

pub struct TruyenFull {
    base_url: String,
    fetcher: Arc<dyn Fetcher>,
}

impl TruyenFull {
    pub fn new(config: SiteConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self { base_url, fetcher }
    }

    fn chapter_url(&self, story: &Story, task: &ChapterTask) -> String {
        format!("{}/{}/{}", self.base_url, story.name, task.raw_source_key)
    }

    fn chapter_list_url(&self, story_id: &str) -> String {
        format!(
            "{}/ajax.php?type=chapter_option&data={}",
            self.base_url, story_id
        )
    }
}

/// 故事名取 URL 路径的首个片段
pub fn story_name_from_url(url: &str) -> Result<String> {
    path_segments(url)
        .into_iter()
        .next()
        .ok_or_else(|| CrawlError::InvalidInput(format!("no story name in url: {}", url)))
}

/// 落地页标题：`h3.title`，其次 `h1`
pub fn parse_title(page: &str) -> Option<String> {
    let doc = Html::parse_document(page);
    let s = SiteSelectors::get();

    [&s.story_title, &s.heading]
        .into_iter()
        .filter_map(|sel| doc.select(sel).next())
        .map(html::text_of)
        .find(|t| !t.is_empty())
}

/// 落地页中的站内故事 id (`#truyen-id` 的 value)
pub fn parse_story_id(page: &str) -> Result<String> {
    let doc = Html::parse_document(page);
    html::element_by_id(&doc, "truyen-id")?
        .and_then(|el| el.value().attr("value"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CrawlError::Parse("#truyen-id not found on landing page".into()))
}

#[derive(Deserialize)]
struct ChapterOptionPayload {
    chap_jump: String,
}

/// 解析章节下拉列表
///
/// 接口可能直接返回 HTML 片段，也可能包在 `{"chap_jump": "..."}` 中。
/// 键取 `value` 中 `-` 分隔的第二段，无法解析的条目跳过。
pub fn parse_chapter_options(body: &str) -> Vec<ChapterTask> {
    let fragment = serde_json::from_str::<ChapterOptionPayload>(body)
        .map(|p| p.chap_jump)
        .unwrap_or_else(|_| body.to_string());

    let doc = Html::parse_document(&fragment);
    let s = SiteSelectors::get();

    doc.select(&s.chapter_option)
        .filter_map(|el| {
            let raw_key = el.value().attr("value").unwrap_or_default();
            let key_text = raw_key.split('-').nth(1).unwrap_or_default();
            match ChapterTask::parse(html::text_of(el), key_text, raw_key) {
                Ok(task) => Some(task),
                Err(_) => {
                    warn!("无效的章节键: {:?}", raw_key);
                    None
                }
            }
        })
        .collect()
}

/// 解析章节页；缺少容器或正文节点时返回 `None`
pub fn parse_chapter_page(page: &str) -> Result<Option<ChapterPage>> {
    let doc = Html::parse_document(page);
    let s = SiteSelectors::get();

    let Some(container) = html::element_by_id(&doc, "chapter-big-container")? else {
        return Ok(None);
    };
    let Some(content) = container.select(&s.chapter_content).next() else {
        return Ok(None);
    };

    let title = container
        .select(&s.chapter_title)
        .next()
        .and_then(|a| a.value().attr("title"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(Some(ChapterPage {
        title,
        content: content.inner_html().trim().to_string(),
    }))
}

#[async_trait]
impl CrawlStrategy for TruyenFull {
    fn id(&self) -> &str {
        SITE_ID
    }

    fn source(&self) -> Source {
        Source::TruyenFull
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn parse_story(&self, url: &str) -> Result<NewStory> {
        let name = story_name_from_url(url)?;
        let page = self.fetcher.get_text(url).await?;
        Ok(NewStory::new(name, parse_title(&page), self.source()))
    }

    async fn parse_chapter_tasks(&self, url: &str, story: &Story) -> Result<Vec<ChapterTask>> {
        let page = self.fetcher.get_text(url).await?;
        let story_id = parse_story_id(&page)?;

        let body = self
            .fetcher
            .get_text(&self.chapter_list_url(&story_id))
            .await?;
        let tasks = parse_chapter_options(&body);

        info!("{} 共发现 {} 个章节", story.name, tasks.len());
        Ok(tasks)
    }

    async fn parse_chapter(
        &self,
        session: &CrawlSession,
        task: &ChapterTask,
    ) -> Result<Option<NewChapter>> {
        let url = self.chapter_url(&session.story, task);
        info!("抓取章节: {}", url);

        let page = self.fetcher.get_text(&url).await?;
        let Some(parsed) = parse_chapter_page(&page)? else {
            warn!("章节页面缺少正文节点: {}", url);
            return Ok(None);
        };

        Ok(Some(NewChapter {
            story_id: session.story.id,
            key: task.chapter_key,
            title: parsed.title.unwrap_or_else(|| task.display_name.clone()),
            content: parsed.content,
        }))
    }
}
