//! Metruyencv 站点策略
//!
//! 目录来自独立的数据接口；章节正文以 AES 密文嵌在页面脚本中，
//! 密钥从站点主程序脚本中恢复并在会话内缓存。

pub mod cipher;
mod selectors;

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::core::config::SiteConfig;
use crate::core::error::{CrawlError, Result};
use crate::core::model::{ChapterTask, NewChapter, NewStory, Source, Story};
use crate::engine::session::CrawlSession;
use crate::interfaces::fetch::fetch_json;
use crate::interfaces::{CrawlStrategy, Fetcher};
use crate::network::html;
use crate::utils::{path_segments, to_absolute_url};

pub use selectors::SiteSelectors;

pub const SITE_ID: &str = "metruyencv";
pub const DEFAULT_BASE_URL: &str = "https://metruyencv.com";
pub const DEFAULT_API_BASE_URL: &str = "https://backend.metruyencv.com";
/// 最近一次已知可用的密钥
pub const DEFAULT_FALLBACK_KEY: &str = "cNdR17YqKmWx9BgT";

pub struct Metruyencv {
    base_url: String,
    api_base_url: String,
    fallback_key: String,
    fetcher: Arc<dyn Fetcher>,
}

impl Metruyencv {
    pub fn new(config: SiteConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let trim = |s: String| s.trim_end_matches('/').to_string();
        Self {
            base_url: trim(config.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into())),
            api_base_url: trim(
                config
                    .api_base_url
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.into()),
            ),
            fallback_key: config
                .fallback_key
                .unwrap_or_else(|| DEFAULT_FALLBACK_KEY.into()),
            fetcher,
        }
    }

    fn chapter_url(&self, story: &Story, task: &ChapterTask) -> String {
        format!(
            "{}/truyen/{}/chuong-{}",
            self.base_url, story.name, task.chapter_key
        )
    }

    fn chapter_list_url(&self, book_id: &str) -> String {
        format!(
            "{}/api/chapters?filter[book_id]={}&filter[type]=published",
            self.api_base_url, book_id
        )
    }
}

/// 章节页中提取出的原始材料
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChapterPayload {
    /// base64 密文 (已还原 `\/` 转义)
    pub cipher_text: Option<String>,
    /// 主程序脚本的绝对地址
    pub bundle_url: Option<String>,
}

/// 故事名取 URL 路径的最后一个片段
pub fn story_name_from_url(url: &str) -> Result<String> {
    path_segments(url)
        .pop()
        .ok_or_else(|| CrawlError::InvalidInput(format!("no story name in url: {}", url)))
}

pub fn parse_title(page: &str) -> Option<String> {
    let doc = Html::parse_document(page);
    doc.select(&SiteSelectors::get().heading)
        .next()
        .map(html::text_of)
        .filter(|t| !t.is_empty())
}

fn script_containing(doc: &Html, marker: &str) -> Option<String> {
    doc.select(&SiteSelectors::get().script)
        .map(|el| el.text().collect::<String>())
        .find(|text| text.contains(marker))
}

/// 从 `window.bookData` 中取书籍 id
///
/// 优先按 JSON 解析 `book.id`，失败时回退到首个 `"id": <数字>`。
pub fn extract_book_id(page: &str) -> Option<String> {
    let doc = Html::parse_document(page);
    let script = script_containing(&doc, "window.bookData")?;

    let literal = script
        .split_once('=')
        .map(|(_, rhs)| rhs.trim().trim_end_matches(';').trim())
        .unwrap_or_default();

    if let Ok(data) = serde_json::from_str::<Value>(literal) {
        match &data["book"]["id"] {
            Value::Number(n) => return Some(n.to_string()),
            Value::String(s) if !s.is_empty() => return Some(s.clone()),
            _ => {}
        }
    }

    SiteSelectors::get()
        .book_id_field
        .captures(&script)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Deserialize)]
pub struct ChapterListResponse {
    #[serde(default)]
    pub data: Option<Vec<ChapterEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct ChapterEntry {
    #[serde(default)]
    pub name: String,
    /// 接口中既可能是数字也可能是字符串
    #[serde(default)]
    pub index: Value,
}

impl ChapterListResponse {
    /// 转换为章节任务；索引不合法的条目跳过
    pub fn into_tasks(self) -> Vec<ChapterTask> {
        self.data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                let raw = match &entry.index {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.clone(),
                    _ => String::new(),
                };
                match ChapterTask::parse(entry.name, &raw, raw.clone()) {
                    Ok(task) => Some(task),
                    Err(_) => {
                        warn!("无效的章节索引: {:?}", entry.index);
                        None
                    }
                }
            })
            .collect()
    }
}

/// 提取章节密文与主程序脚本地址
pub fn parse_chapter_page(page: &str, base: &Url) -> ChapterPayload {
    let doc = Html::parse_document(page);
    let s = SiteSelectors::get();

    let cipher_text = script_containing(&doc, "window.chapterData").and_then(|script| {
        s.content_field
            .captures(&script)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().replace("\\/", "/"))
    });

    let bundle_url = doc
        .select(&s.bundle_script)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(|src| to_absolute_url(base, src))
        .filter(|u| !u.is_empty());

    ChapterPayload {
        cipher_text,
        bundle_url,
    }
}

#[async_trait]
impl CrawlStrategy for Metruyencv {
    fn id(&self) -> &str {
        SITE_ID
    }

    fn source(&self) -> Source {
        Source::Mtc
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn open_session(&self, story: Story) -> CrawlSession {
        CrawlSession::with_fallback_key(story, self.fallback_key.clone())
    }

    async fn parse_story(&self, url: &str) -> Result<NewStory> {
        let name = story_name_from_url(url)?;
        let page = self.fetcher.get_text(url).await?;
        Ok(NewStory::new(name, parse_title(&page), self.source()))
    }

    async fn parse_chapter_tasks(&self, url: &str, story: &Story) -> Result<Vec<ChapterTask>> {
        let page = self.fetcher.get_text(url).await?;
        let book_id = extract_book_id(&page)
            .ok_or_else(|| CrawlError::Parse(format!("book id not found on {}", url)))?;
        info!("{} 对应书籍 id: {}", story.name, book_id);

        let response: ChapterListResponse =
            fetch_json(self.fetcher.as_ref(), &self.chapter_list_url(&book_id)).await?;
        let tasks = response.into_tasks();

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
        let base = Url::parse(&self.base_url)?;
        let payload = parse_chapter_page(&page, &base);

        let Some(cipher_text) = payload.cipher_text else {
            warn!("章节页面缺少密文: {}", url);
            return Ok(None);
        };

        let bundle_url = payload.bundle_url;
        let key = session
            .keys
            .get_or_recover(|| async move {
                match bundle_url {
                    Some(bundle_url) => cipher::recover_key(self.fetcher.as_ref(), &bundle_url).await,
                    None => {
                        warn!("章节页面中未找到主程序脚本");
                        Ok(None)
                    }
                }
            })
            .await?;

        Ok(Some(NewChapter {
            story_id: session.story.id,
            key: task.chapter_key,
            title: task.display_name.clone(),
            content: cipher::decrypt_or_empty(&cipher_text, &key),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_name_is_last_path_segment() {
        assert_eq!(
            story_name_from_url("https://metruyencv.com/truyen/vo-luyen-dinh-phong").unwrap(),
            "vo-luyen-dinh-phong"
        );
    }

    #[test]
    fn book_id_from_json_or_regex() {
        let json = r#"<script>window.bookData = {"book":{"name":"X","id":136693}};</script>"#;
        assert_eq!(extract_book_id(json).as_deref(), Some("136693"));

        let loose = r#"<script>window.bookData = { book: { "id": 42, slug: 'x' } };</script>"#;
        assert_eq!(extract_book_id(loose).as_deref(), Some("42"));

        assert!(extract_book_id("<script>var other = 1;</script>").is_none());
    }

    #[test]
    fn chapter_list_accepts_string_and_numeric_index() {
        let body = r#"{"data":[
            {"name":"Chương 1","index":"1"},
            {"name":"Chương 2","index":2},
            {"name":"Lỗi","index":"x"}
        ]}"#;
        let tasks = serde_json::from_str::<ChapterListResponse>(body)
            .unwrap()
            .into_tasks();
        let keys: Vec<_> = tasks.iter().map(|t| t.chapter_key).collect();
        assert_eq!(keys, [1, 2]);
        assert_eq!(tasks[1].raw_source_key, "2");

        let empty = serde_json::from_str::<ChapterListResponse>("{}").unwrap();
        assert!(empty.into_tasks().is_empty());
    }

    #[test]
    fn extracts_cipher_text_and_bundle_url() {
        let page = r#"
            <script>window.chapterData = { chapter: { id: 1, content: "abc\/def+==" } };</script>
            <script type="module" src="/build/assets/app-9327baa8.js"></script>
        "#;
        let base = Url::parse(DEFAULT_BASE_URL).unwrap();
        let payload = parse_chapter_page(page, &base);
        assert_eq!(payload.cipher_text.as_deref(), Some("abc/def+=="));
        assert_eq!(
            payload.bundle_url.as_deref(),
            Some("https://metruyencv.com/build/assets/app-9327baa8.js")
        );

        assert_eq!(parse_chapter_page("<p>gone</p>", &base), ChapterPayload::default());
    }
}
