//! Metruyencv 选择器

use std::sync::OnceLock;

use regex::Regex;
use scraper::Selector;

/// 站点选择器集合
pub struct SiteSelectors {
    pub heading: Selector,
    pub script: Selector,
    pub bundle_script: Selector,
    /// `window.chapterData` 中的密文字段
    pub content_field: Regex,
    /// `window.bookData` 中的书籍 id (正则回退)
    pub book_id_field: Regex,
}

static SELECTORS: OnceLock<SiteSelectors> = OnceLock::new();

impl SiteSelectors {
    /// 获取全局选择器实例
    pub fn get() -> &'static SiteSelectors {
        SELECTORS.get_or_init(|| SiteSelectors {
            heading: Selector::parse("h1").unwrap(),
            script: Selector::parse("script").unwrap(),
            bundle_script: Selector::parse("script[src*='/build/assets/app-']").unwrap(),
            content_field: Regex::new(r#"\b"?content"?\s*:\s*"([^"]+)""#).unwrap(),
            book_id_field: Regex::new(r#""id"\s*:\s*(\d+)"#).unwrap(),
        })
    }
}
