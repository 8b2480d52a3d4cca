//! TruyenFull 选择器
//!
//! 预编译的 CSS 选择器

use std::sync::OnceLock;

use scraper::Selector;

/// 站点选择器集合
pub struct SiteSelectors {
    pub story_title: Selector,
    pub heading: Selector,
    pub chapter_option: Selector,
    pub chapter_title: Selector,
    pub chapter_content: Selector,
}

static SELECTORS: OnceLock<SiteSelectors> = OnceLock::new();

impl SiteSelectors {
    /// 获取全局选择器实例
    pub fn get() -> &'static SiteSelectors {
        SELECTORS.get_or_init(|| SiteSelectors {
            story_title: Selector::parse("h3.title").unwrap(),
            heading: Selector::parse("h1").unwrap(),
            chapter_option: Selector::parse("select.chapter_jump option").unwrap(),
            chapter_title: Selector::parse("a.chapter-title").unwrap(),
            chapter_content: Selector::parse("#chapter-c").unwrap(),
        })
    }
}
