//! 文档查询工具 (Document Query Helpers)
//!
//! 动态选择器在此编译并校验；空白选择器立即报错，无匹配则返回空结果。

use scraper::{ElementRef, Html, Selector};

use crate::core::error::{CrawlError, Result};

/// 编译选择器，拒绝空白输入
pub fn selector(query: &str) -> Result<Selector> {
    if query.trim().is_empty() {
        return Err(CrawlError::Selector("blank selector".into()));
    }
    Selector::parse(query).map_err(|e| CrawlError::Selector(format!("{}: {}", query, e)))
}

pub fn select_first<'a>(root: ElementRef<'a>, query: &str) -> Result<Option<ElementRef<'a>>> {
    let s = selector(query)?;
    Ok(root.select(&s).next())
}

/// 按 id 查找元素
pub fn element_by_id<'a>(doc: &'a Html, id: &str) -> Result<Option<ElementRef<'a>>> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CrawlError::Selector("blank id".into()));
    }
    let query = format!("[id=\"{}\"]", id.replace('"', "\\\""));
    select_first(doc.root_element(), &query)
}

/// 合并元素内全部文本并去除首尾空白
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <input id="truyen-id" value="1234">
            <ul><li class="c">one</li><li class="c"> two </li></ul>
        </body></html>
    "#;

    #[test]
    fn blank_selector_fails_fast() {
        let doc = Html::parse_document(PAGE);
        assert!(select_first(doc.root_element(), "   ").is_err());
        assert!(element_by_id(&doc, "").is_err());
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let doc = Html::parse_document(PAGE);
        assert!(select_first(doc.root_element(), "#missing").unwrap().is_none());
    }

    #[test]
    fn finds_by_id_and_collects_text() {
        let doc = Html::parse_document(PAGE);
        let input = element_by_id(&doc, "truyen-id").unwrap().unwrap();
        assert_eq!(input.value().attr("value"), Some("1234"));

        let item = select_first(doc.root_element(), "li.c:nth-child(2)").unwrap().unwrap();
        assert_eq!(text_of(item), "two");
    }
}
