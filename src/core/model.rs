use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::core::error::{CrawlError, Result};

/// 故事来源站点
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    TruyenFull,
    Mtc,
}

/// 已持久化的故事
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    /// 源 URL 派生的唯一标识，创建后不可变
    pub name: String,
    pub title: String,
    pub source: Source,
}

/// 由策略从落地页解析出的故事草稿 (尚未分配 id)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStory {
    pub name: String,
    pub title: String,
    pub source: Source,
}

impl NewStory {
    /// 标题为空白时回退为故事名
    pub fn new(name: impl Into<String>, title: Option<String>, source: Source) -> Self {
        let name = name.into();
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| name.clone());
        Self { name, title, source }
    }
}

/// 章节任务：待抓取章节的轻量描述，不落库
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterTask {
    /// 目录中展示的章节标题
    pub display_name: String,
    /// 故事内的排序/身份键
    pub chapter_key: u32,
    /// 站点私有令牌，用于拼接章节 URL
    pub raw_source_key: String,
}

impl ChapterTask {
    pub fn new(display_name: impl Into<String>, chapter_key: u32, raw_source_key: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            chapter_key,
            raw_source_key: raw_source_key.into(),
        }
    }

    /// 从文本形式的键构造任务；键必须是非负整数
    pub fn parse(
        display_name: impl Into<String>,
        key_text: &str,
        raw_source_key: impl Into<String>,
    ) -> Result<Self> {
        let chapter_key = key_text
            .trim()
            .parse::<u32>()
            .map_err(|_| CrawlError::Parse(format!("invalid chapter key: {:?}", key_text)))?;
        Ok(Self::new(display_name, chapter_key, raw_source_key))
    }
}

/// 待写入的章节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChapter {
    pub story_id: i64,
    pub key: u32,
    pub title: String,
    pub content: String,
}

/// 已持久化的章节；`(story_id, key)` 唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub id: i64,
    pub story_id: i64,
    pub key: u32,
    pub title: String,
    pub content: String,
}

/// 持久化结果的轻量回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterResponse {
    pub id: i64,
    pub title: String,
}

impl From<&Chapter> for ChapterResponse {
    fn from(chapter: &Chapter) -> Self {
        Self {
            id: chapter.id,
            title: chapter.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn source_uses_stored_names() {
        assert_eq!(Source::TruyenFull.to_string(), "TRUYEN_FULL");
        assert_eq!(Source::Mtc.as_ref(), "MTC");
        for source in Source::iter() {
            assert_eq!(Source::from_str(source.as_ref()).unwrap(), source);
        }
    }

    #[test]
    fn blank_title_falls_back_to_name() {
        let story = NewStory::new("tien-nghich", Some("   ".into()), Source::TruyenFull);
        assert_eq!(story.title, "tien-nghich");

        let story = NewStory::new("tien-nghich", Some(" Tiên Nghịch ".into()), Source::TruyenFull);
        assert_eq!(story.title, "Tiên Nghịch");
    }

    #[test]
    fn task_key_must_be_non_negative_integer() {
        assert_eq!(ChapterTask::parse("Chương 7", "7", "chuong-7").unwrap().chapter_key, 7);
        assert!(ChapterTask::parse("x", "-3", "x").is_err());
        assert!(ChapterTask::parse("x", "abc", "x").is_err());
    }
}
