//! 进程内存储
//!
//! 与 SQLite 实现遵守同样的唯一性约束，供测试与试运行使用。

use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::error::{CrawlError, Result};
use crate::core::model::{Chapter, NewChapter, NewStory, Story};
use crate::interfaces::Store;

#[derive(Default)]
struct Tables {
    stories: Vec<Story>,
    chapters: Vec<Chapter>,
    next_story_id: i64,
    next_chapter_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某故事下的全部章节，按键排序
    pub fn chapters_of(&self, story_id: i64) -> Vec<Chapter> {
        let tables = self.tables.lock();
        let mut chapters: Vec<_> = tables
            .chapters
            .iter()
            .filter(|c| c.story_id == story_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.key);
        chapters
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_story_by_name(&self, name: &str) -> Result<Option<Story>> {
        let tables = self.tables.lock();
        Ok(tables.stories.iter().find(|s| s.name == name).cloned())
    }

    async fn save_story(&self, story: &NewStory) -> Result<Story> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.stories.iter().find(|s| s.name == story.name) {
            return Ok(existing.clone());
        }

        tables.next_story_id += 1;
        let saved = Story {
            id: tables.next_story_id,
            name: story.name.clone(),
            title: story.title.clone(),
            source: story.source,
        };
        tables.stories.push(saved.clone());
        Ok(saved)
    }

    async fn backfill_title(&self, story_id: i64, title: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        let story = tables
            .stories
            .iter_mut()
            .find(|s| s.id == story_id)
            .ok_or_else(|| CrawlError::Custom(format!("story {} not found", story_id)))?;
        story.title = title.to_string();
        Ok(())
    }

    async fn existing_chapter_keys(
        &self,
        story_id: i64,
        candidates: &BTreeSet<u32>,
    ) -> Result<BTreeSet<u32>> {
        let tables = self.tables.lock();
        Ok(tables
            .chapters
            .iter()
            .filter(|c| c.story_id == story_id && candidates.contains(&c.key))
            .map(|c| c.key)
            .collect())
    }

    async fn save_chapters(&self, batch: Vec<NewChapter>) -> Result<Vec<Chapter>> {
        let mut tables = self.tables.lock();
        let mut saved = Vec::with_capacity(batch.len());

        for chapter in batch {
            let taken = tables
                .chapters
                .iter()
                .any(|c| c.story_id == chapter.story_id && c.key == chapter.key);
            if taken {
                continue;
            }

            tables.next_chapter_id += 1;
            let row = Chapter {
                id: tables.next_chapter_id,
                story_id: chapter.story_id,
                key: chapter.key,
                title: chapter.title,
                content: chapter.content,
            };
            tables.chapters.push(row.clone());
            saved.push(row);
        }
        Ok(saved)
    }

    async fn count_chapters(&self, story_id: i64) -> Result<u64> {
        let tables = self.tables.lock();
        Ok(tables.chapters.iter().filter(|c| c.story_id == story_id).count() as u64)
    }
}
