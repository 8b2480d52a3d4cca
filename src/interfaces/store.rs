//! 持久化存储接口
//!
//! 唯一的共享可变资源。实现必须支持并发读写，且保证 `(story_id, key)` 唯一。

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::model::{Chapter, NewChapter, NewStory, Story};

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_story_by_name(&self, name: &str) -> Result<Option<Story>>;

    /// 按 name 插入（已存在则不插入）并返回存储中的行
    async fn save_story(&self, story: &NewStory) -> Result<Story>;

    /// 回填标题；name 不可变
    async fn backfill_title(&self, story_id: i64, title: &str) -> Result<()>;

    /// 返回候选键中已存在于该故事下的子集
    async fn existing_chapter_keys(
        &self,
        story_id: i64,
        candidates: &BTreeSet<u32>,
    ) -> Result<BTreeSet<u32>>;

    /// 批量写入章节
    ///
    /// 与已存在行冲突的 `(story_id, key)` 视为幂等空操作，不出现在返回值中。
    async fn save_chapters(&self, batch: Vec<NewChapter>) -> Result<Vec<Chapter>>;

    async fn count_chapters(&self, story_id: i64) -> Result<u64>;
}
