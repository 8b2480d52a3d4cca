//! 章节去重
//!
//! 在分发任何抓取之前剔除已持久化的章节键。

use std::collections::BTreeSet;

use tracing::info;

use crate::core::error::Result;
use crate::core::model::ChapterTask;
use crate::interfaces::Store;

/// 保留键不在 `existing` 中的任务，维持原有顺序
pub fn retain_missing(tasks: Vec<ChapterTask>, existing: &BTreeSet<u32>) -> Vec<ChapterTask> {
    tasks
        .into_iter()
        .filter(|t| !existing.contains(&t.chapter_key))
        .collect()
}

/// 查询存储并过滤掉已存在的章节
pub async fn filter_existing(
    store: &dyn Store,
    story_id: i64,
    tasks: Vec<ChapterTask>,
) -> Result<Vec<ChapterTask>> {
    if tasks.is_empty() {
        return Ok(tasks);
    }

    let candidates: BTreeSet<u32> = tasks.iter().map(|t| t.chapter_key).collect();
    let existing = store.existing_chapter_keys(story_id, &candidates).await?;
    let total = tasks.len();
    let pending = retain_missing(tasks, &existing);

    info!(
        "目录共 {} 章，已存在 {} 章，待抓取 {} 章",
        total,
        existing.len(),
        pending.len()
    );
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(keys: &[u32]) -> Vec<ChapterTask> {
        keys.iter()
            .map(|k| ChapterTask::new(format!("Chương {}", k), *k, format!("chuong-{}", k)))
            .collect()
    }

    fn keys(tasks: &[ChapterTask]) -> Vec<u32> {
        tasks.iter().map(|t| t.chapter_key).collect()
    }

    #[test]
    fn removes_existing_keys_in_order() {
        let existing = BTreeSet::from([1, 2, 3]);
        let pending = retain_missing(tasks(&[1, 2, 3, 4, 5]), &existing);
        assert_eq!(keys(&pending), [4, 5]);
    }

    #[test]
    fn empty_existing_keeps_everything() {
        let input = tasks(&[9, 3, 7]);
        let pending = retain_missing(input.clone(), &BTreeSet::new());
        assert_eq!(pending, input);
    }

    #[test]
    fn all_keys_existing_leaves_nothing() {
        let input = tasks(&[9, 3, 7, 3]);
        let all_keys: BTreeSet<u32> = input.iter().map(|t| t.chapter_key).collect();
        assert!(retain_missing(input, &all_keys).is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let existing = BTreeSet::from([2, 4]);
        let once = retain_missing(tasks(&[1, 2, 3, 4]), &existing);
        let twice = retain_missing(once.clone(), &existing);
        assert_eq!(once, twice);
    }
}
