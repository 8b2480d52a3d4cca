//! 章节任务执行单元

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::model::{ChapterTask, NewChapter};

use super::context::RuntimeContext;

/// 任务执行结果
#[derive(Debug)]
pub enum TaskOutcome {
    /// 章节内容已获取，等待持久化
    Fetched(NewChapter),
    /// 软失败：结构缺失、重试耗尽或已停机
    Skipped { key: u32, reason: String },
}

/// 执行单个章节任务
///
/// 准入许可覆盖整个重试序列，退避等待期间同样占用名额。
pub async fn run_chapter_task(task: ChapterTask, ctx: Arc<RuntimeContext>) -> TaskOutcome {
    let key = task.chapter_key;

    let _permit = match ctx.semaphore.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            return TaskOutcome::Skipped {
                key,
                reason: e.to_string(),
            };
        }
    };

    if ctx.shutdown.is_cancelled() {
        return TaskOutcome::Skipped {
            key,
            reason: "shutdown requested".into(),
        };
    }

    debug!("抓取章节 {} - {}", key, task.display_name);
    let result = ctx
        .retry
        .execute(format!("章节 {}", key), &ctx.retry_spec, || {
            ctx.strategy.parse_chapter(&ctx.session, &task)
        })
        .await;

    match result {
        Ok(Some(chapter)) => TaskOutcome::Fetched(chapter),
        Ok(None) => {
            warn!("章节 {} 页面结构缺失，跳过", key);
            TaskOutcome::Skipped {
                key,
                reason: "content not found".into(),
            }
        }
        Err(e) => TaskOutcome::Skipped {
            key,
            reason: e.to_string(),
        },
    }
}
