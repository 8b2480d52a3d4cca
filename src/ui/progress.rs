//! 终端进度渲染 (Terminal Progress)
//!
//! 基于 `indicatif` 订阅抓取事件并渲染进度条；日志经由同一容器输出，避免互相覆盖。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::core::event::{CrawlEvent, EventReceiver};

/// 全局 TUI 容器 (Singleton)
static MULTI: OnceLock<MultiProgress> = OnceLock::new();

/// 获取全局进度容器实例
pub fn get_multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

/// TUI 状态容器
#[derive(Default)]
struct UiState {
    /// 故事主状态条
    main_bar: Option<ProgressBar>,
    /// 章节进度条
    chapter_bar: Option<ProgressBar>,
    skipped: usize,
}

static STATE: OnceLock<Arc<RwLock<UiState>>> = OnceLock::new();

fn get_state() -> &'static Arc<RwLock<UiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(UiState::default())))
}

/// 进度协调器
pub struct Ui;

impl Ui {
    /// 启动事件监听循环；所有发送端释放后退出
    pub fn run(receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv_async().await {
                Self::handle_event(event);
            }
        })
    }

    fn handle_event(event: CrawlEvent) {
        let multi = get_multi();
        let mut ui = get_state().write();

        match event {
            CrawlEvent::CrawlStarted { title, .. } => {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style);
                bar.set_message(format!("📚 {}", title));
                bar.enable_steady_tick(Duration::from_millis(100));
                ui.main_bar = Some(bar);
            }
            CrawlEvent::TasksDiscovered { total, pending } => {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap()
                    .progress_chars("█▉▊▋▌▍▎▏  ");

                let bar = multi.add(ProgressBar::new(pending as u64));
                bar.set_style(style);
                bar.set_message(format!("目录 {} 章", total));
                ui.chapter_bar = Some(bar);
            }
            CrawlEvent::BatchStarted { index, total, size } => {
                if let Some(ref bar) = ui.main_bar {
                    bar.set_message(format!("📦 批次 {}/{} ({} 章)", index, total, size));
                }
            }
            CrawlEvent::ChapterSaved { title, .. } => {
                if let Some(ref bar) = ui.chapter_bar {
                    bar.inc(1);
                    bar.set_message(truncate_string(&title, 30));
                }
            }
            CrawlEvent::ChapterSkipped { key, .. } => {
                ui.skipped += 1;
                if let Some(ref bar) = ui.chapter_bar {
                    bar.inc(1);
                    bar.set_message(format!("⚠️ 跳过章节 {}", key));
                }
            }
            CrawlEvent::Cooldown { secs } => {
                if let Some(ref bar) = ui.main_bar {
                    bar.set_message(format!("⏸️ 冷却 {} 秒", secs));
                }
            }
            CrawlEvent::CrawlCompleted { saved, .. } => {
                let skipped = ui.skipped;
                if let Some(ref bar) = ui.chapter_bar {
                    bar.finish_with_message(format!("✅ 新增 {} 章，跳过 {} 章", saved, skipped));
                }
                if let Some(ref bar) = ui.main_bar {
                    bar.finish_with_message("✅ 抓取完成");
                }
            }
            CrawlEvent::CrawlFailed { error } => {
                if let Some(ref bar) = ui.main_bar {
                    bar.abandon_with_message(format!("❌ 失败: {}", error));
                }
            }
        }
    }
}

/// 按字符截断
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_by_chars() {
        assert_eq!(truncate_string("Chương 1", 30), "Chương 1");
        assert_eq!(truncate_string("Chương một trăm lẻ một", 10), "Chương ...");
    }
}
