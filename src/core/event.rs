//! 事件系统定义
//!
//! 用于编排器与 UI 之间的完全解耦通信

use flume::{Receiver, Sender};

/// 抓取事件类型
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// 故事已就绪 (新建或复用)
    CrawlStarted { story: String, title: String },

    /// 目录枚举与去重完成
    TasksDiscovered { total: usize, pending: usize },

    /// 宏批次开始
    BatchStarted {
        index: usize,
        total: usize,
        size: usize,
    },

    /// 单章节已写入
    ChapterSaved { key: u32, title: String },

    /// 单章节被软失败跳过
    ChapterSkipped { key: u32, reason: String },

    /// 宏批次之间的冷却
    Cooldown { secs: u64 },

    /// 抓取完成
    CrawlCompleted { story: String, saved: usize },

    /// 抓取失败
    CrawlFailed { error: String },
}

/// 事件发送器
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<CrawlEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<CrawlEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件；接收端关闭时静默丢弃
    pub fn emit(&self, event: CrawlEvent) {
        let _ = self.tx.send(event);
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<CrawlEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<CrawlEvent>) -> Self {
        Self { rx }
    }

    /// 非阻塞接收事件
    pub fn try_recv(&self) -> Option<CrawlEvent> {
        self.rx.try_recv().ok()
    }

    /// 异步接收事件
    pub async fn recv_async(&self) -> Option<CrawlEvent> {
        self.rx.recv_async().await.ok()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
