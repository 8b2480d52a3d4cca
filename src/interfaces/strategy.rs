//! 抓取策略定义
//!
//! 每个来源站点实现此 Trait，提供：
//! - 落地页解析 (故事标识与标题)
//! - 章节目录枚举
//! - 单章节抓取与解码

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::model::{ChapterTask, NewChapter, NewStory, Source, Story};
use crate::engine::session::CrawlSession;

#[async_trait]
pub trait CrawlStrategy: Send + Sync {
    /// 站点唯一标识
    fn id(&self) -> &str;

    fn source(&self) -> Source;

    /// 基础 URL (不含末尾斜杠)
    fn base_url(&self) -> &str;

    /// 主机前缀匹配
    fn supports(&self, url: &str) -> bool {
        url.starts_with(self.base_url())
    }

    /// 为一次抓取创建会话态 (密钥缓存等)
    fn open_session(&self, story: Story) -> CrawlSession {
        CrawlSession::new(story)
    }

    /// 抓取落地页，派生故事名与标题
    async fn parse_story(&self, url: &str) -> Result<NewStory>;

    /// 枚举完整章节任务列表
    ///
    /// 残缺条目应跳过并记录日志，不应让整个目录失败。
    async fn parse_chapter_tasks(&self, url: &str, story: &Story) -> Result<Vec<ChapterTask>>;

    /// 抓取单章节
    ///
    /// - `Err`：传输层故障，交由重试执行器重试
    /// - `Ok(None)`：页面结构缺失，软失败，不落库
    async fn parse_chapter(
        &self,
        session: &CrawlSession,
        task: &ChapterTask,
    ) -> Result<Option<NewChapter>>;
}
