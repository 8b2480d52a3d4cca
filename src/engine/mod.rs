pub mod context;
pub mod dedup;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod session;
pub mod task;

pub use pipeline::{CrawlPipeline, PipelineSettings};
pub use retry::{RetryExecutor, RetrySpec};
pub use service::{CrawlReport, CrawlService};
pub use session::CrawlSession;
