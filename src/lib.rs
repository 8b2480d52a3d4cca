//! 故事抓取服务
//!
//! 从受支持的小说站点抓取故事与章节，去重后按批次写入本地存储。

pub mod core;
pub mod engine;
pub mod interfaces;
pub mod network;
pub mod server;
pub mod sites;
pub mod store;
pub mod ui;
pub mod utils;
