pub mod fetch;
pub mod store;
pub mod strategy;

pub use fetch::Fetcher;
pub use store::Store;
pub use strategy::CrawlStrategy;
