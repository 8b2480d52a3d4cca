use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::core::config::{AppConfig, SiteConfig};
use crate::core::error::{CrawlError, Result};
use crate::interfaces::{CrawlStrategy, Fetcher};

pub mod metruyencv;
pub mod truyenfull;

// ============================================================================
// 策略注册表
// ============================================================================

type StrategyFactory =
    Box<dyn Fn(SiteConfig, Arc<dyn Fetcher>) -> Arc<dyn CrawlStrategy> + Send + Sync>;

struct Registration {
    site_id: String,
    config: SiteConfig,
    factory: StrategyFactory,
}

/// 按主机名分派策略
///
/// 每次解析都创建新的策略实例，抓取之间不共享状态。
pub struct StrategyRegistry {
    fetcher: Arc<dyn Fetcher>,
    by_host: HashMap<String, Registration>,
}

impl StrategyRegistry {
    /// 注册全部内置站点，域名可被 `[sites.<id>]` 覆盖
    pub fn new(config: &AppConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let mut registry = Self::empty(fetcher);
        registry.register(
            truyenfull::SITE_ID,
            truyenfull::DEFAULT_BASE_URL,
            config.site(truyenfull::SITE_ID),
            |cfg, fetcher| Arc::new(truyenfull::TruyenFull::new(cfg, fetcher)),
        );
        registry.register(
            metruyencv::SITE_ID,
            metruyencv::DEFAULT_BASE_URL,
            config.site(metruyencv::SITE_ID),
            |cfg, fetcher| Arc::new(metruyencv::Metruyencv::new(cfg, fetcher)),
        );
        registry
    }

    pub fn empty(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            by_host: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, site_id: &str, default_base_url: &str, config: SiteConfig, factory: F)
    where
        F: Fn(SiteConfig, Arc<dyn Fetcher>) -> Arc<dyn CrawlStrategy> + Send + Sync + 'static,
    {
        let base_url = config.base_url.as_deref().unwrap_or(default_base_url);
        let Some(host) = Url::parse(base_url)
            .ok()
            .and_then(|u| u.host_str().map(normalize_host))
        else {
            warn!("站点 {} 的基础地址无效，已忽略: {}", site_id, base_url);
            return;
        };

        debug!("注册站点 {} -> {}", site_id, host);
        self.by_host.insert(
            host,
            Registration {
                site_id: site_id.to_string(),
                config,
                factory: Box::new(factory),
            },
        );
    }

    /// 按 URL 的主机名匹配策略
    pub fn resolve(&self, url: &str) -> Result<Arc<dyn CrawlStrategy>> {
        let parsed =
            Url::parse(url).map_err(|e| CrawlError::InvalidInput(format!("{}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .map(normalize_host)
            .ok_or_else(|| CrawlError::InvalidInput(format!("url has no host: {}", url)))?;

        let unsupported = || CrawlError::UnsupportedSource { host: host.clone() };
        let registration = self.by_host.get(&host).ok_or_else(unsupported)?;

        let strategy = (registration.factory)(registration.config.clone(), self.fetcher.clone());
        if !strategy.supports(url) {
            warn!(
                "站点 {} 不接受该地址 (协议或路径不匹配): {}",
                registration.site_id, url
            );
            return Err(unsupported());
        }
        Ok(strategy)
    }

    /// 已注册的站点标识 (按名称排序)
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_host.values().map(|r| r.site_id.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

fn normalize_host(host: &str) -> String {
    host.to_ascii_lowercase()
}
