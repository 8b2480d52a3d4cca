use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::debug;

use crate::core::config::HttpConfig;
use crate::core::error::{CrawlError, Result};
use crate::interfaces::Fetcher;
use crate::network::middleware::{SessionMiddleware, StatusMiddleware, unwrap_middleware_error};
use crate::network::session::Session;

/// 共享 HTTP 服务
///
/// 连接池在所有策略与任务间共享；克隆只增加引用计数。
#[derive(Clone)]
pub struct HttpService {
    client: ClientWithMiddleware,
    session: Arc<Session>,
}

impl HttpService {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let session = Arc::new(Session::from_config(config));
        let client = Self::try_build_internal_client(config)?;
        Ok(Self { client, session })
    }

    /// 构建底层的 HTTP 客户端
    fn try_build_internal_client(config: &HttpConfig) -> Result<ClientWithMiddleware> {
        let mut client_builder = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy_url) = &config.proxy {
            client_builder = client_builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let client = client_builder.build().map_err(CrawlError::Network)?;

        Ok(ClientBuilder::new(client)
            .with(SessionMiddleware)
            .with(StatusMiddleware)
            .build())
    }
}

#[async_trait]
impl Fetcher for HttpService {
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .with_extension(self.session.clone())
            .send()
            .await
            .map_err(unwrap_middleware_error)?;
        resp.text().await.map_err(CrawlError::Network)
    }
}
