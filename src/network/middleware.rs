use std::sync::Arc;

use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::warn;

use crate::core::error::CrawlError;
use crate::network::session::Session;

/// 会话注入中间件
/// 负责在每次请求前，动态将 Session 中的最新 Cookie/UA 注入 Header
pub struct SessionMiddleware;

#[async_trait::async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(session) = extensions.get::<Arc<Session>>() {
            let headers = req.headers_mut();

            let ua = session.get_ua();
            if !ua.is_empty()
                && let Ok(val) = reqwest::header::HeaderValue::from_str(&ua)
            {
                headers.insert(reqwest::header::USER_AGENT, val);
            }

            if let Some(cookie) = session.get_cookie()
                && !cookie.is_empty()
                && let Ok(val) = reqwest::header::HeaderValue::from_str(&cookie)
            {
                headers.insert(reqwest::header::COOKIE, val);
            }
        }
        next.run(req, extensions).await
    }
}

/// 状态码守卫中间件
/// 非 2xx 响应一律转为 `CrawlError::HttpStatus`，交给上层重试
pub struct StatusMiddleware;

#[async_trait::async_trait]
impl Middleware for StatusMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let resp = next.run(req, extensions).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            warn!("检测到限流/封禁响应 {}: {}", status, resp.url());
        }

        Err(reqwest_middleware::Error::from(anyhow::Error::new(
            CrawlError::HttpStatus {
                status,
                url: resp.url().to_string(),
            },
        )))
    }
}

/// 解包中间件错误中携带的领域错误
pub fn unwrap_middleware_error(err: reqwest_middleware::Error) -> CrawlError {
    match err {
        reqwest_middleware::Error::Middleware(inner) => match inner.downcast::<CrawlError>() {
            Ok(domain) => domain,
            Err(other) => CrawlError::Custom(other.to_string()),
        },
        reqwest_middleware::Error::Reqwest(e) => CrawlError::Network(e),
    }
}
