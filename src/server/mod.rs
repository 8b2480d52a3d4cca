//! 抓取触发接口 (HTTP Trigger)
//!
//! `POST /api/v1/crawl?url=...` 受理后立即返回 202，抓取在后台进行。

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::error::{CrawlError, Result};
use crate::engine::CrawlService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// 统一响应包装
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseResponse<T> {
    pub status: ResponseStatus,
    pub data: Option<T>,
    pub message: Option<String>,
    pub created_time: DateTime<Utc>,
}

impl<T> BaseResponse<T> {
    pub fn success(data: Option<T>, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            data,
            message: Some(message.into()),
            created_time: Utc::now(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failure,
            data: None,
            message: Some(message.into()),
            created_time: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CrawlQuery {
    pub url: Option<String>,
}

type ApiReply = (StatusCode, Json<BaseResponse<String>>);

pub fn router(service: Arc<CrawlService>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/v1/crawl", post(trigger_crawl))
        .with_state(service)
}

async fn trigger_crawl(
    State(service): State<Arc<CrawlService>>,
    Query(query): Query<CrawlQuery>,
) -> ApiReply {
    let url = query.url.unwrap_or_default();

    match service.crawl(&url) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(BaseResponse::success(
                Some(url),
                "Crawling started in background",
            )),
        ),
        Err(e) => {
            warn!("拒绝抓取请求 {:?}: {}", url, e);
            let status = match e {
                CrawlError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CrawlError::UnsupportedSource { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CrawlError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(BaseResponse::failure(e.to_string())))
        }
    }
}

/// 启动监听；收到 Ctrl-C 后停止接收请求并等待后台抓取退出
pub async fn serve(service: Arc<CrawlService>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("触发接口已监听: {}", listener.local_addr()?);

    axum::serve(listener, router(service.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    service.shutdown().await;
    Ok(())
}
