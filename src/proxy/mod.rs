mod headers;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::models::UpstreamRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{header::HeaderMap, Client, Response};
use std::pin::Pin;
use std::time::Duration;
use tracing::{error, info};

/// 上游返回的原始字节流
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// 上游聊天服务
///
/// 每次调用只发出一个上游请求，不重试。
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    /// 等待上游完整响应，返回响应文本
    async fn complete(&self, request: UpstreamRequest) -> Result<String>;

    /// 上游返回响应头后立即返回字节流
    async fn stream(&self, request: UpstreamRequest) -> Result<ByteStream>;
}

pub struct UpstreamClient {
    // 不设置整体请求超时，长时间的流式响应不会被截断
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_keepalive(if config.keep_alive {
                Some(Duration::from_secs(30))
            } else {
                None
            })
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            url: config.url.clone(),
            headers: config.headers.to_header_map()?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_request(&self, request: &UpstreamRequest) -> Result<Response> {
        info!(
            "send_request: {} messages -> {}",
            request.messages.len(),
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("HTTP client connection failed: {:?}", e);
                Error::Http(e)
            })?;

        Self::check_status(response).await
    }

    // 非 2xx 响应读取错误体后转为 Upstream 错误
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            info!("Upstream success response status: {}", status);
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());

        error!("Upstream error response (status {}): {}", status, body);

        Err(Error::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChatUpstream for UpstreamClient {
    async fn complete(&self, request: UpstreamRequest) -> Result<String> {
        let response = self.send_request(&request).await?;
        let body = response.text().await.map_err(Error::Http)?;
        Ok(body)
    }

    async fn stream(&self, request: UpstreamRequest) -> Result<ByteStream> {
        let response = self.send_request(&request).await?;
        info!("stream: established");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::Http));
        Ok(Box::pin(stream))
    }
}
