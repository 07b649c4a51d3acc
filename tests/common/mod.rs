//! 路由测试共用的夹具

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use axum::Router;
use chat_relay::config::ModelConfig;
use chat_relay::models::UpstreamRequest;
use chat_relay::proxy::{ByteStream, ChatUpstream};
use chat_relay::server::{create_router, AppState};
use chat_relay::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// 假上游的应答方式
#[derive(Clone)]
pub enum Reply {
    /// 成功响应，按给定的块依次返回
    Chunks(Vec<Vec<u8>>),
    /// 返回若干块后出现传输错误
    BrokenAfter(Vec<Vec<u8>>),
    /// 非 2xx 状态码及响应体
    Status(u16, String),
}

pub struct FakeUpstream {
    reply: Reply,
    calls: AtomicUsize,
    last_request: Mutex<Option<UpstreamRequest>>,
}

impl FakeUpstream {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn body(body: &str) -> Arc<Self> {
        Self::new(Reply::Chunks(vec![body.as_bytes().to_vec()]))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<UpstreamRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn record(&self, request: UpstreamRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
    }
}

#[async_trait]
impl ChatUpstream for FakeUpstream {
    async fn complete(&self, request: UpstreamRequest) -> Result<String> {
        self.record(request);
        match &self.reply {
            Reply::Chunks(chunks) => Ok(String::from_utf8(chunks.concat()).unwrap()),
            Reply::BrokenAfter(_) => Err(Error::Internal("connection reset".into())),
            Reply::Status(status, body) => Err(Error::Upstream {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    async fn stream(&self, request: UpstreamRequest) -> Result<ByteStream> {
        self.record(request);
        let items: Vec<Result<Bytes>> = match &self.reply {
            Reply::Chunks(chunks) => chunks.iter().cloned().map(|c| Ok(Bytes::from(c))).collect(),
            Reply::BrokenAfter(chunks) => chunks
                .iter()
                .cloned()
                .map(|c| Ok(Bytes::from(c)))
                .chain(std::iter::once(Err(Error::Internal("connection reset".into()))))
                .collect(),
            Reply::Status(status, body) => {
                return Err(Error::Upstream {
                    status: *status,
                    body: body.clone(),
                })
            }
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

pub fn model() -> ModelConfig {
    ModelConfig {
        id: "test-model".to_string(),
        owned_by: "test-owner".to_string(),
    }
}

pub fn app(upstream: Arc<FakeUpstream>) -> Router {
    create_router(AppState::new(upstream, model()))
}

pub fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// 把 SSE 响应体拆成各事件的 `data:` 内容
pub fn sse_payloads(body: &[u8]) -> Vec<String> {
    let text = std::str::from_utf8(body).unwrap();
    assert!(text.ends_with("\n\n"), "unterminated SSE body: {text:?}");
    text.split_terminator("\n\n")
        .map(|event| event.strip_prefix("data: ").unwrap().to_string())
        .collect()
}

/// 按顺序取出每个 chunk 的 `delta.content`，不含结束标记
pub fn sse_deltas(body: &[u8]) -> Vec<String> {
    sse_payloads(body)
        .into_iter()
        .filter(|payload| payload != "[DONE]")
        .map(|payload| {
            let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
            value["choices"][0]["delta"]["content"].as_str().unwrap().to_string()
        })
        .collect()
}
