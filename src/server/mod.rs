use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::models::{
    unix_timestamp, InternalErrorBody, ModelCard, ModelList, UpstreamErrorBody,
    UpstreamErrorDetail,
};
use crate::protocol::{build_completion, translate_stream, ChatRequest};
use crate::proxy::ChatUpstream;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    upstream: Arc<dyn ChatUpstream>,
    model: Arc<ModelConfig>,
}

impl AppState {
    pub fn new(upstream: Arc<dyn ChatUpstream>, model: ModelConfig) -> Self {
        Self {
            upstream,
            model: Arc::new(model),
        }
    }
}

/// 构建完整的路由，包括 CORS 和请求日志
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/models", get(list_models).fallback(method_not_allowed))
        .route(
            "/v1/chat/completions",
            // 长对话原样转发，不限制请求体大小
            post(chat_completions)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::disable()),
        )
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                // 过滤掉健康检查的日志
                if request.uri().path() == "/health" {
                    tracing::trace_span!("health_check")
                } else {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }
            }),
        )
        .layer(cors_layer())
        .with_state(state)
}

/// 允许任意来源；OPTIONS 预检请求由该层直接返回
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy"
    }))
}

async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList {
        object: "list".to_string(),
        data: vec![ModelCard {
            id: state.model.id.clone(),
            object: "model".to_string(),
            created: unix_timestamp(),
            owned_by: state.model.owned_by.clone(),
        }],
    })
}

async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    match handle_chat(state, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle_chat(state: AppState, body: Bytes) -> Result<Response> {
    let request = ChatRequest::from_slice(&body)?;
    let is_stream = request.stream;

    info!(
        "Request routing - stream: {}, messages: {}",
        is_stream,
        request.messages.len()
    );

    let upstream_request = request.into_upstream();

    if is_stream {
        let byte_stream = state.upstream.stream(upstream_request).await?;
        let frames = translate_stream(byte_stream, state.model.id.clone());

        // 设置 SSE 必要的响应头
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .header("x-accel-buffering", "no") // 禁用 nginx 缓冲
            .body(Body::from_stream(frames))
            .map_err(|e| Error::Internal(e.to_string()))
    } else {
        // 非流式路径等待上游完整响应后一次性转换
        let text = state.upstream.complete(upstream_request).await?;
        let completion = build_completion(&text, &state.model.id);
        Ok(Json(completion).into_response())
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::InvalidRequest(_) => {
                info!("Rejected request: {}", self);
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            Error::Upstream { status, .. } => {
                let body = UpstreamErrorBody {
                    error: UpstreamErrorDetail {
                        message: self.to_string(),
                        error_type: "upstream_error".to_string(),
                        param: None,
                        code: status,
                    },
                };
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(body)).into_response()
            }
            _ => {
                error!("Request failed: {}", self);
                let body = InternalErrorBody {
                    error: "Internal Server Error".to_string(),
                    message: self.to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
