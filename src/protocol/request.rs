use crate::error::{Error, Result};
use crate::models::UpstreamRequest;
use serde_json::Value;

/// 校验后的下游聊天请求
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// 原样转发给上游的消息列表
    pub messages: Vec<Value>,
    pub stream: bool,
}

impl ChatRequest {
    /// 解析请求体
    ///
    /// 请求体不是合法JSON时返回序列化错误（按内部错误处理）；
    /// messages 缺失或不是数组时返回 InvalidRequest，请求不会发往上游。
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self> {
        let messages = match value.get_mut("messages").map(Value::take) {
            Some(Value::Array(messages)) => messages,
            _ => {
                return Err(Error::InvalidRequest(
                    "'messages' is required and must be an array".to_string(),
                ))
            }
        };

        let stream = value.get("stream").map(is_truthy).unwrap_or(false);

        Ok(Self { messages, stream })
    }

    /// 构造上游请求体，只保留 messages
    pub fn into_upstream(self) -> UpstreamRequest {
        UpstreamRequest {
            messages: self.messages,
        }
    }
}

// 与 JSON 客户端常见的真值判断保持一致
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
