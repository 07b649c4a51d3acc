//! 上游行协议解析
//!
//! 上游按行输出，每行形如 `<tag>:<payload>`。只有 `0:` 行携带文本增量，
//! 其 payload 是一个 JSON 字符串字面量；其他前缀的行保留给上游的其他事件类型，
//! 这里不做解释。

use thiserror::Error;
use tracing::{debug, warn};

/// 文本增量行的前缀
pub const TEXT_PREFIX: &str = "0:";

/// 一行解析后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// `0:` 行携带的文本增量
    Delta(String),
    /// 空行或非 `0:` 前缀的行
    Ignored,
}

/// `0:` 行的 payload 无法解析为字符串
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is not a JSON string: {0}")]
    NotAString(String),
}

/// 解析一行完整的上游输出（不含 `\n`）
pub fn parse_line(line: &str) -> Result<LineEvent, FrameError> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    let Some(payload) = line.strip_prefix(TEXT_PREFIX) else {
        return Ok(LineEvent::Ignored);
    };

    match serde_json::from_str::<serde_json::Value>(payload)? {
        serde_json::Value::String(text) => Ok(LineEvent::Delta(text)),
        other => Err(FrameError::NotAString(other.to_string())),
    }
}

/// 提取一行的文本增量
///
/// 格式异常的 `0:` 行只记录警告并跳过，不会中断整个响应。
pub fn text_delta(line: &str) -> Option<String> {
    match parse_line(line) {
        Ok(LineEvent::Delta(text)) => Some(text),
        Ok(LineEvent::Ignored) => {
            if !line.trim().is_empty() {
                debug!("Skipping non-text upstream line: {}", truncate(line));
            }
            None
        }
        Err(e) => {
            warn!("Skipping malformed upstream line ({}): {}", e, truncate(line));
            None
        }
    }
}

// 日志里只保留行首，避免超长行刷屏
fn truncate(line: &str) -> &str {
    const MAX: usize = 120;
    if line.len() <= MAX {
        return line;
    }
    let mut end = MAX;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
