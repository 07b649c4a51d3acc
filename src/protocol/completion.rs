use crate::models::{
    completion_id, unix_timestamp, AssistantMessage, ChatCompletion, CompletionChoice, Usage,
};
use crate::protocol::frame::text_delta;

/// 按行顺序拼接完整上游响应中所有 `0:` 行的文本
pub fn collect_text(body: &str) -> String {
    body.split('\n').filter_map(text_delta).collect()
}

/// 将完整的上游响应体转换为 chat.completion
///
/// 没有任何文本行时返回空内容，而不是错误。
pub fn build_completion(body: &str, model: &str) -> ChatCompletion {
    ChatCompletion {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: unix_timestamp(),
        model: model.to_string(),
        choices: vec![CompletionChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: collect_text(body),
            },
            finish_reason: "stop".to_string(),
        }],
        usage: Usage::default(),
    }
}
