//! 流式转换：上游 `0:` 行协议 -> OpenAI SSE
//!
//! 上游的读取块边界和行边界没有任何对应关系，一行可能跨越多个块，
//! 一个多字节字符也可能被拆开。`StreamTranslator` 以原始字节缓存尚未
//! 结束的行尾，只有遇到 `\n` 才处理该行，因此缓冲区大小只受最长一行约束。

use crate::error::Result;
use crate::models::{
    completion_id, unix_timestamp, ChatCompletionChunk, ChunkChoice, ChunkDelta,
};
use crate::protocol::frame::text_delta;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::{debug, error, warn};

/// 流结束标记
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// 单次流式响应的转换状态机
///
/// 每个请求新建一个实例，不在请求之间共享。
pub struct StreamTranslator {
    /// 尚未形成完整行的数据
    buffer: BytesMut,
    /// buffer 中已确认不含 `\n` 的前缀长度，避免长行被重复扫描
    scanned: usize,
    id: String,
    created: i64,
    model: String,
}

impl StreamTranslator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            id: completion_id(),
            created: unix_timestamp(),
            model: model.into(),
        }
    }

    /// 本次流的补全ID，所有 chunk 共用
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 当前缓存的未完成行长度
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 处理一个上游数据块，返回其中每个完整文本行对应的 SSE 帧
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(self.scanned + offset + 1);
            self.scanned = 0;

            let line = &line[..line.len() - 1];
            let line = match std::str::from_utf8(line) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Skipping upstream line with invalid UTF-8: {}", e);
                    continue;
                }
            };

            if let Some(delta) = text_delta(line) {
                if let Some(frame) = self.encode_delta(delta) {
                    frames.push(frame);
                }
            }
        }
        self.scanned = self.buffer.len();

        frames
    }

    /// 上游正常结束时，把缓冲区剩余内容当作最后一行处理
    ///
    /// 被截断的半行无法通过 JSON 解析，会照常跳过。
    pub fn flush(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = self.buffer.split();
        self.scanned = 0;

        let line = match std::str::from_utf8(&tail) {
            Ok(s) => s,
            Err(e) => {
                warn!("Discarding trailing upstream data with invalid UTF-8: {}", e);
                return None;
            }
        };
        text_delta(line).and_then(|delta| self.encode_delta(delta))
    }

    /// 结束本次流，返回结束标记
    ///
    /// 缓冲区里残留的半行直接丢弃。消费 self，保证结束标记只产生一次。
    pub fn finish(self) -> Bytes {
        if !self.buffer.is_empty() {
            debug!(
                "Discarding {} bytes of incomplete upstream line at end of stream",
                self.buffer.len()
            );
        }
        Bytes::from_static(DONE_FRAME)
    }

    fn encode_delta(&self, content: String) -> Option<Bytes> {
        let chunk = ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta { content },
                finish_reason: None,
            }],
        };

        match serde_json::to_string(&chunk) {
            Ok(json) => Some(Bytes::from(format!("data: {}\n\n", json))),
            Err(e) => {
                error!("Failed to encode completion chunk: {}", e);
                None
            }
        }
    }
}

/// 将上游字节流包装为下游 SSE 字节流
///
/// 每收到一个块立即输出其中的完整帧，不等待上游结束。上游正常结束时最后一行
/// 即使没有换行符也会处理；读取失败时残留数据直接丢弃。两种情况都会补发结束标记，
/// 下游总能看到完整的流结尾。下游断开时返回的流被丢弃，上游连接随之释放。
pub fn translate_stream<S>(upstream: S, model: String) -> impl Stream<Item = Result<Bytes>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    async_stream::stream! {
        let mut upstream = Box::pin(upstream);
        let mut translator = StreamTranslator::new(model);
        debug!("Stream translation started: {}", translator.id());

        let mut completed = true;
        while let Some(chunk_result) = upstream.next().await {
            match chunk_result {
                Ok(chunk) => {
                    for frame in translator.feed(&chunk) {
                        yield Ok(frame);
                    }
                }
                Err(e) => {
                    error!("Upstream stream failed mid-response: {}", e);
                    completed = false;
                    break;
                }
            }
        }

        if completed {
            if let Some(frame) = translator.flush() {
                yield Ok(frame);
            }
        }
        yield Ok(translator.finish());
    }
}
