//! 下游 OpenAI 协议与上游行协议之间的转换

pub mod completion;
pub mod frame;
pub mod request;
pub mod stream;

pub use completion::build_completion;
pub use request::ChatRequest;
pub use stream::{translate_stream, StreamTranslator, DONE_FRAME};
