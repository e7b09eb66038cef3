//! API Module
//!
//! Messages API types and streaming support.

pub mod messages;
pub mod streaming;

pub use messages::{
    ApiErrorBody, ChatRequest, ContentBlock, ConversationMessage, MessagesResponse, Role,
};
pub use streaming::{
    accumulate, parse_sse_line, EventStream, ParseStats, SseParser, StreamAccumulator,
    StreamEvent,
};
