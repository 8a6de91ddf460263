//! # Streaming Support
//!
//! Folding of server-sent chat-completion deltas into incrementally
//! complete messages: `merge` combines two adjacent fragments, `accumulator`
//! drives the merge across a whole stream.

pub mod accumulator;
pub mod merge;

pub use accumulator::{
    accumulate, is_streaming_tool_function_call, is_streaming_tool_function_call_finish,
    ChatCompletionAccumulator,
};
pub use merge::merge_chunk;
