//! # zhipu-llm
//!
//! A client library for the ZhipuAI open platform (GLM model family):
//! chat completions with tool calling, server-sent-event streaming with a
//! chunk accumulator, embeddings, image generation, file management, and
//! fine-tuning jobs.
//!
//! ## Features
//!
//! - **Chat completions**: blocking and streaming, with tools/function
//!   calling, sampling controls, and per-request ids
//! - **Streaming accumulator**: merges delta chunks into a running
//!   snapshot, including tool-call fragments split across events
//! - **Embeddings, images, files, fine-tuning**: the remaining v4 API
//!   surfaces behind the same client
//! - **Resilient transport**: pooled connections, retries with
//!   exponential backoff and jitter, `Retry-After` handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zhipu_llm::{ChatCompletionRequest, ChatMessage, ZhipuClient};
//!
//! # async fn run() -> zhipu_llm::Result<()> {
//! let client = ZhipuClient::from_api_key("your-api-key")?;
//! let request = ChatCompletionRequest {
//!     messages: vec![ChatMessage::user("Hello!")],
//!     ..Default::default()
//! };
//! let response = client.chat_completions(request).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use tokio_util::sync::CancellationToken;
//! use zhipu_llm::{streaming, ChatCompletionRequest, ChatMessage, ZhipuClient};
//!
//! # async fn run() -> zhipu_llm::Result<()> {
//! let client = ZhipuClient::from_api_key("your-api-key")?;
//! let request = ChatCompletionRequest {
//!     messages: vec![ChatMessage::user("Hello!")],
//!     ..Default::default()
//! };
//! let chunks = client.stream_chat_completions(request).await?;
//! let mut snapshots = Box::pin(streaming::accumulate(chunks, CancellationToken::new()));
//! while let Some(snapshot) = snapshots.next().await {
//!     let snapshot = snapshot?;
//!     // each snapshot holds everything merged so far
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod schemas;
pub mod service;
pub mod streaming;

pub use client::ZhipuClient;
pub use config::Config;
pub use error::ZhipuError;
pub use schemas::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, FinishReason,
    FunctionCall, Role, Tool, ToolCall,
};
pub use service::{ChatService, ChunkStream};
pub use streaming::ChatCompletionAccumulator;

/// Convenience result type used across the crate.
pub type Result<T> = std::result::Result<T, ZhipuError>;
