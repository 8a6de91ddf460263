//! # Chat Service Trait
//!
//! The seam callers program against when they want chat completions without
//! naming the concrete client. [`ZhipuClient`] is the one implementation
//! here; test doubles implement the trait against canned responses.

use crate::{
    client::ZhipuClient,
    schemas::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse},
    Result,
};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;

/// Boxed chunk stream returned by [`ChatService::stream_chat_completions`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// A provider-agnostic chat completion surface.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Short identifier for logging.
    fn name(&self) -> &str;

    /// Base URL requests are sent to.
    fn base_url(&self) -> &str;

    /// Default model used when a request names none.
    fn model_id(&self) -> &str;

    /// True when credentials are configured.
    fn has_auth(&self) -> bool;

    /// Issue a blocking chat completion request.
    async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse>;

    /// Issue a streaming chat completion request.
    async fn stream_chat_completions(&self, request: ChatCompletionRequest)
        -> Result<ChunkStream>;
}

#[async_trait]
impl ChatService for ZhipuClient {
    fn name(&self) -> &str {
        "zhipu"
    }

    fn base_url(&self) -> &str {
        ZhipuClient::base_url(self)
    }

    fn model_id(&self) -> &str {
        self.model()
    }

    fn has_auth(&self) -> bool {
        ZhipuClient::has_auth(self)
    }

    async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        ZhipuClient::chat_completions(self, request).await
    }

    async fn stream_chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChunkStream> {
        let stream = ZhipuClient::stream_chat_completions(self, request).await?;
        Ok(stream.boxed())
    }
}
