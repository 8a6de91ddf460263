//! # ZhipuAI Client
//!
//! The single client type behind every API surface: chat completions
//! (blocking and streamed), embeddings, image generation, file management,
//! and fine-tuning jobs. One `ZhipuClient` per configuration; requests share
//! a pooled HTTP client and a bearer-auth header.
//!
//! Retry policy: non-streaming requests retry on 429/5xx/timeout with
//! exponential backoff and jitter, honoring `Retry-After`. Streaming
//! requests are issued exactly once; a dropped stream is re-established by
//! the caller, which restarts accumulation from scratch.

use crate::{
    config::{Config, DEFAULT_TEMPERATURE, DEFAULT_TOP_P},
    core::http_client::HttpClientBuilder,
    error::ZhipuError,
    schemas::{
        ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest,
        EmbeddingResponse, FileListResponse, FileObject, FineTuningJob, FineTuningJobList,
        FineTuningJobRequest, ImageGenerationRequest, ImageGenerationResponse,
    },
    Result,
};
use bytes::BytesMut;
use futures_util::Stream;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Path prefix all v4 endpoints share.
const API_PREFIX: &str = "/api/paas/v4";

/// Client for the ZhipuAI open platform API.
#[derive(Debug, Clone)]
pub struct ZhipuClient {
    client: Client,
    config: Config,
}

impl ZhipuClient {
    /// Create a client from configuration. Fails if the configuration does
    /// not validate or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(ZhipuError::BadRequest)?;
        let client = HttpClientBuilder::from_config(&config)
            .build()
            .map_err(|err| ZhipuError::Internal(err.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create a client for an API key with default configuration.
    pub fn from_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(Config::with_api_key(api_key))
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// The configured default model.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// True if an API key is configured.
    pub fn has_auth(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.config.base_url.trim_end_matches('/'),
            API_PREFIX,
            path
        )
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ZhipuError::BadRequest("no API key configured".to_string()))
    }

    // =========================================================================
    // Chat completions
    // =========================================================================

    /// Issue a blocking chat completion request.
    pub async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let request = self.prepare_chat_request(request, false);
        debug!(
            model = request.model.as_deref().unwrap_or_default(),
            message_count = request.messages.len(),
            "sending chat completion request"
        );
        self.post_json("/chat/completions", &request).await
    }

    /// Issue a streaming chat completion request and return the raw chunk
    /// stream, one [`ChatCompletionChunk`] per server-sent event.
    ///
    /// The stream is lazy and consumed exactly once, in arrival order. Feed
    /// it to [`crate::streaming::accumulate`] to obtain merged snapshots.
    pub async fn stream_chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<impl Stream<Item = Result<ChatCompletionChunk>> + Send + Unpin> {
        let request = self.prepare_chat_request(request, true);
        debug!(
            model = request.model.as_deref().unwrap_or_default(),
            message_count = request.messages.len(),
            "opening chat completion stream"
        );

        let response = self
            .client
            .post(self.endpoint("/chat/completions"))
            .bearer_auth(self.api_key()?)
            .timeout(Duration::from_secs(self.config.streaming_timeout))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(sse_chunk_stream(response))
    }

    /// Fill in defaults the API expects on every chat request.
    fn prepare_chat_request(
        &self,
        mut request: ChatCompletionRequest,
        stream: bool,
    ) -> ChatCompletionRequest {
        if request.model.is_none() {
            request.model = Some(self.config.model.clone());
        }
        if request.temperature.is_none() {
            request.temperature = Some(DEFAULT_TEMPERATURE);
        }
        if request.top_p.is_none() {
            request.top_p = Some(DEFAULT_TOP_P);
        }
        if request.request_id.is_none() {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|duration| duration.as_millis())
                .unwrap_or(0);
            request.request_id = Some(format!("zhipu-ai-chat-{}", millis));
        }
        request.stream = Some(stream);
        request
    }

    // =========================================================================
    // Embeddings
    // =========================================================================

    /// Compute an embedding vector for the given input.
    pub async fn embeddings(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        self.post_json("/embeddings", &request).await
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Generate images from a text prompt.
    pub async fn create_image(
        &self,
        request: ImageGenerationRequest,
    ) -> Result<ImageGenerationResponse> {
        self.post_json("/images/generations", &request).await
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Upload a file. Multipart uploads are not retried: the form body
    /// cannot be replayed.
    pub async fn upload_file(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
        purpose: impl Into<String>,
    ) -> Result<FileObject> {
        let form = multipart::Form::new()
            .text("purpose", purpose.into())
            .part("file", multipart::Part::bytes(bytes).file_name(filename.into()));

        let response = self
            .client
            .post(self.endpoint("/files"))
            .bearer_auth(self.api_key()?)
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// List uploaded files.
    pub async fn list_files(&self) -> Result<FileListResponse> {
        self.get_json("/files").await
    }

    // =========================================================================
    // Fine-tuning
    // =========================================================================

    /// Create a fine-tuning job.
    pub async fn create_fine_tuning_job(
        &self,
        request: FineTuningJobRequest,
    ) -> Result<FineTuningJob> {
        self.post_json("/fine_tuning/jobs", &request).await
    }

    /// List fine-tuning jobs.
    pub async fn list_fine_tuning_jobs(&self) -> Result<FineTuningJobList> {
        self.get_json("/fine_tuning/jobs").await
    }

    /// Retrieve one fine-tuning job by id.
    pub async fn retrieve_fine_tuning_job(&self, job_id: &str) -> Result<FineTuningJob> {
        self.get_json(&format!("/fine_tuning/jobs/{}", job_id)).await
    }

    // =========================================================================
    // Transport plumbing
    // =========================================================================

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let api_key = self.api_key()?.to_string();
        self.request_with_retries(|| {
            self.client
                .post(&url)
                .bearer_auth(&api_key)
                .json(body)
        })
        .await
    }

    async fn get_json<R>(&self, path: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let api_key = self.api_key()?.to_string();
        self.request_with_retries(|| self.client.get(&url).bearer_auth(&api_key))
            .await
    }

    /// Send a request, retrying 429/5xx/timeouts with exponential backoff
    /// and jitter. 4xx responses (other than 429) fail fast.
    async fn request_with_retries<F, R>(&self, build: F) -> Result<R>
    where
        F: Fn() -> reqwest::RequestBuilder,
        R: DeserializeOwned,
    {
        let mut last_error = None;

        for attempt in 1..=self.config.retry_attempts {
            let error = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Self::parse_response(response).await;
                    }
                    Self::error_from_response(response).await
                }
                Err(err) => ZhipuError::from(err),
            };

            match error {
                ZhipuError::RateLimited { retry_after } => {
                    if attempt < self.config.retry_attempts {
                        warn!(attempt, retry_after, "rate limited, backing off");
                        tokio::time::sleep(Duration::from_secs(retry_after)).await;
                    }
                    last_error = Some(ZhipuError::RateLimited { retry_after });
                }
                err @ (ZhipuError::Upstream(_) | ZhipuError::Timeout) => {
                    if attempt < self.config.retry_attempts {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(attempt, backoff_ms = backoff.as_millis() as u64, error = %err, "retrying request");
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(err);
                }
                err => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ZhipuError::Internal("retry loop exited without result".to_string())))
    }

    async fn parse_response<R: DeserializeOwned>(response: Response) -> Result<R> {
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(ZhipuError::from)
    }

    /// Turn a non-success response into the matching error, preferring the
    /// provider's structured error body when it parses.
    async fn error_from_response(response: Response) -> ZhipuError {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(1);
            return ZhipuError::RateLimited { retry_after };
        }

        let body = response.text().await.unwrap_or_default();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(error) = value.get("error") {
                return ZhipuError::Api {
                    code: error
                        .get("code")
                        .map(|code| code.to_string().trim_matches('"').to_string())
                        .unwrap_or_else(|| status.as_u16().to_string()),
                    message: error
                        .get("message")
                        .and_then(|message| message.as_str())
                        .unwrap_or("unknown error")
                        .to_string(),
                };
            }
        }

        if status.is_server_error() {
            ZhipuError::Upstream(format!("HTTP {}: {}", status.as_u16(), body))
        } else {
            ZhipuError::BadRequest(format!("HTTP {}: {}", status.as_u16(), body))
        }
    }

    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .retry_base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let jitter = fastrand::u64(0..=base / 10 + 1);
        Duration::from_millis((base + jitter).min(self.config.retry_max_delay_ms))
    }
}

/// Byte-level line buffer for an SSE body.
///
/// Lines are split on `\n` before any UTF-8 decoding, so a multi-byte
/// character falling on a network read boundary stays intact; decoding a
/// read-sized slice instead would mangle it into replacement characters.
struct SseLineBuffer {
    buffer: BytesMut,
}

impl SseLineBuffer {
    fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete line, trailing newline and `\r` stripped.
    fn next_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|&byte| byte == b'\n')?;
        let line = self.buffer.split_to(newline + 1);
        Some(String::from_utf8_lossy(&line).trim_end().to_string())
    }
}

/// Parse an SSE response body into a stream of [`ChatCompletionChunk`]s.
///
/// Frames are newline-delimited `data: <json>` lines; a `data: [DONE]`
/// sentinel or the connection closing ends the stream. Partial lines are
/// buffered across network reads, so a JSON object split over two reads
/// still parses as one event.
fn sse_chunk_stream(
    response: Response,
) -> impl Stream<Item = Result<ChatCompletionChunk>> + Send + Unpin {
    struct SseState {
        response: Response,
        lines: SseLineBuffer,
        pending: VecDeque<Result<ChatCompletionChunk>>,
        done: bool,
    }

    Box::pin(futures_util::stream::unfold(
        SseState {
            response,
            lines: SseLineBuffer::new(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }

                match state.response.chunk().await {
                    Ok(Some(bytes)) => {
                        state.lines.extend(&bytes);
                        while let Some(line) = state.lines.next_line() {
                            let Some(data) = line.strip_prefix("data:") else {
                                continue;
                            };
                            let data = data.trim_start();
                            if data == "[DONE]" {
                                state.done = true;
                                break;
                            }
                            if data.is_empty() {
                                continue;
                            }
                            state.pending.push_back(
                                serde_json::from_str(data).map_err(ZhipuError::from),
                            );
                        }
                    }
                    Ok(None) => state.done = true,
                    Err(err) => {
                        state.done = true;
                        state.pending.push_back(Err(ZhipuError::from(err)));
                    }
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ChatMessage;

    #[test]
    fn test_client_creation() {
        let client = ZhipuClient::new(Config::for_test()).unwrap();
        assert!(client.has_auth());
        assert_eq!(client.model(), "test-model");
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = Config {
            base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(ZhipuClient::new(config).is_err());
    }

    #[test]
    fn test_endpoint_joins_prefix() {
        let client = ZhipuClient::new(Config::for_test()).unwrap();
        assert_eq!(
            client.endpoint("/chat/completions"),
            "http://localhost:8000/api/paas/v4/chat/completions"
        );

        let mut config = Config::for_test();
        config.base_url = "http://localhost:8000/".to_string();
        let client = ZhipuClient::new(config).unwrap();
        assert_eq!(
            client.endpoint("/files"),
            "http://localhost:8000/api/paas/v4/files"
        );
    }

    #[test]
    fn test_prepare_chat_request_fills_defaults() {
        let client = ZhipuClient::new(Config::for_test()).unwrap();
        let request = ChatCompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            ..Default::default()
        };
        let prepared = client.prepare_chat_request(request, true);
        assert_eq!(prepared.model.as_deref(), Some("test-model"));
        assert_eq!(prepared.stream, Some(true));
        assert_eq!(prepared.temperature, Some(DEFAULT_TEMPERATURE));
        assert_eq!(prepared.top_p, Some(DEFAULT_TOP_P));
        assert!(prepared
            .request_id
            .as_deref()
            .unwrap()
            .starts_with("zhipu-ai-chat-"));
    }

    #[test]
    fn test_prepare_chat_request_keeps_explicit_values() {
        let client = ZhipuClient::new(Config::for_test()).unwrap();
        let request = ChatCompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            model: Some("glm-4-plus".to_string()),
            request_id: Some("my-request".to_string()),
            temperature: Some(0.2),
            top_p: Some(0.9),
            ..Default::default()
        };
        let prepared = client.prepare_chat_request(request, false);
        assert_eq!(prepared.model.as_deref(), Some("glm-4-plus"));
        assert_eq!(prepared.request_id.as_deref(), Some("my-request"));
        assert_eq!(prepared.stream, Some(false));
        assert_eq!(prepared.temperature, Some(0.2));
        assert_eq!(prepared.top_p, Some(0.9));
    }

    #[test]
    fn test_line_buffer_keeps_split_multibyte_chars_intact() {
        // "你" is three bytes; feeding it across two reads must not decode
        // the halves separately.
        let frame = "data: {\"content\":\"你好\"}\n".as_bytes();
        // `data: {"content":"` is 18 bytes, so 19 lands inside 你.
        let mut lines = SseLineBuffer::new();
        lines.extend(&frame[..19]);
        assert!(lines.next_line().is_none());
        lines.extend(&frame[19..]);
        assert_eq!(
            lines.next_line().as_deref(),
            Some("data: {\"content\":\"你好\"}")
        );
        assert!(lines.next_line().is_none());
    }

    #[test]
    fn test_line_buffer_splits_multiple_lines_per_read() {
        let mut lines = SseLineBuffer::new();
        lines.extend(b"data: a\r\ndata: b\npartial");
        assert_eq!(lines.next_line().as_deref(), Some("data: a"));
        assert_eq!(lines.next_line().as_deref(), Some("data: b"));
        assert!(lines.next_line().is_none());
        lines.extend(b"\n");
        assert_eq!(lines.next_line().as_deref(), Some("partial"));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut config = Config::for_test();
        config.retry_base_delay_ms = 100;
        config.retry_max_delay_ms = 500;
        let client = ZhipuClient::new(config).unwrap();

        let first = client.calculate_backoff(1);
        assert!(first >= Duration::from_millis(100));

        let capped = client.calculate_backoff(10);
        assert!(capped <= Duration::from_millis(500));
    }
}
