//! # Schemas Module
//!
//! Wire data structures for the ZhipuAI v4 open platform API: chat
//! completions (blocking and streamed), embeddings, image generation, file
//! upload, and fine-tuning jobs.
//!
//! Streamed chat completions arrive as [`ChatCompletionChunk`] values whose
//! [`ChatMessage`] deltas are only partially formed; the `streaming` module
//! merges them back into complete messages.

use serde::{Deserialize, Serialize};

/// The speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Function,
}

/// # Chat Message
///
/// One logical message in a conversation. During streaming the same type
/// doubles as a delta: any field may be absent on a given chunk and is
/// filled in by the accumulator as fragments arrive.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatMessage {
    /// Speaker role; absent on continuation deltas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Text content, or a content fragment when streamed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Participant name (used for tool/function response messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls requested by the assistant, in emission order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool call this message responds to (tool role messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// # Tool Call
///
/// A structured request from the model to invoke a named function. When
/// streamed, only the fragment that opens the call carries an `id`; later
/// fragments extend `function.arguments`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolCall {
    /// Present only on the fragment that introduces the call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool type, "function" for every tool the API currently supports
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<String>,
    /// Function name and argument fragments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCall>,
}

/// A function name plus its JSON-argument string, either complete or as a
/// partial fragment that concatenates across chunks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FunctionCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Sensitive,
    NetworkError,
    #[serde(other)]
    Other,
}

/// # Chat Completion Request
///
/// Request body for `/chat/completions`. The sampling knobs are inert
/// configuration passed through to the provider unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    /// Conversation history, oldest first
    pub messages: Vec<ChatMessage>,
    /// Model identifier (e.g. "glm-4")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Client-chosen request id echoed back by the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Whether to stream the response over Server-Sent Events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Whether to sample at all (false selects greedy decoding)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// End-user identifier for abuse tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Tools the model may call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Tool choice policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// Non-streaming chat completion response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single completion choice of a non-streaming response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// # Chat Completion Chunk (SSE Format)
///
/// One partial unit of a streamed chat completion, corresponding to one
/// server-sent event. Every field is optional on the wire; the accumulator
/// carries forward the most recent non-null value of each.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatCompletionChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Object type, "chat.completion.chunk" when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Parallel candidates; only `choices[0]` is significant
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Token usage, only on the final chunk when the provider sends it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// One choice of a streaming chunk: a partial message delta plus the finish
/// reason once generation stops.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChunkChoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default)]
    pub delta: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// # Tool Definition
///
/// Declares a function the model may call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

/// JSON-Schema description of a callable function.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Controls which tool the model should use.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// "auto" / "none" / "required"
    Mode(String),
    /// A specific function by name
    Specific {
        #[serde(rename = "type")]
        tool_type: String,
        function: FunctionChoice,
    },
}

/// Specific function choice for [`ToolChoice::Specific`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionChoice {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Request body for `/embeddings`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: String,
}

/// Response body for `/embeddings`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingResponse {
    pub model: String,
    pub object: String,
    pub data: Vec<Embedding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// One embedding vector.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Embedding {
    pub index: u32,
    pub object: String,
    pub embedding: Vec<f32>,
}

// ---------------------------------------------------------------------------
// Image generation
// ---------------------------------------------------------------------------

/// Default image generation model.
pub const DEFAULT_IMAGE_MODEL: &str = "cogview-3";

/// Request body for `/images/generations`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ImageGenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_IMAGE_MODEL.to_string(),
            prompt: prompt.into(),
            user: None,
        }
    }
}

/// Response body for `/images/generations`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageGenerationResponse {
    pub created: i64,
    pub data: Vec<GeneratedImage>,
}

/// One generated image, referenced by URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratedImage {
    pub url: String,
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Purpose tag for uploaded files; fine-tuning data uses "fine-tune".
pub const FILE_PURPOSE_FINE_TUNE: &str = "fine-tune";

/// One uploaded file as reported by `/files`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileObject {
    pub id: String,
    pub object: String,
    pub bytes: u64,
    pub created_at: i64,
    pub filename: String,
    pub purpose: String,
}

/// Response body for listing `/files`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileListResponse {
    pub object: String,
    pub data: Vec<FileObject>,
}

// ---------------------------------------------------------------------------
// Fine-tuning
// ---------------------------------------------------------------------------

/// Request body for creating a `/fine_tuning/jobs` job.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FineTuningJobRequest {
    pub model: String,
    pub training_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// One fine-tuning job.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FineTuningJob {
    pub id: String,
    pub object: String,
    pub model: String,
    pub created_at: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fine_tuned_model: Option<String>,
    pub training_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_file: Option<String>,
}

/// Response body for listing `/fine_tuning/jobs`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FineTuningJobList {
    pub object: String,
    pub data: Vec<FineTuningJob>,
}

// ---------------------------------------------------------------------------
// Constructor helpers
// ---------------------------------------------------------------------------

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Some(Role::System),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Create an assistant message. Content is optional because pure
    /// tool-call messages carry none.
    pub fn assistant(content: Option<String>) -> Self {
        Self {
            role: Some(Role::Assistant),
            content,
            ..Default::default()
        }
    }

    /// Create a tool response message carrying the result of a tool call.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Tool),
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        }
    }

    /// Attach tool calls to this message.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// True if this message carries at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

impl ToolCall {
    /// Create a complete tool call with the given id, name, and arguments.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            tool_type: Some("function".to_string()),
            function: Some(FunctionCall {
                name: Some(name.into()),
                arguments: Some(arguments.into()),
            }),
        }
    }
}

impl Tool {
    /// Declare a function tool from its name, description, and JSON-Schema
    /// parameter description.
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: Option<serde_json::Value>,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description,
                parameters,
            },
        }
    }
}

impl FunctionCall {
    /// Parse the accumulated `arguments` string as JSON.
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(self.arguments.as_deref().unwrap_or("null"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), json!("assistant"));
        assert_eq!(
            serde_json::from_value::<Role>(json!("tool")).unwrap(),
            Role::Tool
        );
    }

    #[test]
    fn test_finish_reason_wire_names() {
        assert_eq!(
            serde_json::to_value(FinishReason::ToolCalls).unwrap(),
            json!("tool_calls")
        );
        assert_eq!(
            serde_json::from_value::<FinishReason>(json!("network_error")).unwrap(),
            FinishReason::NetworkError
        );
        // Unknown reasons must not fail deserialization
        assert_eq!(
            serde_json::from_value::<FinishReason>(json!("something_new")).unwrap(),
            FinishReason::Other
        );
    }

    #[test]
    fn test_request_skips_absent_fields() {
        let request = ChatCompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            model: Some("glm-4".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], json!("glm-4"));
        assert!(value.get("temperature").is_none());
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_chunk_deserializes_with_missing_fields() {
        let chunk: ChatCompletionChunk = serde_json::from_value(json!({
            "choices": [{"delta": {"content": "Hel"}}]
        }))
        .unwrap();
        assert!(chunk.id.is_none());
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_tool_call_round_trip() {
        let call = ToolCall::new("call_1", "get_weather", "{\"city\":\"Beijing\"}");
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["type"], json!("function"));
        let back: ToolCall = serde_json::from_value(value).unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn test_message_helpers() {
        let msg = ChatMessage::tool("call_9", "72F and sunny");
        assert_eq!(msg.role, Some(Role::Tool));
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));

        let msg = ChatMessage::assistant(None)
            .with_tool_calls(vec![ToolCall::new("call_1", "lookup", "{}")]);
        assert!(msg.has_tool_calls());
    }
}
