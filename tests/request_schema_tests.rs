//! Wire-format tests: the JSON the client puts on the wire and accepts back
//! must match the provider's documented shapes exactly.

use serde_json::json;
use zhipu_llm::schemas::{ChatCompletionChunk, ToolChoice};
use zhipu_llm::{ChatCompletionRequest, ChatMessage, FinishReason, Role, Tool};

#[test]
fn request_omits_unset_fields() {
    let request = ChatCompletionRequest {
        messages: vec![ChatMessage::user("hi")],
        model: Some("glm-4".to_string()),
        ..Default::default()
    };
    let value = serde_json::to_value(&request).unwrap();

    assert_eq!(
        value,
        json!({
            "messages": [{"role": "user", "content": "hi"}],
            "model": "glm-4"
        })
    );
}

#[test]
fn request_serializes_sampling_and_tools() {
    let request = ChatCompletionRequest {
        messages: vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("weather?"),
        ],
        model: Some("glm-4".to_string()),
        temperature: Some(0.95),
        top_p: Some(0.7),
        do_sample: Some(true),
        max_tokens: Some(256),
        stop: Some(vec!["END".to_string()]),
        tools: Some(vec![Tool::function(
            "get_weather",
            Some("Current weather for a city".to_string()),
            Some(json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            })),
        )]),
        tool_choice: Some(ToolChoice::Mode("auto".to_string())),
        ..Default::default()
    };
    let value = serde_json::to_value(&request).unwrap();

    assert_eq!(value["temperature"], json!(0.95));
    assert_eq!(value["top_p"], json!(0.7));
    assert_eq!(value["do_sample"], json!(true));
    assert_eq!(value["stop"], json!(["END"]));
    assert_eq!(value["tool_choice"], json!("auto"));
    assert_eq!(value["tools"][0]["type"], json!("function"));
    assert_eq!(value["tools"][0]["function"]["name"], json!("get_weather"));
    assert_eq!(
        value["tools"][0]["function"]["parameters"]["required"],
        json!(["city"])
    );
}

#[test]
fn tool_message_carries_its_call_id() {
    let message = ChatMessage::tool("call_1", "{\"temp\": 21}");
    let value = serde_json::to_value(&message).unwrap();

    assert_eq!(
        value,
        json!({
            "role": "tool",
            "content": "{\"temp\": 21}",
            "tool_call_id": "call_1"
        })
    );
}

#[test]
fn specific_tool_choice_uses_tagged_form() {
    let choice = ToolChoice::Specific {
        tool_type: "function".to_string(),
        function: zhipu_llm::schemas::FunctionChoice {
            name: "get_weather".to_string(),
        },
    };
    let value = serde_json::to_value(&choice).unwrap();
    assert_eq!(
        value,
        json!({"type": "function", "function": {"name": "get_weather"}})
    );
}

#[test]
fn minimal_chunk_deserializes() {
    let chunk: ChatCompletionChunk =
        serde_json::from_str(r#"{"choices":[{"delta":{"content":"x"}}]}"#).unwrap();

    assert!(chunk.id.is_none());
    assert_eq!(chunk.choices.len(), 1);
    assert!(chunk.choices[0].index.is_none());
    assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("x"));
}

#[test]
fn chunk_without_choices_deserializes_empty() {
    let chunk: ChatCompletionChunk = serde_json::from_str(r#"{"id":"c1"}"#).unwrap();
    assert_eq!(chunk.id.as_deref(), Some("c1"));
    assert!(chunk.choices.is_empty());
}

#[test]
fn finish_reasons_cover_provider_vocabulary() {
    for (wire, reason) in [
        ("\"stop\"", FinishReason::Stop),
        ("\"tool_calls\"", FinishReason::ToolCalls),
        ("\"length\"", FinishReason::Length),
        ("\"sensitive\"", FinishReason::Sensitive),
        ("\"network_error\"", FinishReason::NetworkError),
    ] {
        let parsed: FinishReason = serde_json::from_str(wire).unwrap();
        assert_eq!(parsed, reason);
    }

    let unknown: FinishReason = serde_json::from_str("\"brand_new_reason\"").unwrap();
    assert_eq!(unknown, FinishReason::Other);
}

#[test]
fn roles_serialize_lowercase() {
    for (role, wire) in [
        (Role::System, "\"system\""),
        (Role::User, "\"user\""),
        (Role::Assistant, "\"assistant\""),
        (Role::Tool, "\"tool\""),
        (Role::Function, "\"function\""),
    ] {
        assert_eq!(serde_json::to_string(&role).unwrap(), wire);
    }
}
