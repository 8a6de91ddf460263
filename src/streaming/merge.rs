//! # Chunk Merger
//!
//! Pure merge of two adjacent streaming fragments into one combined
//! fragment. The accumulator folds this across a whole chunk sequence; each
//! call here only ever looks at `previous` (merged so far) and `current`
//! (newly arrived).
//!
//! Merge rules:
//! - chunk metadata (id, created, model, request_id, object) keeps the most
//!   recent non-null value;
//! - message `content` concatenates across fragments;
//! - `role` and `name` keep the most recent non-null value, with the role
//!   defaulting to assistant;
//! - tool-call fragments accumulate onto the single open call until a new
//!   `id` closes it and opens the next one.
//!
//! Inputs are taken by value and never mutated in place; the same inputs
//! always produce the same output (id synthesis aside).

use crate::{
    error::ZhipuError,
    schemas::{ChatCompletionChunk, ChatMessage, ChunkChoice, FunctionCall, Role, ToolCall},
    Result,
};
use uuid::Uuid;

/// Merge the previous accumulated chunk and the newly arrived one into a
/// single chunk carrying the running choice.
///
/// With no previous state the current chunk is returned as-is, except that a
/// tool call arriving without an `id` gets a synthesized one: accumulation
/// needs an id to delimit the open call.
pub fn merge_chunk(
    previous: Option<ChatCompletionChunk>,
    mut current: ChatCompletionChunk,
) -> Result<ChatCompletionChunk> {
    // Only choices[0] is significant; extra parallel candidates are dropped.
    let current_choice = if current.choices.is_empty() {
        None
    } else {
        Some(current.choices.swap_remove(0))
    };

    let Some(mut previous) = previous else {
        current.choices = current_choice.map(normalize_opening_choice).into_iter().collect();
        return Ok(current);
    };

    let previous_choice = if previous.choices.is_empty() {
        None
    } else {
        Some(previous.choices.swap_remove(0))
    };
    let choice = merge_choice(previous_choice, current_choice)?;

    // Most recent non-null value wins for every metadata field.
    Ok(ChatCompletionChunk {
        id: current.id.or(previous.id),
        object: current.object.or(previous.object),
        created: current.created.or(previous.created),
        model: current.model.or(previous.model),
        request_id: current.request_id.or(previous.request_id),
        usage: current.usage.or(previous.usage),
        choices: choice.into_iter().collect(),
    })
}

fn merge_choice(
    previous: Option<ChunkChoice>,
    current: Option<ChunkChoice>,
) -> Result<Option<ChunkChoice>> {
    match (previous, current) {
        (None, None) => Ok(None),
        (Some(previous), None) => Ok(Some(previous)),
        (None, Some(current)) => Ok(Some(normalize_opening_choice(current))),
        (Some(previous), Some(current)) => Ok(Some(ChunkChoice {
            index: current.index.or(previous.index),
            finish_reason: current.finish_reason.or(previous.finish_reason),
            delta: merge_delta(previous.delta, current.delta)?,
        })),
    }
}

/// Combine two partial messages per the accumulation rules.
fn merge_delta(previous: ChatMessage, current: ChatMessage) -> Result<ChatMessage> {
    let content = match (previous.content, current.content) {
        (Some(mut accumulated), Some(fragment)) => {
            accumulated.push_str(&fragment);
            Some(accumulated)
        }
        (accumulated, fragment) => fragment.or(accumulated),
    };

    let role = current
        .role
        .or(previous.role)
        .or(Some(Role::Assistant));

    Ok(ChatMessage {
        content,
        role,
        name: current.name.or(previous.name),
        tool_call_id: current.tool_call_id.or(previous.tool_call_id),
        tool_calls: merge_tool_calls(previous.tool_calls, current.tool_calls)?,
    })
}

/// Fold the current chunk's tool-call fragment onto the accumulated list.
///
/// The last element of the accumulated list is the open call; all earlier
/// elements are closed and pass through untouched. A fragment with an `id`
/// closes the open call and starts a new one; a fragment without an `id`
/// extends the open call's name/arguments.
fn merge_tool_calls(
    previous: Option<Vec<ToolCall>>,
    current: Option<Vec<ToolCall>>,
) -> Result<Option<Vec<ToolCall>>> {
    let mut merged = Vec::new();
    let mut open = None;
    if let Some(mut accumulated) = previous {
        open = accumulated.pop();
        merged.append(&mut accumulated);
    }

    match current {
        None => {
            if let Some(open) = open {
                merged.push(open);
            }
        }
        Some(mut fragments) => {
            if fragments.len() > 1 {
                return Err(ZhipuError::Protocol(format!(
                    "chunk carried {} simultaneous tool-call fragments, only one is supported",
                    fragments.len()
                )));
            }
            match fragments.pop() {
                None => {
                    if let Some(open) = open {
                        merged.push(open);
                    }
                }
                Some(fragment) if fragment.id.is_some() => {
                    // A fresh id closes the open call and starts the next.
                    if let Some(open) = open {
                        merged.push(open);
                    }
                    merged.push(fragment);
                }
                Some(fragment) => merged.push(merge_tool_call(open, fragment)),
            }
        }
    }

    Ok(if merged.is_empty() { None } else { Some(merged) })
}

fn merge_tool_call(previous: Option<ToolCall>, current: ToolCall) -> ToolCall {
    let Some(previous) = previous else {
        return current;
    };
    ToolCall {
        id: current.id.or(previous.id),
        tool_type: current.tool_type.or(previous.tool_type),
        function: merge_function(previous.function, current.function),
    }
}

/// Argument fragments accumulate by concatenation, never replacement.
fn merge_function(
    previous: Option<FunctionCall>,
    current: Option<FunctionCall>,
) -> Option<FunctionCall> {
    match (previous, current) {
        (None, current) => current,
        (previous, None) => previous,
        (Some(previous), Some(current)) => {
            let arguments = match (previous.arguments, current.arguments) {
                (Some(mut accumulated), Some(fragment)) => {
                    accumulated.push_str(&fragment);
                    Some(accumulated)
                }
                (accumulated, fragment) => fragment.or(accumulated),
            };
            Some(FunctionCall {
                name: current.name.or(previous.name),
                arguments,
            })
        }
    }
}

/// Normalize the very first choice of a stream: a tool call must carry an id
/// once accumulation begins, so an id-less opening fragment gets a
/// synthesized one and its delta is tagged assistant.
fn normalize_opening_choice(mut choice: ChunkChoice) -> ChunkChoice {
    let Some(calls) = choice.delta.tool_calls.as_mut() else {
        return choice;
    };
    if calls.is_empty() || calls.iter().any(|call| call.id.is_some()) {
        return choice;
    }

    let synthesized = Uuid::new_v4().to_string();
    for call in calls.iter_mut() {
        call.id = Some(synthesized.clone());
        call.tool_type.get_or_insert_with(|| "function".to_string());
    }
    if choice.delta.role.is_none() {
        choice.delta.role = Some(Role::Assistant);
    }
    choice
}
