//! # Stream Accumulator
//!
//! Drives the chunk merger across a full ordered chunk sequence, carrying
//! the merged state forward and emitting a running snapshot per chunk.
//!
//! One accumulator owns the state of exactly one stream. Chunks must be fed
//! in arrival order: the merge is order-dependent (content and argument
//! concatenation, id-delimited tool-call boundaries), so no parallel merging
//! happens within a stream. Independent streams each get their own
//! accumulator and share nothing.

use crate::{
    error::ZhipuError,
    schemas::{ChatCompletionChunk, FinishReason},
    streaming::merge::merge_chunk,
    Result,
};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Per-stream accumulation state.
///
/// `EMPTY` until the first chunk, accumulating afterwards, terminal once a
/// finish reason is observed. After the terminal state [`push`] rejects
/// further chunks with [`ZhipuError::StreamTerminated`] without touching the
/// last valid snapshot.
///
/// [`push`]: ChatCompletionAccumulator::push
#[derive(Debug, Default)]
pub struct ChatCompletionAccumulator {
    state: Option<ChatCompletionChunk>,
    terminated: bool,
}

impl ChatCompletionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the next chunk into the running state and return a snapshot of
    /// the accumulated completion.
    ///
    /// A protocol violation (more than one tool-call fragment in one chunk)
    /// terminates the accumulator: the error is fatal for this stream.
    pub fn push(&mut self, chunk: ChatCompletionChunk) -> Result<ChatCompletionChunk> {
        if self.terminated {
            return Err(ZhipuError::StreamTerminated);
        }

        let merged = match merge_chunk(self.state.take(), chunk) {
            Ok(merged) => merged,
            Err(err) => {
                self.terminated = true;
                return Err(err);
            }
        };

        if merged
            .choices
            .first()
            .and_then(|choice| choice.finish_reason)
            .is_some()
        {
            self.terminated = true;
        }
        self.state = Some(merged.clone());
        Ok(merged)
    }

    /// The last emitted snapshot, if any chunk has been accepted yet.
    pub fn snapshot(&self) -> Option<&ChatCompletionChunk> {
        self.state.as_ref()
    }

    /// True once a finish reason was observed or a protocol error occurred.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

/// Fold an ordered chunk stream into a stream of accumulated snapshots.
///
/// Snapshots come out in chunk arrival order, one per accepted chunk. Chunks
/// delivered after a terminal finish reason are logged and skipped rather
/// than surfaced: transports may duplicate delivery and that must never kill
/// an otherwise complete stream. Protocol violations are surfaced once and
/// end the stream. Cancelling `cancel` ends the stream at the next chunk
/// boundary; partial state is simply dropped.
pub fn accumulate<S>(
    chunks: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = Result<ChatCompletionChunk>> + Unpin,
{
    struct FoldState<S> {
        chunks: S,
        accumulator: ChatCompletionAccumulator,
        cancel: CancellationToken,
        done: bool,
    }

    futures_util::stream::unfold(
        FoldState {
            chunks,
            accumulator: ChatCompletionAccumulator::new(),
            cancel,
            done: false,
        },
        |mut state| async move {
            if state.done {
                return None;
            }
            loop {
                let next = tokio::select! {
                    _ = state.cancel.cancelled() => return None,
                    next = state.chunks.next() => next,
                };
                match next {
                    None => return None,
                    Some(Err(err)) => {
                        state.done = true;
                        return Some((Err(err), state));
                    }
                    Some(Ok(chunk)) => match state.accumulator.push(chunk) {
                        Ok(snapshot) => return Some((Ok(snapshot), state)),
                        Err(ZhipuError::StreamTerminated) => {
                            warn!("chunk arrived after terminal finish reason, ignoring");
                            continue;
                        }
                        Err(err) => {
                            state.done = true;
                            return Some((Err(err), state));
                        }
                    },
                }
            }
        },
    )
}

/// True if the snapshot's running choice carries tool calls, i.e. a tool
/// function call is streaming.
pub fn is_streaming_tool_function_call(chunk: &ChatCompletionChunk) -> bool {
    chunk
        .choices
        .first()
        .is_some_and(|choice| choice.delta.has_tool_calls())
}

/// True if the snapshot's finish reason says the stream ended with a tool
/// call request, i.e. the accumulated call is complete and ready to
/// dispatch.
pub fn is_streaming_tool_function_call_finish(chunk: &ChatCompletionChunk) -> bool {
    chunk
        .choices
        .first()
        .and_then(|choice| choice.finish_reason)
        == Some(FinishReason::ToolCalls)
}
