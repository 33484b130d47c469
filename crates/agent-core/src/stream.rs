//! Token Stream Multiplexer
//!
//! Bridges raw model deltas from the reasoning loop to a client-facing stream.
//!
//! ```text
//!  Agent ──StepMonitor──▶ [unbounded channel] ──▶ TokenStream ──▶ step frames
//!         (per model call)   Delta | StepEnd | Done
//! ```
//!
//! Each model invocation gets its own [`StepMonitor`], a two-state machine
//! (`Collecting` → `TerminalSeen`). When the invocation ends, the monitor
//! emits `Done` if a fragment of the terminal tool was seen and `StepEnd`
//! otherwise. The consumer ends its sequence on `Done` or when every
//! producer is gone.

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::provider::{StreamChunk, ToolCallDelta};
use crate::tool::FinalAnswer;

/// Unit pushed through the channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Raw model delta
    Delta(StreamChunk),
    /// A model invocation ended without calling the terminal tool
    StepEnd,
    /// The turn's output is complete
    Done,
}

/// Unit yielded to the consumer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamItem {
    Delta(StreamChunk),
    StepBoundary,
}

/// Producer side of the multiplexer, owned by one turn
#[derive(Debug)]
pub struct StreamHandler {
    tx: mpsc::UnboundedSender<StreamEvent>,
    terminal_tool: String,
}

impl StreamHandler {
    /// Create a connected producer/consumer pair
    pub fn channel(terminal_tool: impl Into<String>) -> (Self, TokenStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = Self {
            tx,
            terminal_tool: terminal_tool.into(),
        };
        (handler, TokenStream { rx, done: false })
    }

    /// Start watching a new model invocation
    pub const fn begin_step(&self) -> StepMonitor<'_> {
        StepMonitor {
            handler: self,
            state: StepState::Collecting,
            emitted: false,
            names: Vec::new(),
        }
    }

    /// Stream a synthetic terminal step carrying `answer`, then finish
    pub fn emit_answer(&self, answer: &FinalAnswer) {
        let arguments = serde_json::to_string(answer).unwrap_or_default();
        let opening = ToolCallDelta {
            index: 0,
            id: Some(format!("call_{}", uuid::Uuid::new_v4().simple())),
            name: Some(self.terminal_tool.clone()),
            arguments: Some(arguments),
        };
        self.send(StreamEvent::Delta(StreamChunk::tool_call(opening)));
        self.send(StreamEvent::Done);
    }

    fn send(&self, event: StreamEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Token stream consumer dropped");
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepState {
    Collecting,
    TerminalSeen,
}

/// Per-invocation termination detector
///
/// Consumed by [`StepMonitor::finish`] or [`StepMonitor::abort`], so state
/// can never leak into the next invocation.
#[derive(Debug)]
pub struct StepMonitor<'a> {
    handler: &'a StreamHandler,
    state: StepState,
    emitted: bool,
    /// Tool names of the calls opened so far, fragments concatenated
    names: Vec<String>,
}

impl StepMonitor<'_> {
    /// Forward one raw delta, watching for the terminal tool
    ///
    /// Names are accumulated per call the same way the assembler does, so a
    /// name split across fragments is still recognised.
    pub fn on_delta(&mut self, chunk: StreamChunk) {
        for delta in &chunk.tool_calls {
            let name = delta.name.as_deref().unwrap_or_default();
            if delta.id.as_deref().is_some_and(|id| !id.is_empty()) {
                self.names.push(name.to_string());
            } else if let Some(current) = self.names.last_mut() {
                current.push_str(name);
            }
        }
        if self.names.iter().any(|n| *n == self.handler.terminal_tool) {
            self.state = StepState::TerminalSeen;
        }
        self.emitted = true;
        self.handler.send(StreamEvent::Delta(chunk));
    }

    pub fn terminal_seen(&self) -> bool {
        self.state == StepState::TerminalSeen
    }

    /// The model stream ended normally. Returns whether the terminal tool was seen.
    pub fn finish(self) -> bool {
        let terminal = self.terminal_seen();
        self.handler.send(if terminal {
            StreamEvent::Done
        } else {
            StreamEvent::StepEnd
        });
        terminal
    }

    /// The model stream failed; close any step already opened on the wire
    pub fn abort(self) {
        if self.emitted {
            self.handler.send(StreamEvent::StepEnd);
        }
    }
}

/// Consumer side: a finite, single-pass stream of deltas and step boundaries
#[derive(Debug)]
pub struct TokenStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    done: bool,
}

impl TokenStream {
    /// Re-shape the stream into wire frames
    pub fn into_frames(self) -> impl Stream<Item = String> + Send {
        self.filter_map(|item| futures::future::ready(frame(&item)))
    }
}

impl Stream for TokenStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(StreamEvent::Delta(chunk))) => {
                Poll::Ready(Some(StreamItem::Delta(chunk)))
            }
            Poll::Ready(Some(StreamEvent::StepEnd)) => Poll::Ready(Some(StreamItem::StepBoundary)),
            Poll::Ready(Some(StreamEvent::Done) | None) => {
                self.done = true;
                self.rx.close();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Format one item as a step frame
///
/// A fragment naming a tool opens `<step><step_name>{name}</step_name>`,
/// argument text is passed through as-is and a boundary closes with `</step>`.
pub fn frame(item: &StreamItem) -> Option<String> {
    match item {
        StreamItem::StepBoundary => Some("</step>".into()),
        StreamItem::Delta(chunk) => {
            let mut out = String::new();
            for delta in &chunk.tool_calls {
                if let Some(name) = delta.name.as_deref().filter(|n| !n.is_empty()) {
                    out.push_str("<step><step_name>");
                    out.push_str(name);
                    out.push_str("</step_name>");
                }
                if let Some(args) = delta.arguments.as_deref() {
                    out.push_str(args);
                }
            }
            (!out.is_empty()).then_some(out)
        }
    }
}
