//! Chat state store and the send / stream / archive cycle.
//!
//! The store never touches the network itself. Starting a turn returns a
//! [`TurnRequest`] for the network driver; the driver reports back through
//! [`StreamEvent`]s which the owner feeds into [`ChatSession::apply`] one at a
//! time, in order. Events are tagged with the [`TurnId`] they belong to so
//! anything still queued from a stopped or cleared turn is dropped.

use bytes::Bytes;
use tokio::task::AbortHandle;

use crate::decode::StreamDecoder;
use crate::error::ChatError;
use crate::message::{ChatMessage, ChatRole, ErrorMessage};
use crate::normalize::{outgoing_history, UpstreamMessage};

pub const DEFAULT_MAX_HISTORY: usize = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(u64);

/// What the network driver needs to issue one request
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub id: TurnId,
    pub messages: Vec<UpstreamMessage>,
    /// Text of the latest outgoing message, covered by the signature
    pub latest: String,
}

/// Progress reported by the network driver
#[derive(Debug)]
pub enum StreamEvent {
    Chunk(Bytes),
    End,
    Failed(ChatError),
}

/// Effect of applying a [`StreamEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    /// Event belonged to a turn that is no longer active
    Ignored,
    /// Decoded text was added to the draft
    Appended(String),
    /// Chunk produced no visible text (held-back bytes or a dropped blank line)
    Skipped,
    /// Turn is over; `tail` is text flushed from the decoder at end of stream
    Finished { tail: String },
}

#[derive(Debug)]
struct ActiveTurn {
    id: TurnId,
    decoder: StreamDecoder,
    abort: Option<AbortHandle>,
}

#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    draft: String,
    error: Option<ErrorMessage>,
    active: Option<ActiveTurn>,
    next_turn: u64,
    max_history: usize,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ChatSession {
    pub fn new(max_history: usize) -> Self {
        Self {
            messages: Vec::new(),
            draft: String::new(),
            error: None,
            active: None,
            next_turn: 0,
            max_history,
        }
    }

    /// Replace the history with one loaded from storage
    pub fn restore(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn error(&self) -> Option<&ErrorMessage> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_turn(&self) -> Option<TurnId> {
        self.active.as_ref().map(|turn| turn.id)
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Append a user message and start a turn for it
    pub fn send(&mut self, text: &str) -> Result<TurnRequest, ChatError> {
        if text.is_empty() {
            return Err(ChatError::EmptyInput);
        }
        if self.is_loading() {
            return Err(ChatError::Busy);
        }

        self.messages.push(ChatMessage::user(text));
        Ok(self.begin_turn())
    }

    /// Drop a trailing assistant reply and ask again with the remaining history.
    ///
    /// Returns `Ok(None)` when there is no history to retry.
    pub fn retry(&mut self) -> Result<Option<TurnRequest>, ChatError> {
        if self.is_loading() {
            return Err(ChatError::Busy);
        }
        match self.messages.last() {
            None => return Ok(None),
            Some(last) if last.role == ChatRole::Assistant => {
                self.messages.pop();
            }
            Some(_) => {}
        }
        Ok(Some(self.begin_turn()))
    }

    /// Register the cancellation handle of the task driving `id`
    pub fn attach(&mut self, id: TurnId, abort: AbortHandle) {
        match self.active.as_mut() {
            Some(turn) if turn.id == id => turn.abort = Some(abort),
            // Turn already ended before the task was registered
            _ => abort.abort(),
        }
    }

    pub fn apply(&mut self, id: TurnId, event: StreamEvent) -> TurnUpdate {
        let Some(turn) = self.active.as_mut().filter(|turn| turn.id == id) else {
            return TurnUpdate::Ignored;
        };

        match event {
            StreamEvent::Chunk(bytes) => {
                let text = turn.decoder.decode(&bytes);
                if text.is_empty() || (text == "\n" && self.draft.ends_with('\n')) {
                    return TurnUpdate::Skipped;
                }
                self.draft.push_str(&text);
                TurnUpdate::Appended(text)
            }
            StreamEvent::End => {
                let tail = turn.decoder.finish();
                self.draft.push_str(&tail);
                tracing::debug!(turn = id.0, len = self.draft.len(), "stream finished");
                self.finish_turn();
                TurnUpdate::Finished { tail }
            }
            StreamEvent::Failed(err) => {
                match err {
                    ChatError::Upstream(payload) => {
                        tracing::error!(turn = id.0, error = %payload, "generation endpoint returned an error");
                        self.error = Some(payload);
                    }
                    other => {
                        tracing::error!(turn = id.0, error = %other, "request failed");
                    }
                }
                self.finish_turn();
                TurnUpdate::Finished { tail: String::new() }
            }
        }
    }

    /// Abort the in-flight request and keep its partial reply.
    ///
    /// Returns `false` when nothing was in flight.
    pub fn stop(&mut self) -> bool {
        let Some(turn) = self.active.as_ref() else {
            return false;
        };
        tracing::debug!(turn = turn.id.0, len = self.draft.len(), "stopping turn");
        self.finish_turn();
        true
    }

    /// Forget the whole conversation, including any in-flight turn
    pub fn clear(&mut self) {
        if let Some(turn) = self.active.take() {
            if let Some(abort) = turn.abort {
                abort.abort();
            }
        }
        self.messages.clear();
        self.draft.clear();
        self.error = None;
    }

    fn begin_turn(&mut self) -> TurnRequest {
        let id = TurnId(self.next_turn);
        self.next_turn += 1;

        self.draft.clear();
        self.error = None;
        self.active = Some(ActiveTurn {
            id,
            decoder: StreamDecoder::new(),
            abort: None,
        });

        let (messages, latest) = outgoing_history(&self.messages, self.max_history);
        tracing::debug!(turn = id.0, sent = messages.len(), stored = self.messages.len(), "starting turn");

        TurnRequest { id, messages, latest }
    }

    fn finish_turn(&mut self) {
        if let Some(turn) = self.active.take() {
            if let Some(abort) = turn.abort {
                abort.abort();
            }
        }
        self.archive();
    }

    fn archive(&mut self) {
        if !self.draft.is_empty() {
            let content = std::mem::take(&mut self.draft);
            self.messages.push(ChatMessage::assistant(content));
        }
    }
}
