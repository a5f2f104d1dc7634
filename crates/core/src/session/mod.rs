//! Conversation state for one chat session.
//!
//! [`Session`] is the message store plus the submission state machine. The UI
//! thread owns it; the network side only ever reaches it through
//! [`Session::ingest`] with events produced by [`drive`].

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::llm;

mod exchange;
mod ingest;
mod message;

pub use exchange::{drive, ExchangeOptions, ExchangeTicket};
pub use ingest::{ExchangeEvent, ExchangeEventKind, IngestError, Ingested};
pub use message::{Message, MessageId, MessageState, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    AwaitingResponse,
}

/// Identifies one request/stream interaction. Fresh for every submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExchangeId(pub u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A committed mutation, recorded for observers in commit order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Appended(MessageId),
    Extended(MessageId),
    Finalized(MessageId),
    Status(Status),
    Draft,
}

impl Change {
    pub fn touches_transcript(&self) -> bool {
        matches!(
            self,
            Change::Appended(_) | Change::Extended(_) | Change::Finalized(_)
        )
    }
}

struct OpenExchange {
    id: ExchangeId,
    target: MessageId,
    next_seq: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct Session {
    messages: Vec<Message>,
    draft: String,
    status: Status,
    next_message: u64,
    next_exchange: u64,
    open: Option<OpenExchange>,
    changes: Vec<Change>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_busy(&self) -> bool {
        self.status == Status::AwaitingResponse
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replaces the compose text.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.draft {
            self.draft = text;
            self.changes.push(Change::Draft);
        }
    }

    /// Seeds the draft from a sample prompt. Only allowed on an empty transcript.
    pub fn seed_draft(&mut self, prompt: &str) -> bool {
        if !self.messages.is_empty() {
            debug!(target: "session", "prompt seed ignored: transcript not empty");
            return false;
        }
        self.set_draft(prompt);
        true
    }

    /// Appends a user turn and opens an exchange for it.
    ///
    /// Returns `None` without touching any state when `text` is blank or an
    /// exchange is already in flight.
    pub fn submit(&mut self, text: &str) -> Option<ExchangeTicket> {
        if text.trim().is_empty() {
            debug!(target: "session", "submit skipped: blank input");
            return None;
        }
        if self.status != Status::Idle {
            debug!(target: "session", "submit skipped: awaiting response");
            return None;
        }

        let user = self.alloc_id();
        self.messages.push(Message::user(user, text));
        self.changes.push(Change::Appended(user));
        self.draft.clear();
        self.changes.push(Change::Draft);
        let history = self.history();

        self.status = Status::AwaitingResponse;
        self.changes.push(Change::Status(self.status));

        let target = self.alloc_id();
        self.messages.push(Message::assistant_placeholder(target));
        self.changes.push(Change::Appended(target));

        let id = ExchangeId(self.next_exchange);
        self.next_exchange += 1;
        let cancel = CancellationToken::new();
        self.open = Some(OpenExchange {
            id,
            target,
            next_seq: 0,
            cancel: cancel.clone(),
        });
        info!(target: "session", "exchange {} opened: turns={} input_len={}", id, history.len(), text.len());
        Some(ExchangeTicket::new(id, history, cancel))
    }

    /// Submits the current draft through the same path as [`Session::submit`].
    pub fn submit_draft(&mut self) -> Option<ExchangeTicket> {
        let text = self.draft.clone();
        self.submit(&text)
    }

    /// Stops the in-flight exchange, keeping whatever text already arrived.
    pub fn cancel_exchange(&mut self) -> bool {
        if self.open.is_none() {
            return false;
        }
        self.close(MessageState::Cancelled);
        true
    }

    /// Called when the view owning the session goes away.
    pub fn teardown(&mut self) {
        if self.cancel_exchange() {
            info!(target: "session", "teardown canceled the open exchange");
        }
    }

    pub fn drain_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    /// Ordered wire history: every turn except assistant turns with no text.
    pub fn history(&self) -> Vec<llm::Message> {
        self.messages
            .iter()
            .filter(|m| !(m.role() == Role::Assistant && m.content().trim().is_empty()))
            .map(Message::to_wire)
            .collect()
    }

    fn alloc_id(&mut self) -> MessageId {
        let id = MessageId(self.next_message);
        self.next_message += 1;
        id
    }

    // Ends the open exchange: finalizes its turn and returns to idle.
    fn close(&mut self, state: MessageState) {
        let Some(open) = self.open.take() else {
            return;
        };
        open.cancel.cancel();
        if let Some(msg) = self.messages.iter_mut().rev().find(|m| m.id() == open.target) {
            msg.finish(state);
        }
        self.changes.push(Change::Finalized(open.target));
        self.status = Status::Idle;
        self.changes.push(Change::Status(self.status));
        debug!(target: "session", "exchange {} closed", open.id);
    }
}
