use crate::llm;

/// Session-scoped message identifier. Never reused within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Where a turn is in its lifecycle.
///
/// Only `Streaming` turns accept more text. `Failed` and `Cancelled` keep
/// whatever content had arrived and act as the transcript's error marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageState {
    Complete,
    Streaming,
    Failed(String),
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    state: MessageState,
}

impl Message {
    pub(crate) fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            state: MessageState::Complete,
        }
    }

    pub(crate) fn assistant_placeholder(id: MessageId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            state: MessageState::Streaming,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn state(&self) -> &MessageState {
        &self.state
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, MessageState::Streaming)
    }

    // Returns false (and leaves the text alone) once the turn is closed.
    pub(crate) fn extend(&mut self, fragment: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.content.push_str(fragment);
        true
    }

    pub(crate) fn finish(&mut self, state: MessageState) {
        if self.is_streaming() {
            self.state = state;
        }
    }

    pub(crate) fn to_wire(&self) -> llm::Message {
        llm::Message {
            role: match self.role {
                Role::User => llm::Role::User,
                Role::Assistant => llm::Role::Assistant,
            },
            content: self.content.clone(),
        }
    }
}
