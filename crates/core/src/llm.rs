use std::{future::Future, pin::Pin};

use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a turn as the completion endpoint sees it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One `{role, content}` entry of the outbound history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user<S: Into<String>>(s: S) -> Self {
        Self {
            role: Role::User,
            content: s.into(),
        }
    }
    pub fn assistant<S: Into<String>>(s: S) -> Self {
        Self {
            role: Role::Assistant,
            content: s.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChatOpts {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatDelta {
    Text(String),
    Finish(Option<String>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("auth error: {0}")] Auth(String),
    #[error("rate limit: {0}")] RateLimit(String),
    #[error("timeout: {0}")] Timeout(String),
    #[error("network: {0}")] Network(String),
    #[error("decode: {0}")] Decode(String),
    #[error("protocol: {0}")] Protocol(String),
    #[error("config: {0}")] Config(String),
    #[error("other: {0}")] Other(String),
}

impl ChatError {
    /// Whether reopening the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Network(_) | ChatError::Timeout(_))
    }
}

pub type ChatStream<'a> = Pin<Box<dyn Stream<Item = Result<ChatDelta, ChatError>> + Send + 'a>>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A remote completion service that answers with a stream of text deltas.
///
/// The returned future resolves once the exchange is open (headers received);
/// the stream then yields deltas until the service closes it or fails.
pub trait ModelClient: Send + Sync {
    fn stream_chat<'a>(
        &'a self,
        msgs: Vec<Message>,
        opts: ChatOpts,
    ) -> BoxFuture<'a, Result<ChatStream<'a>, ChatError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let v = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(v, serde_json::json!({"role": "user", "content": "hi"}));
        let v = serde_json::to_value(Message::assistant("yo")).unwrap();
        assert_eq!(v["role"], "assistant");
    }

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(ChatError::Network("reset".into()).is_retryable());
        assert!(ChatError::Timeout("idle".into()).is_retryable());
        assert!(!ChatError::Auth("401".into()).is_retryable());
        assert!(!ChatError::Config("no key".into()).is_retryable());
    }
}
