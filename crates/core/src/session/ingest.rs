use thiserror::Error;
use tracing::{debug, warn};

use super::{Change, ExchangeId, MessageState, Session};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeEventKind {
    /// Text delta numbered from zero in arrival order.
    Fragment { seq: u64, text: String },
    Completed,
    Failed(String),
}

/// One event from the network side, addressed to a specific exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeEvent {
    pub exchange: ExchangeId,
    pub kind: ExchangeEventKind,
}

impl ExchangeEvent {
    pub fn fragment(exchange: ExchangeId, seq: u64, text: impl Into<String>) -> Self {
        Self {
            exchange,
            kind: ExchangeEventKind::Fragment {
                seq,
                text: text.into(),
            },
        }
    }

    pub fn completed(exchange: ExchangeId) -> Self {
        Self {
            exchange,
            kind: ExchangeEventKind::Completed,
        }
    }

    pub fn failed(exchange: ExchangeId, reason: impl Into<String>) -> Self {
        Self {
            exchange,
            kind: ExchangeEventKind::Failed(reason.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ingested {
    Extended,
    Completed,
    Failed,
}

/// Why an event was not applied. None of these leave the session busy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("exchange {0} is not open")]
    Stale(ExchangeId),
    #[error("exchange {0} was canceled")]
    Cancelled(ExchangeId),
    #[error("fragment out of order: expected #{expected}, got #{got}")]
    OrderViolation { expected: u64, got: u64 },
}

pub(crate) const ORDER_VIOLATION_REASON: &str = "fragment out of order";

impl Session {
    /// Folds one exchange event into the open assistant turn.
    pub fn ingest(&mut self, event: ExchangeEvent) -> Result<Ingested, IngestError> {
        let (target, expected) = match &self.open {
            Some(open) if open.id == event.exchange => {
                if open.cancel.is_cancelled() {
                    // Canceled from outside the session: close out, apply nothing.
                    self.close(MessageState::Cancelled);
                    return Err(IngestError::Cancelled(event.exchange));
                }
                (open.target, open.next_seq)
            }
            _ => {
                debug!(target: "session", "dropping event for stale exchange {}", event.exchange);
                return Err(IngestError::Stale(event.exchange));
            }
        };

        match event.kind {
            ExchangeEventKind::Fragment { seq, text } => {
                if seq != expected {
                    warn!(target: "session", "exchange {}: fragment #{} arrived, expected #{}", event.exchange, seq, expected);
                    self.close(MessageState::Failed(ORDER_VIOLATION_REASON.to_string()));
                    return Err(IngestError::OrderViolation { expected, got: seq });
                }
                if let Some(open) = self.open.as_mut() {
                    open.next_seq += 1;
                }
                if let Some(msg) = self.messages.last_mut().filter(|m| m.id() == target) {
                    msg.extend(&text);
                }
                self.changes.push(Change::Extended(target));
                Ok(Ingested::Extended)
            }
            ExchangeEventKind::Completed => {
                self.close(MessageState::Complete);
                Ok(Ingested::Completed)
            }
            ExchangeEventKind::Failed(reason) => {
                warn!(target: "session", "exchange {} failed: {}", event.exchange, reason);
                self.close(MessageState::Failed(reason));
                Ok(Ingested::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Role, Status};

    fn started(text: &str) -> (Session, ExchangeId) {
        let mut s = Session::new();
        let t = s.submit(text).expect("ticket");
        (s, t.id())
    }

    fn feed(s: &mut Session, id: ExchangeId, frags: &[&str]) {
        for (i, f) in frags.iter().enumerate() {
            assert_eq!(
                s.ingest(ExchangeEvent::fragment(id, i as u64, *f)),
                Ok(Ingested::Extended)
            );
        }
    }

    #[test]
    fn fragments_concatenate_in_order() {
        let (mut s, id) = started("Hello");
        feed(&mut s, id, &["Hi", " there", "", ", friend."]);
        s.ingest(ExchangeEvent::completed(id)).unwrap();

        let msgs = s.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role(), Role::User);
        assert_eq!(msgs[0].content(), "Hello");
        assert_eq!(msgs[1].role(), Role::Assistant);
        assert_eq!(msgs[1].content(), "Hi there, friend.");
        assert_eq!(msgs[1].state(), &MessageState::Complete);
        assert_eq!(s.status(), Status::Idle);
    }

    #[test]
    fn every_terminal_outcome_returns_to_idle() {
        let outcomes: Vec<Box<dyn Fn(&mut Session, ExchangeId)>> = vec![
            Box::new(|s: &mut Session, id: ExchangeId| {
                s.ingest(ExchangeEvent::completed(id)).unwrap();
            }),
            Box::new(|s: &mut Session, id: ExchangeId| {
                s.ingest(ExchangeEvent::failed(id, "503")).unwrap();
            }),
            Box::new(|s: &mut Session, id: ExchangeId| {
                let _ = s.ingest(ExchangeEvent::fragment(id, 7, "x"));
            }),
            Box::new(|s: &mut Session, _: ExchangeId| {
                s.cancel_exchange();
            }),
        ];
        for outcome in outcomes {
            let (mut s, id) = started("q");
            feed(&mut s, id, &["a"]);
            outcome(&mut s, id);
            assert_eq!(s.status(), Status::Idle);
            assert!(!s.messages()[1].is_streaming());
            assert!(s.submit("next").is_some(), "session stays usable");
        }
    }

    #[test]
    fn terminal_event_applies_once() {
        let (mut s, id) = started("q");
        s.ingest(ExchangeEvent::completed(id)).unwrap();
        s.drain_changes();
        assert_eq!(
            s.ingest(ExchangeEvent::completed(id)),
            Err(IngestError::Stale(id))
        );
        assert_eq!(
            s.ingest(ExchangeEvent::failed(id, "late")),
            Err(IngestError::Stale(id))
        );
        assert!(s.drain_changes().is_empty());
        assert_eq!(s.messages()[1].state(), &MessageState::Complete);
    }

    #[test]
    fn failure_keeps_partial_text_with_marker() {
        let (mut s, id) = started("q");
        feed(&mut s, id, &["par", "tial"]);
        assert_eq!(
            s.ingest(ExchangeEvent::failed(id, "network: reset")),
            Ok(Ingested::Failed)
        );
        let m = &s.messages()[1];
        assert_eq!(m.content(), "partial");
        assert_eq!(m.state(), &MessageState::Failed("network: reset".into()));
    }

    #[test]
    fn out_of_order_fragment_is_not_applied() {
        let (mut s, id) = started("q");
        feed(&mut s, id, &["one"]);
        assert_eq!(
            s.ingest(ExchangeEvent::fragment(id, 2, "three")),
            Err(IngestError::OrderViolation {
                expected: 1,
                got: 2
            })
        );
        let m = &s.messages()[1];
        assert_eq!(m.content(), "one");
        assert_eq!(
            m.state(),
            &MessageState::Failed(ORDER_VIOLATION_REASON.to_string())
        );
        assert_eq!(s.status(), Status::Idle);
        // The late "two" is now stale.
        assert_eq!(
            s.ingest(ExchangeEvent::fragment(id, 1, "two")),
            Err(IngestError::Stale(id))
        );
    }

    #[test]
    fn duplicate_fragment_is_an_order_violation() {
        let (mut s, id) = started("q");
        feed(&mut s, id, &["a"]);
        assert!(matches!(
            s.ingest(ExchangeEvent::fragment(id, 0, "a")),
            Err(IngestError::OrderViolation { .. })
        ));
        assert_eq!(s.messages()[1].content(), "a");
    }

    #[test]
    fn cancel_mid_stream_freezes_content() {
        let (mut s, id) = started("q");
        let frags = ["f1", "f2", "f3", "f4", "f5"];
        feed(&mut s, id, &frags[..2]);
        s.teardown();
        s.drain_changes();

        for (i, f) in frags.iter().enumerate().skip(2) {
            assert_eq!(
                s.ingest(ExchangeEvent::fragment(id, i as u64, *f)),
                Err(IngestError::Stale(id))
            );
        }
        assert_eq!(
            s.ingest(ExchangeEvent::completed(id)),
            Err(IngestError::Stale(id))
        );
        assert_eq!(s.messages()[1].content(), "f1f2");
        assert_eq!(s.messages()[1].state(), &MessageState::Cancelled);
        assert!(s.drain_changes().is_empty());
    }

    #[test]
    fn externally_cancelled_token_closes_exchange() {
        let mut s = Session::new();
        let t = s.submit("q").expect("ticket");
        s.ingest(ExchangeEvent::fragment(t.id(), 0, "a")).unwrap();
        t.cancel_token().cancel();
        assert_eq!(
            s.ingest(ExchangeEvent::fragment(t.id(), 1, "b")),
            Err(IngestError::Cancelled(t.id()))
        );
        assert_eq!(s.messages()[1].content(), "a");
        assert_eq!(s.status(), Status::Idle);
    }

    #[test]
    fn events_for_older_exchange_do_not_touch_newer_turn() {
        let mut s = Session::new();
        let first = s.submit("one").expect("ticket");
        s.cancel_exchange();
        let second = s.submit("two").expect("ticket");
        assert_ne!(first.id(), second.id());

        assert_eq!(
            s.ingest(ExchangeEvent::fragment(first.id(), 0, "old")),
            Err(IngestError::Stale(first.id()))
        );
        s.ingest(ExchangeEvent::fragment(second.id(), 0, "new")).unwrap();
        assert_eq!(s.messages()[3].content(), "new");
    }
}
