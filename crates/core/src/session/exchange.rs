use std::{future::Future, sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ExchangeEvent, ExchangeEventKind, ExchangeId};
use crate::llm::{ChatDelta, ChatError, ChatOpts, Message, ModelClient};

/// Everything the network side needs to run one exchange.
#[derive(Debug)]
pub struct ExchangeTicket {
    id: ExchangeId,
    history: Vec<Message>,
    cancel: CancellationToken,
}

impl ExchangeTicket {
    pub(crate) fn new(id: ExchangeId, history: Vec<Message>, cancel: CancellationToken) -> Self {
        Self {
            id,
            history,
            cancel,
        }
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExchangeOptions {
    pub chat: ChatOpts,
    /// Upper bound for opening the stream. Fragments are not subject to it.
    pub open_timeout: Option<Duration>,
}

/// Runs one exchange to its end, forwarding numbered events to `tx`.
///
/// Exactly one terminal event (`Completed` or `Failed`) is sent unless the
/// ticket is canceled, in which case the driver goes quiet immediately.
pub async fn drive(
    client: Arc<dyn ModelClient>,
    ticket: ExchangeTicket,
    opts: ExchangeOptions,
    tx: UnboundedSender<ExchangeEvent>,
) {
    let ExchangeTicket {
        id,
        history,
        cancel,
    } = ticket;
    let send = |kind: ExchangeEventKind| tx.send(ExchangeEvent { exchange: id, kind }).is_ok();

    let open = with_timeout(client.stream_chat(history, opts.chat), opts.open_timeout);
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(target: "session", "exchange {} canceled before open", id);
            return;
        }
        r = open => r,
    };
    let mut stream = match opened {
        Ok(s) => s,
        Err(e) => {
            error!(target: "session", "exchange {} open error: {}", id, e);
            send(ExchangeEventKind::Failed(e.to_string()));
            return;
        }
    };

    let mut seq = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(target: "session", "exchange {} canceled after {} fragments", id, seq);
                return;
            }
            it = stream.next() => {
                match it {
                    Some(Ok(ChatDelta::Text(text))) => {
                        if !send(ExchangeEventKind::Fragment { seq, text }) {
                            // Receiver gone: nobody is rendering this session anymore.
                            return;
                        }
                        seq += 1;
                    }
                    Some(Ok(ChatDelta::Finish(reason))) => {
                        info!(target: "session", "exchange {} finished: reason={:?} fragments={}", id, reason, seq);
                        send(ExchangeEventKind::Completed);
                        return;
                    }
                    Some(Err(e)) => {
                        warn!(target: "session", "exchange {} stream error: {}", id, e);
                        send(ExchangeEventKind::Failed(e.to_string()));
                        return;
                    }
                    None => {
                        info!(target: "session", "exchange {} closed by remote: fragments={}", id, seq);
                        send(ExchangeEventKind::Completed);
                        return;
                    }
                }
            }
        }
    }
}

async fn with_timeout<T, F>(fut: F, limit: Option<Duration>) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, ChatError>>,
{
    match limit {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| ChatError::Timeout(format!("open exceeded {}ms", d.as_millis())))?,
        None => fut.await,
    }
}
