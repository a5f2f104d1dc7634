use crate::openai::config::OpenAiConfig;
use crate::openai::sse::{parse_chat_event, SseDecoder};
use aesthetic_core::llm::{
    BoxFuture, ChatDelta, ChatError, ChatOpts, ChatStream, Message, ModelClient,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use std::future::Future;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

const BACKOFF_STEP: Duration = Duration::from_millis(300);
const IDLE_TICK: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    cfg: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))?,
        );
        let mut builder = Client::builder()
            .default_headers(headers)
            .use_rustls_tls()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .connect_timeout(cfg.timeout);
        if let Some(p) = &cfg.proxy {
            builder = builder.proxy(reqwest::Proxy::all(p)?);
        }
        let http = builder.build()?;
        Ok(Self { http, cfg })
    }

    pub fn default_opts(&self) -> ChatOpts {
        ChatOpts {
            model: self.cfg.model.clone(),
            temperature: self.cfg.temperature,
            max_tokens: self.cfg.max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        )
    }

    async fn open(&self, req: &ChatRequest<'_>) -> Result<reqwest::Response, ChatError> {
        let url = self.endpoint();
        let (http, url) = (&self.http, url.as_str());
        open_with_retry(self.cfg.stream_max_retries, move |_| async move {
            match http.post(url).json(req).send().await {
                Ok(resp) if resp.status().is_success() => Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.ok();
                    error!(target:"providers::openai","chat stream non-200 status={} body={:?}", status, body);
                    Err(map_status_err(status, body))
                }
                Err(e) => Err(map_reqwest_err(e)),
            }
        })
        .await
    }

    async fn stream_chat_completions<'a>(
        &'a self,
        msgs: Vec<Message>,
        opts: ChatOpts,
    ) -> Result<ChatStream<'a>, ChatError> {
        info!(target:"providers::openai","start chat stream model={} turns={}", opts.model, msgs.len());
        let req = ChatRequest {
            model: &opts.model,
            messages: &msgs,
            stream: true,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        };
        let resp = self.open(&req).await?;
        let body = resp.bytes_stream().map(|r| r.map_err(map_reqwest_err));
        Ok(sse_deltas(body, self.cfg.stream_idle_timeout))
    }
}

// Runs `attempt_once` until it succeeds, fails with a non-retryable error, or
// `retries` retries are spent. Backoff grows linearly with the attempt number.
// Only the open is retried: once bytes flow, a retry would duplicate text.
async fn open_with_retry<T, F, Fut>(retries: u32, mut attempt_once: F) -> Result<T, ChatError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ChatError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match attempt_once(attempt).await {
            Ok(v) => return Ok(v),
            Err(err) => err,
        };
        if !err.is_retryable() || attempt > retries {
            return Err(err);
        }
        let backoff = BACKOFF_STEP * attempt;
        warn!(target:"providers::openai","open attempt {} failed ({}), retrying in {:?}", attempt, err, backoff);
        sleep(backoff).await;
    }
}

// Decodes an SSE body into deltas. Ends after a finish event, the first error,
// or when no bytes arrive for `idle`.
fn sse_deltas<'a, S>(body: S, idle: Duration) -> ChatStream<'a>
where
    S: Stream<Item = Result<Bytes, ChatError>> + Send + 'a,
{
    enum Step {
        Chunk(Option<Result<Bytes, ChatError>>),
        Tick,
    }

    let s = async_stream::stream! {
        let mut body = Box::pin(body);
        let mut dec = SseDecoder::new();
        let mut last = Instant::now();
        'outer: loop {
            let step = tokio::select! {
                chunk = body.next() => Step::Chunk(chunk),
                _ = sleep(IDLE_TICK) => Step::Tick,
            };
            match step {
                Step::Chunk(Some(Ok(b))) => {
                    dec.push(&b);
                    last = Instant::now();
                    while let Some(ev) = dec.next_event() {
                        match parse_chat_event(&ev) {
                            Ok(Some(ChatDelta::Finish(reason))) => {
                                yield Ok(ChatDelta::Finish(reason));
                                break 'outer;
                            }
                            Ok(Some(delta)) => yield Ok(delta),
                            Ok(None) => {}
                            Err(e) => {
                                yield Err(e);
                                break 'outer;
                            }
                        }
                    }
                }
                Step::Chunk(Some(Err(e))) => {
                    yield Err(e);
                    break 'outer;
                }
                Step::Chunk(None) => {
                    debug!(target:"providers::openai","body closed with {} undecoded bytes", dec.pending());
                    break 'outer;
                }
                Step::Tick => {
                    if last.elapsed() > idle {
                        yield Err(ChatError::Timeout("stream idle".into()));
                        break 'outer;
                    }
                }
            }
        }
    };
    Box::pin(s)
}

impl ModelClient for OpenAiClient {
    fn stream_chat<'a>(
        &'a self,
        msgs: Vec<Message>,
        opts: ChatOpts,
    ) -> BoxFuture<'a, Result<ChatStream<'a>, ChatError>> {
        Box::pin(self.stream_chat_completions(msgs, opts))
    }
}

fn map_reqwest_err(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout(e.to_string())
    } else if e.is_request() || e.is_connect() || e.is_body() {
        ChatError::Network(e.to_string())
    } else if e.is_decode() {
        ChatError::Decode(e.to_string())
    } else {
        ChatError::Other(e.to_string())
    }
}

fn map_status_err(status: StatusCode, body: Option<String>) -> ChatError {
    let s = format!("{} {}", status.as_u16(), body.unwrap_or_default())
        .trim_end()
        .to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::Auth(s),
        StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimit(s),
        StatusCode::REQUEST_TIMEOUT => ChatError::Timeout(s),
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ChatError::Network(s),
        StatusCode::NOT_FOUND => ChatError::Protocol(s),
        _ => ChatError::Other(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::cell::Cell;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            map_status_err(StatusCode::UNAUTHORIZED, Some("bad key".into())),
            ChatError::Auth(s) if s == "401 bad key"
        ));
        assert!(matches!(
            map_status_err(StatusCode::TOO_MANY_REQUESTS, None),
            ChatError::RateLimit(s) if s == "429"
        ));
        assert!(map_status_err(StatusCode::BAD_GATEWAY, None).is_retryable());
        assert!(!map_status_err(StatusCode::NOT_FOUND, None).is_retryable());
        assert!(matches!(
            map_status_err(StatusCode::BAD_REQUEST, None),
            ChatError::Other(_)
        ));
    }

    #[test]
    fn request_body_shape() {
        let msgs = vec![Message::user("Hello"), Message::assistant("Hi")];
        let req = ChatRequest {
            model: "gpt-4o-mini",
            messages: &msgs,
            stream: true,
            temperature: None,
            max_tokens: Some(256),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi"},
                ],
                "stream": true,
                "max_tokens": 256,
            })
        );
    }

    fn delta(content: &str) -> Result<Bytes, ChatError> {
        Ok(Bytes::from(format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failures_spend_the_retry_budget() {
        let calls = Cell::new(0u32);
        let res: Result<(), ChatError> = open_with_retry(3, |_| {
            calls.set(calls.get() + 1);
            async { Err(map_status_err(StatusCode::BAD_GATEWAY, None)) }
        })
        .await;
        assert!(matches!(res, Err(ChatError::Network(s)) if s == "502"));
        assert_eq!(calls.get(), 4);

        calls.set(0);
        let res: Result<(), ChatError> = open_with_retry(0, |_| {
            calls.set(calls.get() + 1);
            async { Err(ChatError::Network("reset".into())) }
        })
        .await;
        assert!(res.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let calls = Cell::new(0u32);
        let res: Result<(), ChatError> = open_with_retry(3, |_| {
            calls.set(calls.get() + 1);
            async { Err(map_status_err(StatusCode::UNAUTHORIZED, Some("bad key".into()))) }
        })
        .await;
        assert!(matches!(res, Err(ChatError::Auth(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_recovers_after_transient_failures() {
        let start = Instant::now();
        let res = open_with_retry(3, |attempt| async move {
            if attempt < 3 {
                Err(ChatError::Timeout("connect".into()))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(res, Ok(3));
        // 300ms after the first failure, 600ms after the second.
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body_times_out() {
        let body = stream::iter(vec![delta("Hel")]).chain(stream::pending());
        let out: Vec<_> = sse_deltas(body, Duration::from_secs(2)).collect().await;
        assert_eq!(
            out,
            vec![
                Ok(ChatDelta::Text("Hel".into())),
                Err(ChatError::Timeout("stream idle".into())),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn body_is_decoded_until_done() {
        let body = stream::iter(vec![
            delta("Hel"),
            Ok(Bytes::from_static(b": keep-alive\n\n")),
            delta("lo"),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
            delta("ignored"),
        ]);
        let out: Vec<_> = sse_deltas(body, Duration::from_secs(2)).collect().await;
        assert_eq!(
            out,
            vec![
                Ok(ChatDelta::Text("Hel".into())),
                Ok(ChatDelta::Text("lo".into())),
                Ok(ChatDelta::Finish(None)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_ends_the_stream() {
        let body = stream::iter(vec![delta("Hel"), Err(ChatError::Network("reset".into()))]);
        let out: Vec<_> = sse_deltas(body, Duration::from_secs(2)).collect().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Err(ChatError::Network("reset".into())));
    }
}
