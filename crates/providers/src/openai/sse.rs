use aesthetic_core::llm::{ChatDelta, ChatError};
use bytes::{Buf, Bytes, BytesMut};

/// Splits a byte stream into SSE event blocks (terminated by a blank line).
#[derive(Default)]
pub struct SseDecoder {
    buf: BytesMut,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete event block, without its terminator.
    pub fn next_event(&mut self) -> Option<Bytes> {
        let (pos, sep) = find_event_boundary(&self.buf)?;
        let ev = self.buf.split_to(pos).freeze();
        self.buf.advance(sep);
        Some(ev)
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

// Earliest blank line wins so mixed line endings split correctly.
fn find_event_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = twoway::find_bytes(buf, b"\r\n\r\n").map(|p| (p, 4));
    let lf = twoway::find_bytes(buf, b"\n\n").map(|p| (p, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Decodes one `chat/completions` stream event.
///
/// `Ok(None)` means the event carried nothing for the transcript (comments,
/// keep-alives, role-only deltas).
pub fn parse_chat_event(ev: &[u8]) -> Result<Option<ChatDelta>, ChatError> {
    let s = std::str::from_utf8(ev).map_err(|e| ChatError::Decode(e.to_string()))?;
    let data_lines: Vec<&str> = s
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();
    if data_lines.is_empty() {
        return Ok(None);
    }
    if data_lines.len() == 1 && data_lines[0].trim() == "[DONE]" {
        return Ok(Some(ChatDelta::Finish(None)));
    }
    let json_text = data_lines.join("\n");
    let v: serde_json::Value =
        serde_json::from_str(&json_text).map_err(|e| ChatError::Decode(e.to_string()))?;
    if let Some(msg) = v["error"]["message"].as_str() {
        return Err(ChatError::Protocol(msg.to_string()));
    }
    let choice = &v["choices"][0];
    if let Some(content) = choice["delta"]["content"].as_str() {
        if !content.is_empty() {
            return Ok(Some(ChatDelta::Text(content.to_string())));
        }
    }
    if let Some(fr) = choice["finish_reason"].as_str() {
        return Ok(Some(ChatDelta::Finish(Some(fr.to_string()))));
    }
    Ok(None)
}
