use aesthetic_core::{Message, MessageId, MessageState, Role};
use textwrap::{wrap, Options};
use unicode_width::UnicodeWidthStr;

use crate::strings::{marker_error, MARKER_STOPPED, PREFIX_ASSISTANT, PREFIX_USER};

use super::App;

/// One transcript turn wrapped to the pane width.
///
/// `lines[..body]` is the message text; anything after is the outcome marker.
pub struct WrappedMsg {
    pub id: MessageId,
    pub role: Role,
    pub content_len: usize,
    pub state: MessageState,
    pub body: usize,
    pub lines: Vec<String>,
}

impl WrappedMsg {
    pub fn awaiting_text(&self) -> bool {
        self.state == MessageState::Streaming && self.content_len == 0
    }

    fn is_current(&self, m: &Message) -> bool {
        self.id == m.id() && self.content_len == m.content().len() && &self.state == m.state()
    }
}

impl App {
    /// Re-wraps only what changed since the last frame.
    pub fn ensure_chat_wrapped(&mut self, width: u16) {
        let width = width.max(1);
        let messages = self.session.messages();
        if self.chat_wrap_width != width || self.chat_cache.len() > messages.len() {
            self.chat_cache.clear();
            self.chat_wrap_width = width;
        }
        for (i, m) in messages.iter().enumerate() {
            match self.chat_cache.get(i) {
                Some(w) if w.is_current(m) => {}
                Some(_) => self.chat_cache[i] = wrap_message(m, width),
                None => self.chat_cache.push(wrap_message(m, width)),
            }
        }
        self.chat_total_lines = self.chat_cache.iter().map(|w| w.lines.len()).sum();
    }
}

fn wrap_message(m: &Message, width: u16) -> WrappedMsg {
    let prefix = match m.role() {
        Role::User => PREFIX_USER,
        Role::Assistant => PREFIX_ASSISTANT,
    };
    let indent = " ".repeat(UnicodeWidthStr::width(prefix));
    let mut lines = Vec::new();
    // textwrap restarts indentation at every hard newline, so each paragraph
    // after the first carries the hanging indent on all of its rows.
    for (i, para) in m.content().split('\n').enumerate() {
        if i > 0 && para.is_empty() {
            lines.push(String::new());
            continue;
        }
        let (text, opts) = if i == 0 {
            (
                format!("{}{}", prefix, para),
                Options::new(width as usize).subsequent_indent(&indent),
            )
        } else {
            (
                para.to_string(),
                Options::new(width as usize)
                    .initial_indent(&indent)
                    .subsequent_indent(&indent),
            )
        };
        lines.extend(wrap(&text, opts).into_iter().map(|c| c.into_owned()));
    }
    if lines.is_empty() {
        lines.push(prefix.to_string());
    }
    let body = lines.len();

    let marker = match m.state() {
        MessageState::Failed(reason) => Some(marker_error(reason)),
        MessageState::Cancelled => Some(MARKER_STOPPED.to_string()),
        MessageState::Complete | MessageState::Streaming => None,
    };
    if let Some(marker) = marker {
        let opts = Options::new(width as usize)
            .initial_indent(&indent)
            .subsequent_indent(&indent);
        lines.extend(wrap(&marker, opts).into_iter().map(|c| c.into_owned()));
    }

    WrappedMsg {
        id: m.id(),
        role: m.role(),
        content_len: m.content().len(),
        state: m.state().clone(),
        body,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Backend;
    use tokio::runtime::Handle;

    fn offline_app() -> App {
        App::new(
            Handle::current(),
            Backend::Unavailable("config: OPENAI_API_KEY not set".into()),
        )
    }

    #[tokio::test]
    async fn rows_after_a_hard_newline_keep_the_hanging_indent() {
        let mut app = offline_app();
        app.session.set_draft("first\nsecond paragraph\n\nlast");
        assert!(app.submit());
        app.ensure_chat_wrapped(12);

        let user = &app.chat_cache[0];
        assert_eq!(
            user.lines,
            vec!["| first", "  second", "  paragraph", "", "  last"]
        );
        assert_eq!(user.body, user.lines.len());
    }

    #[tokio::test]
    async fn failure_marker_follows_the_body() {
        let mut app = offline_app();
        app.session.set_draft("hi");
        app.submit();
        app.on_tick();
        app.ensure_chat_wrapped(60);

        let reply = &app.chat_cache[1];
        assert_eq!(reply.body, 1);
        assert_eq!(reply.lines[0].trim_end(), ">");
        assert!(reply.lines[1].starts_with("  "));
        assert!(reply.lines[1].contains("OPENAI_API_KEY"));
        assert_eq!(app.chat_total_lines, 1 + reply.lines.len());
    }
}
