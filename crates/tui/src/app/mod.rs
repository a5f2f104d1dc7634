use std::sync::Arc;

use aesthetic_core::llm::{ChatError, ModelClient};
use aesthetic_core::session::{drive, ExchangeOptions};
use aesthetic_core::{ExchangeEvent, Session};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use providers::openai::{OpenAiClient, OpenAiConfig};
use ratatui::layout::Rect;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

pub mod chat;
pub mod input;
pub mod prompts;
pub mod scroll;

use chat::WrappedMsg;
use input::{enter_chord, Chord};
use prompts::PromptPicker;
use scroll::ScrollCoordinator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Input,
    Prompts,
}

/// Where submissions go.
pub enum Backend {
    Ready {
        client: Arc<dyn ModelClient>,
        opts: ExchangeOptions,
    },
    /// No usable client; every submission fails with this reason.
    Unavailable(String),
}

impl Backend {
    pub fn from_env() -> Self {
        let cfg = match OpenAiConfig::from_env_and_file() {
            Ok(c) => c,
            Err(e) => {
                warn!(target: "tui", "provider config unavailable: {}", e);
                return Backend::Unavailable(ChatError::Config(e.to_string()).to_string());
            }
        };
        let client = match OpenAiClient::new(cfg.clone()) {
            Ok(c) => c,
            Err(e) => {
                error!(target: "tui", "client build error: {}", e);
                return Backend::Unavailable(ChatError::Config(format!("client: {}", e)).to_string());
            }
        };
        let opts = ExchangeOptions {
            chat: client.default_opts(),
            open_timeout: cfg.open_timeout,
        };
        Backend::Ready {
            client: Arc::new(client),
            opts,
        }
    }

    pub fn model_label(&self) -> &str {
        match self {
            Backend::Ready { opts, .. } => &opts.chat.model,
            Backend::Unavailable(_) => "offline",
        }
    }
}

pub struct App {
    pub session: Session,
    pub input_cursor: usize,
    pub focus: Focus,
    pub picker: PromptPicker,
    pub scroll: ScrollCoordinator,
    pub should_quit: bool,
    pub dirty: bool,
    pub tick: u64,
    pub chat_area: Option<Rect>,
    pub send_area: Option<Rect>,
    pub chat_wrap_width: u16,
    pub chat_cache: Vec<WrappedMsg>,
    pub chat_total_lines: usize,
    pub input_visible_lines: u16,
    pub input_max_lines: u16,
    pub model_label: String,
    backend: Backend,
    runtime: Handle,
    events_tx: UnboundedSender<ExchangeEvent>,
    events_rx: UnboundedReceiver<ExchangeEvent>,
}

impl App {
    pub fn new(runtime: Handle, backend: Backend) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session: Session::new(),
            input_cursor: 0,
            focus: Focus::Input,
            picker: PromptPicker::default(),
            scroll: ScrollCoordinator::default(),
            should_quit: false,
            dirty: true,
            tick: 0,
            chat_area: None,
            send_area: None,
            chat_wrap_width: 0,
            chat_cache: Vec::new(),
            chat_total_lines: 0,
            input_visible_lines: 1,
            input_max_lines: 6,
            model_label: backend.model_label().to_string(),
            backend,
            runtime,
            events_tx,
            events_rx,
        }
    }

    /// Single entry point for Enter and the send control.
    pub fn submit(&mut self) -> bool {
        let Some(ticket) = self.session.submit_draft() else {
            return false;
        };
        self.input_cursor = 0;
        self.focus = Focus::Input;
        self.scroll.follow_bottom();
        info!(target: "tui", "submit: exchange={} model={} turns={}", ticket.id(), self.model_label, ticket.history().len());

        match &self.backend {
            Backend::Ready { client, opts } => {
                let task = drive(client.clone(), ticket, opts.clone(), self.events_tx.clone());
                self.runtime.spawn(task);
            }
            Backend::Unavailable(reason) => {
                // Same path as a network failure: the next tick ingests it.
                let _ = self
                    .events_tx
                    .send(ExchangeEvent::failed(ticket.id(), reason.clone()));
            }
        }
        self.dispatch_changes();
        true
    }

    /// Stops the in-flight exchange. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        if !self.session.cancel_exchange() {
            return false;
        }
        info!(target: "tui", "exchange stopped by user");
        self.dispatch_changes();
        true
    }

    pub fn shutdown(&mut self) {
        self.session.teardown();
        self.dispatch_changes();
    }

    pub fn on_paste(&mut self, text: &str) {
        self.focus = Focus::Input;
        // Normalize CRLF so pasted text wraps like typed text.
        self.insert_text(&text.replace("\r\n", "\n"));
        self.dispatch_changes();
        self.dirty = true;
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            if !self.stop() {
                self.should_quit = true;
            }
            self.dirty = true;
            return;
        }
        if self.focus == Focus::Prompts {
            if self.on_picker_key(key) {
                self.dirty = true;
                return;
            }
            self.focus = Focus::Input;
        }
        if let Some(chord) = enter_chord(&key) {
            match chord {
                Chord::Submit => {
                    self.submit();
                }
                Chord::Newline => self.insert_text("\n"),
            }
            self.dispatch_changes();
            self.dirty = true;
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::PageUp => self.scroll.scroll_up(self.scroll.page()),
            KeyCode::PageDown => self.scroll.scroll_down(self.scroll.page()),
            KeyCode::Up if ctrl => self.scroll.scroll_up(1),
            KeyCode::Down if ctrl => self.scroll.scroll_down(1),
            KeyCode::Home if ctrl => self.scroll.scroll_to_top(),
            KeyCode::End if ctrl => self.scroll.follow_bottom(),
            KeyCode::Up | KeyCode::Down | KeyCode::Tab if self.picker_available() => {
                self.focus = Focus::Prompts;
            }
            KeyCode::Left if ctrl => self.move_cursor_word_left(),
            KeyCode::Right if ctrl => self.move_cursor_word_right(),
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            KeyCode::Home => self.move_cursor_line_start(),
            KeyCode::End => self.move_cursor_line_end(),
            KeyCode::Backspace => self.delete_left_grapheme(),
            KeyCode::Delete => self.delete_right_grapheme(),
            KeyCode::Char('a') if ctrl => self.move_cursor_line_start(),
            KeyCode::Char('e') if ctrl => self.move_cursor_line_end(),
            KeyCode::Char('w') if ctrl => self.delete_prev_word(),
            KeyCode::Char('u') if ctrl => self.kill_to_line_start(),
            KeyCode::Char('k') if ctrl => self.kill_to_line_end(),
            KeyCode::Char(c) if !ctrl => {
                let mut buf = [0u8; 4];
                self.insert_text(c.encode_utf8(&mut buf));
            }
            _ => {}
        }
        self.dispatch_changes();
        self.dirty = true;
    }

    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        // Bounded so a chatty stream cannot starve input handling.
        for _ in 0..256 {
            let Ok(ev) = self.events_rx.try_recv() else {
                break;
            };
            if let Err(e) = self.session.ingest(ev) {
                debug!(target: "tui", "exchange event not applied: {}", e);
            }
        }
        self.dispatch_changes();
        if self.session.is_busy() || self.scroll.is_settling() {
            self.dirty = true;
        }
    }

    // Forwards committed changes to the scroll coordinator and marks the frame dirty.
    fn dispatch_changes(&mut self) {
        for change in self.session.drain_changes() {
            self.scroll.on_change(&change);
            self.dirty = true;
        }
    }
}
