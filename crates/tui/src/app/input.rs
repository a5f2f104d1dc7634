use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use super::App;

/// What an Enter-like chord means for the compose box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chord {
    Submit,
    Newline,
}

/// Plain Enter submits. Shift+Enter inserts a newline; Alt+Enter and Ctrl+J
/// do the same for terminals that cannot report Shift.
pub fn enter_chord(key: &KeyEvent) -> Option<Chord> {
    match key.code {
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            Some(Chord::Newline)
        }
        KeyCode::Enter => Some(Chord::Submit),
        KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Chord::Newline)
        }
        _ => None,
    }
}

/// Visible rows for the compose box: wrapped line count clamped to `1..=max_lines`.
pub fn input_height(text: &str, width: u16, max_lines: u16) -> u16 {
    let lines = measure_total_lines(text, width).min(u16::MAX as usize) as u16;
    lines.clamp(1, max_lines.max(1))
}

pub fn measure_total_lines(s: &str, width: u16) -> usize {
    wrap_draft_lines(s, width).len()
}

/// Breaks the draft into display rows: hard newlines, plus a break before any
/// grapheme that would cross `width`. The compose box renders these rows as
/// is, so its height and caret always agree with what is shown.
pub fn wrap_draft_lines(s: &str, width: u16) -> Vec<String> {
    let mut lines = vec![String::new()];
    if width == 0 {
        return lines;
    }
    let mut col = 0usize;
    for g in s.graphemes(true) {
        if g == "\n" {
            lines.push(String::new());
            col = 0;
            continue;
        }
        let w = UnicodeWidthStr::width(g);
        if col + w > width as usize {
            lines.push(String::new());
            col = 0;
        }
        if let Some(line) = lines.last_mut() {
            line.push_str(g);
        }
        col += w;
    }
    lines
}

/// Wrapped (line, column) of the caret after `upto` graphemes.
pub fn measure_prefix_line_col(graphemes: &[&str], upto: usize, width: u16) -> (u16, u16) {
    if width == 0 {
        return (0, 0);
    }
    let mut line = 0usize;
    let mut col = 0usize;
    for g in graphemes.iter().take(upto) {
        if *g == "\n" {
            line += 1;
            col = 0;
            continue;
        }
        let w = UnicodeWidthStr::width(*g);
        if col + w > width as usize {
            line += 1;
            col = 0;
        }
        col += w;
    }
    (line as u16, col as u16)
}

// Editing operates on the session's draft; every edit goes through on_change.
impl App {
    fn draft_graphemes(&self) -> Vec<&str> {
        self.session.draft().graphemes(true).collect()
    }

    /// Replaces the whole draft. The caret stays put unless the new text is
    /// shorter, in which case it moves to the end.
    pub fn on_change(&mut self, text: impl Into<String>) {
        self.session.set_draft(text);
        let len = self.draft_graphemes().len();
        self.input_cursor = self.input_cursor.min(len);
    }

    fn replace_draft(&mut self, parts: &[&str], cursor: usize) {
        self.on_change(parts.concat());
        self.input_cursor = cursor;
    }

    pub fn insert_text(&mut self, s: &str) {
        let draft = self.session.draft().to_string();
        let parts: Vec<&str> = draft.graphemes(true).collect();
        let idx = self.input_cursor.min(parts.len());
        let mut next = String::with_capacity(draft.len() + s.len());
        for g in &parts[..idx] {
            next.push_str(g);
        }
        next.push_str(s);
        for g in &parts[idx..] {
            next.push_str(g);
        }
        let added = s.graphemes(true).count();
        self.input_cursor = idx + added;
        self.on_change(next);
    }

    pub fn delete_left_grapheme(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let draft = self.session.draft().to_string();
        let mut parts: Vec<&str> = draft.graphemes(true).collect();
        let idx = self.input_cursor.min(parts.len());
        if idx == 0 {
            return;
        }
        parts.remove(idx - 1);
        self.replace_draft(&parts, idx - 1);
    }

    pub fn delete_right_grapheme(&mut self) {
        let draft = self.session.draft().to_string();
        let mut parts: Vec<&str> = draft.graphemes(true).collect();
        let idx = self.input_cursor.min(parts.len());
        if idx < parts.len() {
            parts.remove(idx);
            self.replace_draft(&parts, idx);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        let len = self.draft_graphemes().len();
        self.input_cursor = (self.input_cursor + 1).min(len);
    }

    pub fn move_cursor_end(&mut self) {
        self.input_cursor = self.draft_graphemes().len();
    }

    pub fn move_cursor_line_start(&mut self) {
        let parts = self.draft_graphemes();
        let mut i = self.input_cursor.min(parts.len());
        while i > 0 && parts[i - 1] != "\n" {
            i -= 1;
        }
        self.input_cursor = i;
    }

    pub fn move_cursor_line_end(&mut self) {
        let parts = self.draft_graphemes();
        let mut i = self.input_cursor.min(parts.len());
        while i < parts.len() && parts[i] != "\n" {
            i += 1;
        }
        self.input_cursor = i;
    }

    pub fn move_cursor_word_left(&mut self) {
        let parts = self.draft_graphemes();
        let mut i = self.input_cursor.min(parts.len());
        while i > 0 && parts[i - 1].trim().is_empty() {
            i -= 1;
        }
        while i > 0 && !parts[i - 1].trim().is_empty() {
            i -= 1;
        }
        self.input_cursor = i;
    }

    pub fn move_cursor_word_right(&mut self) {
        let parts = self.draft_graphemes();
        let mut i = self.input_cursor.min(parts.len());
        while i < parts.len() && parts[i].trim().is_empty() {
            i += 1;
        }
        while i < parts.len() && !parts[i].trim().is_empty() {
            i += 1;
        }
        self.input_cursor = i;
    }

    pub fn delete_prev_word(&mut self) {
        let draft = self.session.draft().to_string();
        let mut parts: Vec<&str> = draft.graphemes(true).collect();
        let end = self.input_cursor.min(parts.len());
        let mut i = end;
        while i > 0 && parts[i - 1].trim().is_empty() {
            i -= 1;
        }
        while i > 0 && !parts[i - 1].trim().is_empty() {
            i -= 1;
        }
        if i < end {
            parts.drain(i..end);
            self.replace_draft(&parts, i);
        }
    }

    pub fn kill_to_line_start(&mut self) {
        let draft = self.session.draft().to_string();
        let mut parts: Vec<&str> = draft.graphemes(true).collect();
        let end = self.input_cursor.min(parts.len());
        let mut start = end;
        while start > 0 && parts[start - 1] != "\n" {
            start -= 1;
        }
        if start < end {
            parts.drain(start..end);
            self.replace_draft(&parts, start);
        }
    }

    pub fn kill_to_line_end(&mut self) {
        let draft = self.session.draft().to_string();
        let mut parts: Vec<&str> = draft.graphemes(true).collect();
        let start = self.input_cursor.min(parts.len());
        let mut end = start;
        while end < parts.len() && parts[end] != "\n" {
            end += 1;
        }
        if start < end {
            parts.drain(start..end);
            self.replace_draft(&parts, start);
        }
    }
}
