use aesthetic_core::prompts::PromptCatalog;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::Rect;
use tracing::info;

use super::{App, Focus};

/// Sample prompts listed in the transcript pane until the first turn.
#[derive(Debug, Default)]
pub struct PromptPicker {
    pub catalog: PromptCatalog,
    pub selected: usize,
    /// Screen rows of the rendered entries, recorded by the last draw.
    pub hit_rows: Vec<(usize, Rect)>,
}

impl PromptPicker {
    pub fn select_next(&mut self) {
        if !self.catalog.is_empty() {
            self.selected = (self.selected + 1).min(self.catalog.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn hit(&self, x: u16, y: u16) -> Option<usize> {
        self.hit_rows
            .iter()
            .find(|(_, r)| x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height)
            .map(|(i, _)| *i)
    }
}

impl App {
    pub fn picker_available(&self) -> bool {
        self.session.is_empty()
    }

    /// Seeds the draft with catalog entry `idx` and hands focus to the input.
    /// Does nothing once the transcript has a turn.
    pub fn select_prompt(&mut self, idx: usize) -> bool {
        let Some(prompt) = self.picker.catalog.get(idx) else {
            return false;
        };
        if !self.session.seed_draft(prompt) {
            return false;
        }
        self.picker.selected = idx;
        self.focus = Focus::Input;
        self.move_cursor_end();
        info!(target: "tui", "sample prompt {} seeded", idx);
        self.dispatch_changes();
        true
    }

    // Keys while the picker has focus. Returns false for keys it leaves alone.
    pub(super) fn on_picker_key(&mut self, key: KeyEvent) -> bool {
        if !self.picker_available() {
            self.focus = Focus::Input;
            return false;
        }
        match key.code {
            KeyCode::Up => self.picker.select_prev(),
            KeyCode::Down => self.picker.select_next(),
            KeyCode::Enter => {
                self.select_prompt(self.picker.selected);
            }
            KeyCode::Esc | KeyCode::Tab => self.focus = Focus::Input,
            _ => return false,
        }
        true
    }
}
