use aesthetic_core::Change;
use ratatui::layout::Rect;
use tracing::trace;

/// Keeps the newest transcript content in view.
///
/// Transcript changes queue a scroll-to-bottom request which the next draw
/// applies after layout, easing the offset toward the bottom a few rows per
/// frame. Scrolling up by hand leaves follow mode until the view is back at
/// the bottom (or a new turn is submitted).
#[derive(Debug)]
pub struct ScrollCoordinator {
    viewport: Option<Rect>,
    offset: usize,
    max_offset: usize,
    follow: bool,
    pending: bool,
}

impl Default for ScrollCoordinator {
    fn default() -> Self {
        Self {
            viewport: None,
            offset: 0,
            max_offset: 0,
            follow: true,
            pending: false,
        }
    }
}

impl ScrollCoordinator {
    pub fn mount(&mut self, viewport: Rect) {
        self.viewport = Some(viewport);
    }

    pub fn unmount(&mut self) {
        self.viewport = None;
        self.pending = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.viewport.is_some()
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    /// A scroll request is waiting for (or still easing through) draws.
    pub fn is_settling(&self) -> bool {
        self.pending
    }

    /// Reacts to one committed transcript change. Returns whether a request
    /// was queued; with no transcript pane mounted this does nothing.
    pub fn on_change(&mut self, change: &Change) -> bool {
        if !self.is_mounted() || !change.touches_transcript() {
            return false;
        }
        if !self.follow {
            trace!(target: "tui", "scroll request skipped: follow paused");
            return false;
        }
        self.pending = true;
        true
    }

    /// Resumes follow mode and queues a scroll to the bottom.
    pub fn follow_bottom(&mut self) {
        self.follow = true;
        if self.is_mounted() {
            self.pending = true;
        }
    }

    /// Computes this frame's top offset for `total` wrapped lines shown in
    /// `height` rows, applying one easing step of any pending request.
    pub fn layout(&mut self, total: usize, height: u16) -> usize {
        self.max_offset = total.saturating_sub(height as usize);
        if self.pending {
            let gap = self.max_offset.saturating_sub(self.offset);
            self.offset += gap.div_ceil(2);
            if self.offset >= self.max_offset {
                self.pending = false;
            }
        }
        self.offset = self.offset.min(self.max_offset);
        self.offset
    }

    /// Rows hidden below the view.
    pub fn lines_below(&self) -> usize {
        self.max_offset.saturating_sub(self.offset)
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.offset = self.offset.saturating_sub(rows);
        if self.offset < self.max_offset {
            self.follow = false;
            self.pending = false;
        }
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.offset = (self.offset + rows).min(self.max_offset);
        if self.offset >= self.max_offset {
            self.follow = true;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_up(self.offset);
    }

    pub fn page(&self) -> usize {
        self.viewport
            .map(|v| (v.height as usize).saturating_sub(1).max(1))
            .unwrap_or(1)
    }
}
