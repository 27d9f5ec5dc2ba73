use flowdeck_core::{ScrollCoordinator, ScrollDone, ScrollMode};

/// Visible window over the flow table.
///
/// Scroll requests move `offset` immediately. Completions queued by
/// `scroll_into_view` run in [`ListViewport::frame_drawn`], after the frame
/// that actually shows the row.
#[derive(Default)]
pub struct ListViewport {
    offset: usize,
    height: usize,
    len: usize,
    pending: Vec<ScrollDone>,
    end_reported_at: Option<usize>,
}

impl ListViewport {
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Called from render once the table area is known.
    pub fn set_geometry(&mut self, height: usize, len: usize) {
        self.height = height;
        self.len = len;
        self.offset = self.offset.min(len.saturating_sub(height.max(1)));
    }

    /// Render may nudge the offset to keep the highlight on screen.
    pub fn sync_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn frame_drawn(&mut self) {
        for done in self.pending.drain(..) {
            done();
        }
    }

    pub fn last_row_visible(&self) -> bool {
        self.len > 0 && self.offset + self.height.max(1) >= self.len
    }

    /// True once per list length while the last row is on screen.
    pub fn take_end_reached(&mut self) -> bool {
        if !self.last_row_visible() {
            self.end_reported_at = None;
            return false;
        }
        if self.end_reported_at == Some(self.len) {
            return false;
        }
        self.end_reported_at = Some(self.len);
        true
    }

    /// User movement at the bottom counts as a fresh end signal.
    pub fn rearm_end(&mut self) {
        self.end_reported_at = None;
    }

    /// Maps a row inside the table body to a list index.
    pub fn index_at(&self, body_row: usize) -> Option<usize> {
        if body_row >= self.height {
            return None;
        }
        let index = self.offset + body_row;
        (index < self.len).then_some(index)
    }

    fn reveal(&mut self, index: usize, mode: ScrollMode) {
        let height = self.height.max(1);
        match mode {
            ScrollMode::Start => self.offset = index,
            ScrollMode::Auto => {
                if index < self.offset {
                    self.offset = index;
                } else if index >= self.offset + height {
                    self.offset = index + 1 - height;
                }
            }
        }
    }
}

impl ScrollCoordinator for ListViewport {
    fn scroll_to_index(&mut self, index: usize, mode: ScrollMode) {
        self.reveal(index, mode);
    }

    fn scroll_into_view(&mut self, index: usize, mode: ScrollMode, on_done: ScrollDone) {
        self.reveal(index, mode);
        self.pending.push(on_done);
    }
}
