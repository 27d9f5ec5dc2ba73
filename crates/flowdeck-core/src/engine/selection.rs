use crate::model::{FlowId, FlowSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    fn delta(self) -> isize {
        match self {
            Direction::Next => 1,
            Direction::Previous => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionPhase {
    #[default]
    Settled,
    /// A keyboard move is waiting for its scroll to complete.
    PendingScroll { target: FlowId },
}

/// Owns the selected index and the engine's copy of the opened flow id.
///
/// `opened_id` is the only place the route parameter is read from. It moves
/// together with `index` whenever the tracker itself navigates, so a second
/// keypress never compares against a route the runtime has not applied yet.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    index: usize,
    opened_id: Option<FlowId>,
    phase: SelectionPhase,
}

impl SelectionTracker {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn opened_id(&self) -> Option<&FlowId> {
        self.opened_id.as_ref()
    }

    pub fn phase(&self) -> &SelectionPhase {
        &self.phase
    }

    /// Re-anchors `index` after the list changed. Returns true when the index
    /// moved. The anchor is the pending navigation target if a scroll is still
    /// outstanding, otherwise the opened id.
    pub fn reconcile(&mut self, items: &[FlowSummary]) -> bool {
        let anchor = match &self.phase {
            SelectionPhase::PendingScroll { target } => Some(target),
            SelectionPhase::Settled => self.opened_id.as_ref(),
        };
        let found = anchor.and_then(|id| items.iter().position(|flow| flow.id == *id));
        let next = match found {
            Some(position) => position,
            None => {
                self.phase = SelectionPhase::Settled;
                0
            }
        };
        let moved = next != self.index;
        self.index = next;
        moved
    }

    /// Moves one row. Returns the new index when it changed.
    pub fn navigate(&mut self, direction: Direction, items: &[FlowSummary]) -> Option<usize> {
        if items.is_empty() {
            return None;
        }
        let last = items.len() - 1;
        let next = self
            .index
            .saturating_add_signed(direction.delta())
            .min(last);
        if next == self.index {
            return None;
        }
        self.index = next;
        self.phase = SelectionPhase::PendingScroll {
            target: items[next].id.clone(),
        };
        Some(next)
    }

    /// Scroll completion. Returns the id to replace the route with when the
    /// row now under `index` is not the opened flow.
    pub fn scroll_settled(&mut self, items: &[FlowSummary]) -> Option<FlowId> {
        self.phase = SelectionPhase::Settled;
        let current = items.get(self.index)?;
        if self.opened_id.as_ref() == Some(&current.id) {
            return None;
        }
        self.opened_id = Some(current.id.clone());
        Some(current.id.clone())
    }

    /// A route change the engine did not issue (history, startup).
    pub fn observe_route(&mut self, opened_id: Option<FlowId>, items: &[FlowSummary]) -> bool {
        self.opened_id = opened_id;
        self.phase = SelectionPhase::Settled;
        self.reconcile(items)
    }

    /// Direct pick of a row. Returns the id to push.
    pub fn activate(&mut self, index: usize, items: &[FlowSummary]) -> Option<FlowId> {
        let flow = items.get(index)?;
        self.index = index;
        self.phase = SelectionPhase::Settled;
        self.opened_id = Some(flow.id.clone());
        Some(flow.id.clone())
    }

    /// After a wholesale replace: top row, opened unconditionally.
    pub fn reset_to_top(&mut self, items: &[FlowSummary]) -> Option<FlowId> {
        self.index = 0;
        self.phase = SelectionPhase::Settled;
        let first = items.first()?;
        self.opened_id = Some(first.id.clone());
        Some(first.id.clone())
    }
}
