use crate::model::{FlowId, FlowSummary, Page};
use std::collections::HashSet;

/// Accumulated, de-duplicated flows for the current filter plus the
/// pagination cursor.
#[derive(Debug, Clone)]
pub struct FlowListStore {
    items: Vec<FlowSummary>,
    ids: HashSet<FlowId>,
    page_size: usize,
    has_more: bool,
    is_loading_more: bool,
}

impl FlowListStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            ids: HashSet::new(),
            page_size: page_size.max(1),
            has_more: false,
            is_loading_more: false,
        }
    }

    pub fn items(&self) -> &[FlowSummary] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FlowSummary> {
        self.items.get(index)
    }

    pub fn find(&self, id: &FlowId) -> Option<&FlowSummary> {
        if !self.ids.contains(id) {
            return None;
        }
        self.items.iter().find(|flow| flow.id == *id)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    /// Drops everything; used when a new filter generation starts.
    pub fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
        self.has_more = false;
        self.is_loading_more = false;
    }

    /// Installs a fresh first page (reset or manual refresh).
    pub fn replace(&mut self, page: Page) {
        let fetched = page.len();
        self.items.clear();
        self.ids.clear();
        self.extend_unique(page);
        self.has_more = fetched == self.page_size;
        self.is_loading_more = false;
    }

    /// Claims the load-more slot. `None` when a load is already in flight or
    /// the server is exhausted; otherwise the offset to fetch from.
    pub fn begin_load_more(&mut self) -> Option<usize> {
        if self.is_loading_more || !self.has_more {
            return None;
        }
        self.is_loading_more = true;
        Some(self.items.len())
    }

    /// Appends the survivors of `page` and returns how many were new.
    /// Exhaustion is judged on the raw page length.
    pub fn finish_load_more(&mut self, page: Page) -> usize {
        let fetched = page.len();
        let before = self.items.len();
        self.extend_unique(page);
        self.has_more = fetched == self.page_size;
        self.is_loading_more = false;
        self.items.len() - before
    }

    /// Releases the load-more slot; `has_more` stays as it was so the next
    /// end-of-list signal retries.
    pub fn fail_load_more(&mut self) {
        self.is_loading_more = false;
    }

    /// Replaces the leading page with a background refetch of page 0.
    pub fn merge_poll(&mut self, page: Page) {
        let fetched = page.len();
        let tail: Vec<FlowSummary> = if fetched < self.page_size {
            Vec::new()
        } else {
            self.items.split_off(self.page_size.min(self.items.len()))
        };
        self.items.clear();
        self.ids.clear();
        self.extend_unique(page);
        self.extend_unique(tail);
        if fetched < self.page_size {
            self.has_more = false;
        }
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut FlowSummary)) {
        for flow in &mut self.items {
            f(flow);
        }
    }

    fn extend_unique(&mut self, flows: impl IntoIterator<Item = FlowSummary>) {
        for flow in flows {
            if self.ids.insert(flow.id.clone()) {
                self.items.push(flow);
            }
        }
    }
}
