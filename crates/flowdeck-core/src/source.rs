use crate::error::EngineError;
use crate::filter::SearchQuery;
use crate::model::{FlowId, Page, Service, TickInfo};
use std::future::Future;

/// Paginated flow search.
pub trait FlowSource {
    fn search(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<Page, EngineError>> + Send;
}

pub trait FlowMutations {
    fn set_star(
        &self,
        id: &FlowId,
        starred: bool,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// Slow-moving listings the filter bar is built from.
pub trait FlowDirectory {
    fn tags(&self) -> impl Future<Output = Result<Vec<String>, EngineError>> + Send;
    fn services(&self) -> impl Future<Output = Result<Vec<Service>, EngineError>> + Send;
    fn tick_info(&self) -> impl Future<Output = Result<TickInfo, EngineError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollMode {
    /// Move the window only as far as needed.
    #[default]
    Auto,
    /// Put the row at the top of the window.
    Start,
}

pub type ScrollDone = Box<dyn FnOnce() + Send + 'static>;

/// The list virtualization primitive, seen from the engine's runtime.
pub trait ScrollCoordinator {
    fn scroll_to_index(&mut self, index: usize, mode: ScrollMode);
    /// `on_done` runs once the row has actually been brought into view.
    fn scroll_into_view(&mut self, index: usize, mode: ScrollMode, on_done: ScrollDone);
}
