//! Flow-list synchronization engine.
//!
//! All state changes go through [`Engine::dispatch`]: one event in, a list of
//! effects out. The runtime performs the effects (fetches, scrolls, route
//! writes, mutations) and feeds their outcomes back as events. Fetch results
//! are tagged with the list generation they were issued under and ignored
//! once a filter change or manual refresh has started a newer generation.

mod list;
mod selection;

pub use list::FlowListStore;
pub use selection::{Direction, SelectionPhase, SelectionTracker};

use crate::error::EngineError;
use crate::filter::{FilterCriteria, SearchQuery};
use crate::model::{FlowId, FlowSummary, Page, Service, ServiceDirectory};
use crate::route::{RouteMode, RouteUpdate};
use crate::source::FlowSource;
use tracing::{debug, info, warn};

pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Reset,
    LoadMore,
    Refresh,
    Poll,
}

impl FetchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchKind::Reset => "reset",
            FetchKind::LoadMore => "load_more",
            FetchKind::Refresh => "refresh",
            FetchKind::Poll => "poll",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub kind: FetchKind,
    pub query: SearchQuery,
}

#[derive(Debug, Clone)]
pub enum Event {
    FilterChanged(FilterCriteria),
    PageFetched {
        generation: u64,
        kind: FetchKind,
        result: Result<Page, EngineError>,
    },
    /// The visible window reached the last row.
    EndReached,
    NavigatePressed(Direction),
    ScrollSettled,
    ManualRefreshRequested,
    PollTick,
    RouteObserved(Option<FlowId>),
    RowActivated(usize),
    StarToggled(FlowId),
    StarFinished {
        id: FlowId,
        result: Result<(), EngineError>,
    },
    ServicesLoaded(Vec<Service>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch(FetchRequest),
    ScrollToIndex(usize),
    ScrollIntoView(usize),
    Route(RouteUpdate),
    SetStar { id: FlowId, starred: bool },
}

#[derive(Debug, Clone, Default)]
struct LoadState {
    is_loading: bool,
    manual_loading: bool,
    poll_in_flight: bool,
    error: Option<EngineError>,
}

#[derive(Debug, Clone)]
pub struct Engine {
    criteria: FilterCriteria,
    services: ServiceDirectory,
    generation: u64,
    list: FlowListStore,
    selection: SelectionTracker,
    load: LoadState,
    status: Option<String>,
}

impl Engine {
    pub fn new(config: EngineConfig, criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            services: ServiceDirectory::default(),
            generation: 0,
            list: FlowListStore::new(config.page_size),
            selection: SelectionTracker::default(),
            load: LoadState::default(),
            status: None,
        }
    }

    pub fn items(&self) -> &[FlowSummary] {
        self.list.items()
    }

    pub fn index(&self) -> usize {
        self.selection.index()
    }

    pub fn selected(&self) -> Option<&FlowSummary> {
        self.list.get(self.selection.index())
    }

    pub fn opened_id(&self) -> Option<&FlowId> {
        self.selection.opened_id()
    }

    pub fn phase(&self) -> &SelectionPhase {
        self.selection.phase()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn services(&self) -> &ServiceDirectory {
        &self.services
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page_size(&self) -> usize {
        self.list.page_size()
    }

    pub fn has_more(&self) -> bool {
        self.list.has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.list.is_loading_more()
    }

    pub fn is_manual_loading(&self) -> bool {
        self.load.manual_loading
    }

    /// Blocking failure of the first page; the list is not shown while set.
    pub fn load_error(&self) -> Option<&EngineError> {
        self.load.error.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn dispatch(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::FilterChanged(criteria) => self.reset(criteria),
            Event::PageFetched {
                generation,
                kind,
                result,
            } => self.page_fetched(generation, kind, result),
            Event::EndReached => self.load_more(),
            Event::NavigatePressed(direction) => self
                .selection
                .navigate(direction, self.list.items())
                .map(Effect::ScrollIntoView)
                .into_iter()
                .collect(),
            Event::ScrollSettled => self
                .selection
                .scroll_settled(self.list.items())
                .map(|id| {
                    Effect::Route(RouteUpdate {
                        id,
                        mode: RouteMode::Replace,
                    })
                })
                .into_iter()
                .collect(),
            Event::ManualRefreshRequested => self.refresh_now(),
            Event::PollTick => self.poll(),
            Event::RouteObserved(opened_id) => {
                let moved = self.selection.observe_route(opened_id, self.list.items());
                self.scroll_if(moved)
            }
            Event::RowActivated(index) => self
                .selection
                .activate(index, self.list.items())
                .map(|id| {
                    Effect::Route(RouteUpdate {
                        id,
                        mode: RouteMode::Push,
                    })
                })
                .into_iter()
                .collect(),
            Event::StarToggled(id) => self.toggle_star(id),
            Event::StarFinished { id, result } => self.star_finished(id, result),
            Event::ServicesLoaded(services) => self.services_loaded(services),
        }
    }

    fn query(&self, offset: usize) -> SearchQuery {
        SearchQuery::from_criteria(&self.criteria, &self.services, self.list.page_size(), offset)
    }

    fn fetch(&self, kind: FetchKind, offset: usize) -> Effect {
        Effect::Fetch(FetchRequest {
            generation: self.generation,
            kind,
            query: self.query(offset),
        })
    }

    fn reset(&mut self, criteria: FilterCriteria) -> Vec<Effect> {
        self.criteria = criteria;
        self.generation += 1;
        self.list.clear();
        self.load = LoadState {
            is_loading: true,
            ..LoadState::default()
        };
        self.selection.reconcile(self.list.items());
        debug!(generation = self.generation, "flow_list_reset");
        vec![self.fetch(FetchKind::Reset, 0)]
    }

    fn refresh_now(&mut self) -> Vec<Effect> {
        if self.load.manual_loading {
            return Vec::new();
        }
        self.generation += 1;
        self.list.fail_load_more();
        self.load.manual_loading = true;
        self.load.poll_in_flight = false;
        vec![self.fetch(FetchKind::Refresh, 0)]
    }

    fn load_more(&mut self) -> Vec<Effect> {
        if self.load.is_loading || self.load.manual_loading || self.load.error.is_some() {
            return Vec::new();
        }
        match self.list.begin_load_more() {
            Some(offset) => {
                debug!(offset, generation = self.generation, "flow_list_load_more");
                vec![self.fetch(FetchKind::LoadMore, offset)]
            }
            None => Vec::new(),
        }
    }

    fn poll(&mut self) -> Vec<Effect> {
        if self.load.is_loading || self.load.manual_loading || self.load.poll_in_flight {
            return Vec::new();
        }
        self.load.poll_in_flight = true;
        vec![self.fetch(FetchKind::Poll, 0)]
    }

    fn page_fetched(
        &mut self,
        generation: u64,
        kind: FetchKind,
        result: Result<Page, EngineError>,
    ) -> Vec<Effect> {
        if generation != self.generation {
            let stale = EngineError::StaleResponse {
                issued: generation,
                current: self.generation,
            };
            debug!(kind = kind.as_str(), "flow_page_dropped: {stale}");
            return Vec::new();
        }

        let page = match result {
            Ok(mut page) => {
                for flow in &mut page {
                    self.services.annotate(flow);
                }
                page
            }
            Err(err) => return self.fetch_failed(kind, err),
        };

        match kind {
            FetchKind::Reset => {
                self.load.is_loading = false;
                self.load.error = None;
                self.list.replace(page);
                info!(
                    count = self.list.len(),
                    has_more = self.list.has_more(),
                    "flow_list_loaded"
                );
                self.selection.reconcile(self.list.items());
                vec![Effect::ScrollToIndex(self.selection.index())]
            }
            FetchKind::LoadMore => {
                let added = self.list.finish_load_more(page);
                debug!(added, has_more = self.list.has_more(), "flow_list_appended");
                let moved = self.selection.reconcile(self.list.items());
                self.scroll_if(moved)
            }
            FetchKind::Refresh => {
                self.load.manual_loading = false;
                self.load.is_loading = false;
                self.load.error = None;
                self.list.replace(page);
                info!(count = self.list.len(), "flow_list_refreshed");
                let mut effects = vec![Effect::ScrollToIndex(0)];
                if let Some(id) = self.selection.reset_to_top(self.list.items()) {
                    effects.push(Effect::Route(RouteUpdate {
                        id,
                        mode: RouteMode::Replace,
                    }));
                }
                effects
            }
            FetchKind::Poll => {
                self.load.poll_in_flight = false;
                if self.load.error.take().is_some() {
                    self.list.replace(page);
                } else {
                    self.list.merge_poll(page);
                }
                let moved = self.selection.reconcile(self.list.items());
                self.scroll_if(moved)
            }
        }
    }

    fn fetch_failed(&mut self, kind: FetchKind, err: EngineError) -> Vec<Effect> {
        match kind {
            FetchKind::Reset => {
                warn!("flow_list_load_failed: {err}");
                self.load.is_loading = false;
                self.load.error = Some(err);
            }
            FetchKind::LoadMore => {
                warn!("flow_list_load_more_failed: {err}");
                self.list.fail_load_more();
            }
            FetchKind::Refresh => {
                warn!("flow_list_refresh_failed: {err}");
                self.load.manual_loading = false;
                if self.load.is_loading {
                    self.load.is_loading = false;
                    self.load.error = Some(err.clone());
                }
                self.status = Some(format!("refresh failed: {err}"));
            }
            FetchKind::Poll => {
                debug!("flow_list_poll_failed: {err}");
                self.load.poll_in_flight = false;
            }
        }
        Vec::new()
    }

    fn toggle_star(&mut self, id: FlowId) -> Vec<Effect> {
        let Some(flow) = self.list.find(&id) else {
            return Vec::new();
        };
        let starred = !flow.is_starred();
        vec![Effect::SetStar { id, starred }]
    }

    fn star_finished(&mut self, id: FlowId, result: Result<(), EngineError>) -> Vec<Effect> {
        match result {
            Ok(()) => self.poll(),
            Err(err) => {
                warn!("flow_star_failed: id={id} {err}");
                self.status = Some(format!("star failed: {err}"));
                Vec::new()
            }
        }
    }

    fn services_loaded(&mut self, services: Vec<Service>) -> Vec<Effect> {
        let before = self.query(0).without_window();
        self.services = ServiceDirectory::new(services);
        let directory = &self.services;
        self.list.for_each_mut(|flow| directory.annotate(flow));
        if self.query(0).without_window() != before {
            return self.reset(self.criteria.clone());
        }
        Vec::new()
    }

    fn scroll_if(&self, moved: bool) -> Vec<Effect> {
        if moved {
            vec![Effect::ScrollToIndex(self.selection.index())]
        } else {
            Vec::new()
        }
    }
}

/// Runs one fetch against `source` and wraps the outcome as the event the
/// engine expects back.
pub async fn execute_fetch<S: FlowSource>(source: &S, request: FetchRequest) -> Event {
    let result = source.search(&request.query).await;
    Event::PageFetched {
        generation: request.generation,
        kind: request.kind,
        result,
    }
}
