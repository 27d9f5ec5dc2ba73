use crate::config::Config;
use crate::session::SessionStore;
use crate::viewport::ListViewport;
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use flowdeck_core::{
    Direction, Effect, Engine, EngineConfig, EngineError, Event, FetchRequest, FilterCriteria,
    FlowId, History, Location, RouteMode, ScrollCoordinator, ScrollMode, Service, TickClock,
    TickInfo,
};
use ratatui::layout::Rect;
use ratatui::widgets::{ListState, TableState};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

pub const TEXT_DEBOUNCE: Duration = Duration::from_millis(300);
const LAST_TICKS: i64 = 5;
const FLAG_IN_TAG: &str = "flag-in";
const FLAG_OUT_TAG: &str = "flag-out";

/// Everything that reaches the loop from outside the terminal.
#[derive(Debug)]
pub enum AppEvent {
    Engine(Event),
    Tags(Result<Vec<String>, EngineError>),
    Services(Result<Vec<Service>, EngineError>),
    TickInfo(Result<TickInfo, EngineError>),
}

/// Async work the loop spawns on the app's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Fetch(FetchRequest),
    SetStar { id: FlowId, starred: bool },
    LoadDirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditText,
    EditFromTick,
    EditToTick,
}

#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

pub struct App {
    pub engine: Engine,
    pub history: History,
    pub clock: TickClock,
    pub tags: Vec<String>,
    pub input_mode: InputMode,
    pub draft: String,
    pub tick_draft: String,
    pub debounce: Debounce,
    pub show_help: bool,
    pub show_tag_selector: bool,
    pub tag_list_state: ListState,
    pub table_state: TableState,
    pub viewport: ListViewport,
    pub list_area: Option<Rect>,
    pub status: Option<String>,
    base_criteria: FilterCriteria,
    session: Option<SessionStore>,
    events: UnboundedSender<AppEvent>,
    should_quit: bool,
}

impl App {
    pub fn new(config: &Config, events: UnboundedSender<AppEvent>) -> Self {
        let mut base_criteria = FilterCriteria::default();
        for flag in &config.flags {
            base_criteria.toggle_flag(flag);
        }
        for flag_id in &config.flag_ids {
            base_criteria.toggle_flag_id(flag_id);
        }
        let engine = Engine::new(
            EngineConfig {
                page_size: config.page_size,
            },
            base_criteria.clone(),
        );
        Self {
            engine,
            history: History::new(Location::default()),
            clock: TickClock::default(),
            tags: Vec::new(),
            input_mode: InputMode::Normal,
            draft: String::new(),
            tick_draft: String::new(),
            debounce: Debounce::new(TEXT_DEBOUNCE),
            show_help: false,
            show_tag_selector: false,
            tag_list_state: ListState::default(),
            table_state: TableState::default(),
            viewport: ListViewport::default(),
            list_area: None,
            status: None,
            base_criteria,
            session: None,
            events,
            should_quit: false,
        }
    }

    pub fn with_session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Installs the initial location and kicks off the first load.
    pub fn start(&mut self, initial: Location) -> Vec<Job> {
        self.history = History::new(initial.clone());
        let criteria = self.criteria_from(&initial);
        self.draft = criteria.text.clone().unwrap_or_default();
        let mut jobs = self.dispatch(Event::RouteObserved(initial.flow_id.clone()));
        jobs.extend(self.dispatch(Event::FilterChanged(criteria)));
        jobs.push(Job::LoadDirectory);
        jobs
    }

    pub fn dispatch(&mut self, event: Event) -> Vec<Job> {
        let effects = self.engine.dispatch(event);
        self.apply_effects(effects)
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) -> Vec<Job> {
        let mut jobs = Vec::new();
        for effect in effects {
            match effect {
                Effect::Fetch(request) => jobs.push(Job::Fetch(request)),
                Effect::ScrollToIndex(index) => {
                    self.viewport.scroll_to_index(index, ScrollMode::Auto);
                }
                Effect::ScrollIntoView(index) => {
                    let events = self.events.clone();
                    self.viewport.scroll_into_view(
                        index,
                        ScrollMode::Auto,
                        Box::new(move || {
                            let _ = events.send(AppEvent::Engine(Event::ScrollSettled));
                        }),
                    );
                }
                Effect::Route(update) => {
                    let location = self.history.current().with_flow_id(update.id);
                    self.history.navigate(location, update.mode);
                    self.persist();
                }
                Effect::SetStar { id, starred } => jobs.push(Job::SetStar { id, starred }),
            }
        }
        jobs
    }

    pub fn apply_event(&mut self, event: AppEvent) -> Vec<Job> {
        match event {
            AppEvent::Engine(event) => self.dispatch(event),
            AppEvent::Tags(Ok(tags)) => {
                self.tags = tags;
                self.ensure_tag_selection();
                Vec::new()
            }
            AppEvent::Services(Ok(services)) => self.dispatch(Event::ServicesLoaded(services)),
            AppEvent::TickInfo(Ok(info)) => {
                self.clock = TickClock::from_info(&info);
                Vec::new()
            }
            AppEvent::Tags(Err(err))
            | AppEvent::Services(Err(err))
            | AppEvent::TickInfo(Err(err)) => {
                warn!("directory_load_failed: {err}");
                Vec::new()
            }
        }
    }

    /// Runs scroll completions and reports the end of the list.
    pub fn after_draw(&mut self) -> Vec<Job> {
        self.viewport.frame_drawn();
        if self.engine.load_error().is_none() && self.viewport.take_end_reached() {
            return self.dispatch(Event::EndReached);
        }
        Vec::new()
    }

    /// Filter edits made in the TUI land in history as new entries.
    pub fn apply_criteria(&mut self, criteria: FilterCriteria) -> Vec<Job> {
        if criteria == *self.engine.criteria() {
            return Vec::new();
        }
        let mut location = self.history.current().clone();
        location.apply_criteria(&criteria);
        self.history.navigate(location, RouteMode::Push);
        self.persist();
        self.dispatch(Event::FilterChanged(criteria))
    }

    /// History navigation: both the opened flow and the filter may change.
    pub fn restore_location(&mut self, location: Location) -> Vec<Job> {
        let criteria = self.criteria_from(&location);
        self.draft = criteria.text.clone().unwrap_or_default();
        self.debounce.cancel();
        self.persist();
        let mut jobs = self.dispatch(Event::RouteObserved(location.flow_id.clone()));
        if criteria != *self.engine.criteria() {
            jobs.extend(self.dispatch(Event::FilterChanged(criteria)));
        }
        jobs
    }

    pub fn flush_text(&mut self) -> Vec<Job> {
        self.debounce.cancel();
        let mut criteria = self.engine.criteria().clone();
        criteria.set_text(&self.draft);
        self.apply_criteria(criteria)
    }

    pub fn on_debounce(&mut self, now: Instant) -> Vec<Job> {
        if self.debounce.is_due(now) {
            return self.flush_text();
        }
        Vec::new()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Job> {
        self.status = None;
        self.engine.clear_status();

        match self.input_mode {
            InputMode::EditText => return self.handle_edit_key(key),
            InputMode::EditFromTick | InputMode::EditToTick => return self.handle_tick_key(key),
            InputMode::Normal => {}
        }
        if self.show_tag_selector {
            if let Some(jobs) = self.handle_tag_selector_key(key) {
                return jobs;
            }
        }

        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Vec::new()
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                Vec::new()
            }
            KeyCode::Esc => {
                self.show_help = false;
                self.show_tag_selector = false;
                Vec::new()
            }
            KeyCode::Down | KeyCode::Char('j') => self.navigate(Direction::Next),
            KeyCode::Up | KeyCode::Char('k') => self.navigate(Direction::Previous),
            KeyCode::Enter => {
                let index = self.engine.index();
                self.dispatch(Event::RowActivated(index))
            }
            KeyCode::Char('r') => self.dispatch(Event::ManualRefreshRequested),
            KeyCode::Char('h') => match self.engine.selected() {
                Some(flow) => {
                    let id = flow.id.clone();
                    self.dispatch(Event::StarToggled(id))
                }
                None => Vec::new(),
            },
            KeyCode::Char('/') | KeyCode::Char('s') => {
                self.input_mode = InputMode::EditText;
                self.draft = self.engine.criteria().text.clone().unwrap_or_default();
                Vec::new()
            }
            KeyCode::Char('S') => {
                let mut criteria = self.engine.criteria().clone();
                let next = self
                    .engine
                    .services()
                    .next_name(criteria.service.as_deref());
                criteria.set_service(next);
                self.apply_criteria(criteria)
            }
            KeyCode::Char('t') => {
                self.show_tag_selector = !self.show_tag_selector;
                if self.show_tag_selector {
                    self.show_help = false;
                    self.ensure_tag_selection();
                }
                Vec::new()
            }
            KeyCode::Char('i') => self.toggle_known_tag(FLAG_IN_TAG),
            KeyCode::Char('o') => self.toggle_known_tag(FLAG_OUT_TAG),
            KeyCode::Char('[') => match self.history.back().cloned() {
                Some(location) => self.restore_location(location),
                None => Vec::new(),
            },
            KeyCode::Char(']') => match self.history.forward().cloned() {
                Some(location) => self.restore_location(location),
                None => Vec::new(),
            },
            KeyCode::Char('L') => {
                let mut criteria = self.engine.criteria().clone();
                let (from_ms, to_ms) = self.clock.last_n_ticks(LAST_TICKS, Utc::now());
                criteria.from_ms = from_ms;
                criteria.to_ms = to_ms;
                self.apply_criteria(criteria)
            }
            KeyCode::Char('f') => self.begin_tick_edit(InputMode::EditFromTick),
            KeyCode::Char('T') => self.begin_tick_edit(InputMode::EditToTick),
            KeyCode::Char('c') => {
                let mut criteria = self.engine.criteria().clone();
                criteria.clear_time_range();
                self.apply_criteria(criteria)
            }
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                if self.show_help {
                    self.show_tag_selector = false;
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Job> {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                match self.row_from_coords(event.column, event.row) {
                    Some(index) => self.dispatch(Event::RowActivated(index)),
                    None => Vec::new(),
                }
            }
            MouseEventKind::ScrollUp => self.navigate(Direction::Previous),
            MouseEventKind::ScrollDown => self.navigate(Direction::Next),
            _ => Vec::new(),
        }
    }

    pub fn update_layout(&mut self, list_area: Rect) {
        self.list_area = Some(list_area);
    }

    fn navigate(&mut self, direction: Direction) -> Vec<Job> {
        if direction == Direction::Next {
            self.viewport.rearm_end();
        }
        self.dispatch(Event::NavigatePressed(direction))
    }

    fn handle_edit_key(&mut self, key: KeyEvent) -> Vec<Job> {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.flush_text()
            }
            KeyCode::Backspace => {
                self.draft.pop();
                self.debounce.schedule(Instant::now());
                Vec::new()
            }
            KeyCode::Char(ch) => {
                self.draft.push(ch);
                self.debounce.schedule(Instant::now());
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn begin_tick_edit(&mut self, mode: InputMode) -> Vec<Job> {
        let criteria = self.engine.criteria();
        let bound = match mode {
            InputMode::EditFromTick => criteria.from_ms,
            _ => criteria.to_ms,
        };
        self.tick_draft = bound
            .map(|ms| self.clock.unix_ms_to_tick(ms).to_string())
            .unwrap_or_default();
        self.input_mode = mode;
        Vec::new()
    }

    fn handle_tick_key(&mut self, key: KeyEvent) -> Vec<Job> {
        match key.code {
            KeyCode::Enter => {
                let mode = self.input_mode;
                self.input_mode = InputMode::Normal;
                self.commit_tick(mode)
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                Vec::new()
            }
            KeyCode::Backspace => {
                self.tick_draft.pop();
                Vec::new()
            }
            KeyCode::Char(ch) if ch.is_ascii_digit() || ch == '-' && self.tick_draft.is_empty() => {
                self.tick_draft.push(ch);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// An empty draft or tick 0 clears the bound.
    fn commit_tick(&mut self, mode: InputMode) -> Vec<Job> {
        let draft = self.tick_draft.trim();
        let bound = if draft.is_empty() {
            None
        } else {
            match draft.parse::<i64>() {
                Ok(tick) => self.clock.tick_to_unix_ms(tick),
                Err(err) => {
                    debug!(draft, "tick_input_rejected: {err}");
                    self.status = Some(format!("invalid tick: {draft}"));
                    return Vec::new();
                }
            }
        };
        let mut criteria = self.engine.criteria().clone();
        match mode {
            InputMode::EditFromTick => criteria.from_ms = bound,
            _ => criteria.to_ms = bound,
        }
        self.apply_criteria(criteria)
    }

    /// `None` when the key is not the selector's to handle.
    fn handle_tag_selector_key(&mut self, key: KeyEvent) -> Option<Vec<Job>> {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_tag_selection(1);
                Some(Vec::new())
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_tag_selection(-1);
                Some(Vec::new())
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                let tag = self
                    .tag_list_state
                    .selected()
                    .and_then(|idx| self.tags.get(idx))
                    .cloned();
                Some(match tag {
                    Some(tag) => self.toggle_tag(&tag),
                    None => Vec::new(),
                })
            }
            KeyCode::Esc => {
                self.show_tag_selector = false;
                Some(Vec::new())
            }
            _ => None,
        }
    }

    fn toggle_known_tag(&mut self, tag: &str) -> Vec<Job> {
        if !self.tags.iter().any(|known| known == tag) {
            debug!(tag, "tag_toggle_ignored");
            return Vec::new();
        }
        self.toggle_tag(tag)
    }

    fn toggle_tag(&mut self, tag: &str) -> Vec<Job> {
        let mut criteria = self.engine.criteria().clone();
        criteria.tags.toggle(tag);
        self.apply_criteria(criteria)
    }

    fn ensure_tag_selection(&mut self) {
        match self.tag_list_state.selected() {
            _ if self.tags.is_empty() => self.tag_list_state.select(None),
            Some(idx) if idx < self.tags.len() => {}
            _ => self.tag_list_state.select(Some(0)),
        }
    }

    fn move_tag_selection(&mut self, delta: isize) {
        if self.tags.is_empty() {
            return;
        }
        let last = self.tags.len() - 1;
        let current = self.tag_list_state.selected().unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(last);
        self.tag_list_state.select(Some(next));
    }

    fn row_from_coords(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.list_area?;
        if !contains(area, column, row) {
            return None;
        }
        // Border plus header row.
        let data_start = area.y.saturating_add(2);
        if row < data_start {
            return None;
        }
        self.viewport.index_at((row - data_start) as usize)
    }

    /// Route-backed fields from `location`, flags from the command line.
    fn criteria_from(&mut self, location: &Location) -> FilterCriteria {
        let (criteria, error) = location.criteria(&self.base_criteria);
        if let Some(err) = error {
            warn!("{err}");
            self.status = Some(err.to_string());
        }
        criteria
    }

    fn persist(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        if let Err(err) = session.save(self.history.current()) {
            warn!("session_save_failed: {err:#}");
            self.status = Some(format!("session save failed: {err}"));
        }
    }
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::{FetchKind, FlowSummary, Page};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn flow(id: &str) -> FlowSummary {
        let value = serde_json::json!({ "_id": id, "dst_ip": "10.0.0.1", "dst_port": 80 });
        serde_json::from_value(value).expect("fixture flow")
    }

    fn page(prefix: &str, n: usize) -> Page {
        (0..n).map(|i| flow(&format!("{prefix}{i}"))).collect()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = unbounded_channel();
        let config = Config {
            page_size: 10,
            flags: vec!["FLAG{x}".to_string()],
            ..Config::default()
        };
        let mut app = App::new(&config, tx);
        app.viewport.set_geometry(5, 0);
        (app, rx)
    }

    fn fetches(jobs: &[Job]) -> Vec<&FetchRequest> {
        jobs.iter()
            .filter_map(|job| match job {
                Job::Fetch(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn deliver(app: &mut App, jobs: &[Job], result: Page) -> Vec<Job> {
        let request = fetches(jobs)
            .last()
            .map(|request| (*request).clone())
            .expect("a fetch job");
        app.dispatch(Event::PageFetched {
            generation: request.generation,
            kind: request.kind,
            result: Ok(result),
        })
    }

    fn started(location: &str, rows: usize) -> (App, UnboundedReceiver<AppEvent>) {
        let (mut app, rx) = app();
        let jobs = app.start(Location::parse(location));
        deliver(&mut app, &jobs, page("f", rows));
        app.viewport.set_geometry(5, app.engine.items().len());
        (app, rx)
    }

    #[test]
    fn start_restores_filters_and_flags_from_location() {
        let (mut app, _rx) = app();
        let jobs = app.start(Location::parse("/flow/f3?text=admin&service=web"));
        let reset = fetches(&jobs)[0];
        assert_eq!(reset.kind, FetchKind::Reset);
        assert_eq!(reset.query.text.as_deref(), Some("admin"));
        assert_eq!(reset.query.flags, vec!["FLAG{x}".to_string()]);
        assert!(jobs.contains(&Job::LoadDirectory));
        assert_eq!(app.draft, "admin");

        deliver(&mut app, &jobs, page("f", 10));
        assert_eq!(app.engine.index(), 3);
    }

    #[test]
    fn malformed_tags_fall_back_and_report() {
        let (mut app, _rx) = app();
        let jobs = app.start(Location::parse("/?tags=%7Bnope"));
        assert!(fetches(&jobs)[0].query.include_tags.is_empty());
        assert!(app.status.as_deref().is_some_and(|s| s.contains("tags")));
    }

    #[test]
    fn keyboard_move_replaces_route_after_draw() {
        let (mut app, mut rx) = started("/flow/f0", 10);
        assert!(app.handle_key(key(KeyCode::Char('j'))).is_empty());
        assert_eq!(app.history.current().flow_id, Some(FlowId::new("f0")));

        assert!(app.after_draw().is_empty());
        let settled = rx.try_recv().expect("scroll settled queued");
        app.apply_event(settled);
        assert_eq!(app.history.current().flow_id, Some(FlowId::new("f1")));
        assert_eq!(app.history.len(), 1);
    }

    #[test]
    fn enter_pushes_history_and_back_restores() {
        let (mut app, _rx) = started("/flow/f0", 10);
        app.handle_key(key(KeyCode::Char('j')));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.history.len(), 2);
        assert_eq!(app.history.current().flow_id, Some(FlowId::new("f1")));

        let jobs = app.handle_key(key(KeyCode::Char('[')));
        assert!(fetches(&jobs).is_empty());
        assert_eq!(app.engine.index(), 0);
        assert_eq!(app.engine.opened_id(), Some(&FlowId::new("f0")));
    }

    #[test]
    fn text_edits_are_debounced_into_one_reset() {
        let (mut app, _rx) = started("/", 3);
        app.handle_key(key(KeyCode::Char('/')));
        for ch in "flag".chars() {
            assert!(app.handle_key(key(KeyCode::Char(ch))).is_empty());
        }
        assert_eq!(app.input_mode, InputMode::EditText);
        let deadline = app.debounce.deadline().expect("debounce armed");
        assert!(app.on_debounce(deadline - Duration::from_millis(1)).is_empty());

        let jobs = app.on_debounce(deadline);
        let reset = fetches(&jobs)[0];
        assert_eq!(reset.query.text.as_deref(), Some("flag"));
        assert_eq!(app.history.current().get("text"), Some("flag"));
        assert!(app.on_debounce(deadline).is_empty());

        assert!(app.handle_key(key(KeyCode::Enter)).is_empty());
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn flag_tag_keys_need_known_tags() {
        let (mut app, _rx) = started("/", 3);
        assert!(app.handle_key(key(KeyCode::Char('o'))).is_empty());

        app.apply_event(AppEvent::Tags(Ok(vec![
            FLAG_IN_TAG.to_string(),
            FLAG_OUT_TAG.to_string(),
        ])));
        let jobs = app.handle_key(key(KeyCode::Char('o')));
        assert_eq!(fetches(&jobs)[0].query.include_tags, vec!["flag-out"]);
        let jobs = app.handle_key(key(KeyCode::Char('o')));
        assert_eq!(fetches(&jobs)[0].query.exclude_tags, vec!["flag-out"]);
        assert!(app
            .history
            .current()
            .get("tags")
            .is_some_and(|raw| raw.contains("exclude")));
    }

    #[test]
    fn tag_selector_toggles_highlighted_tag() {
        let (mut app, _rx) = started("/", 3);
        app.apply_event(AppEvent::Tags(Ok(vec!["a".into(), "b".into()])));
        app.handle_key(key(KeyCode::Char('t')));
        assert!(app.show_tag_selector);
        app.handle_key(key(KeyCode::Char('j')));
        let jobs = app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(fetches(&jobs)[0].query.include_tags, vec!["b"]);
        assert_eq!(app.engine.index(), 0);
    }

    #[test]
    fn end_of_list_requests_next_page_once() {
        let (mut app, _rx) = started("/", 10);
        app.viewport.scroll_to_index(9, ScrollMode::Auto);
        let jobs = app.after_draw();
        assert_eq!(fetches(&jobs)[0].kind, FetchKind::LoadMore);
        assert_eq!(fetches(&jobs)[0].query.offset, 10);
        assert!(app.after_draw().is_empty());
    }

    #[test]
    fn star_key_emits_job_for_selected_flow() {
        let (mut app, _rx) = started("/", 3);
        let jobs = app.handle_key(key(KeyCode::Char('h')));
        assert_eq!(
            jobs,
            vec![Job::SetStar {
                id: FlowId::new("f0"),
                starred: true
            }]
        );
    }

    #[test]
    fn service_cycle_and_time_clear_go_through_history() {
        let (mut app, _rx) = started("/?from=1000&to=2000", 3);
        app.apply_event(AppEvent::Services(Ok(vec![Service {
            name: "web".into(),
            ip: "10.0.0.1".into(),
            port: 80,
        }])));
        let jobs = app.handle_key(key(KeyCode::Char('S')));
        assert_eq!(fetches(&jobs)[0].query.dst_port, Some(80));
        assert_eq!(app.history.current().get("service"), Some("web"));

        let jobs = app.handle_key(key(KeyCode::Char('c')));
        assert_eq!(fetches(&jobs)[0].query.from_time, None);
        assert_eq!(app.history.current().get("from"), None);
        assert_eq!(app.history.len(), 3);
    }

    #[test]
    fn typed_tick_window_lands_in_history() {
        let (mut app, _rx) = started("/", 3);
        app.apply_event(AppEvent::TickInfo(Ok(TickInfo {
            start_date: "2026-01-01T10:00:00Z".to_string(),
            tick_length: 60_000,
        })));
        let start = chrono::DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z")
            .expect("start date")
            .timestamp_millis();

        app.handle_key(key(KeyCode::Char('f')));
        assert_eq!(app.input_mode, InputMode::EditFromTick);
        for ch in "12".chars() {
            assert!(app.handle_key(key(KeyCode::Char(ch))).is_empty());
        }
        let jobs = app.handle_key(key(KeyCode::Enter));
        assert_eq!(fetches(&jobs)[0].query.from_time, Some(start + 12 * 60_000));
        let from = (start + 12 * 60_000).to_string();
        assert_eq!(app.history.current().get("from"), Some(from.as_str()));

        app.handle_key(key(KeyCode::Char('T')));
        for ch in "x20".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        assert_eq!(app.tick_draft, "20");
        app.handle_key(key(KeyCode::Enter));
        let to = (start + 20 * 60_000).to_string();
        assert_eq!(app.history.current().get("to"), Some(to.as_str()));
        assert_eq!(app.history.current().get("from"), Some(from.as_str()));
        assert_eq!(app.input_mode, InputMode::Normal);

        app.handle_key(key(KeyCode::Char('f')));
        assert_eq!(app.tick_draft, "12");
        app.handle_key(key(KeyCode::Backspace));
        app.handle_key(key(KeyCode::Backspace));
        let jobs = app.handle_key(key(KeyCode::Enter));
        assert_eq!(fetches(&jobs)[0].query.from_time, None);
        assert_eq!(app.history.current().get("from"), None);
    }

    #[test]
    fn escape_leaves_tick_bound_untouched() {
        let (mut app, _rx) = started("/?from=1000", 3);
        app.handle_key(key(KeyCode::Char('T')));
        app.handle_key(key(KeyCode::Char('9')));
        assert!(app.handle_key(key(KeyCode::Esc)).is_empty());
        assert_eq!(app.history.current().get("to"), None);
        assert_eq!(app.history.current().get("from"), Some("1000"));
    }

    #[test]
    fn session_is_written_on_route_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().join("session.json"));
        let (app, _rx) = started("/", 3);
        let mut app = app.with_session(store.clone());
        app.dispatch(Event::RowActivated(2));
        let saved = store.load().expect("session saved");
        assert_eq!(saved.flow_id, Some(FlowId::new("f2")));
    }
}
