use crate::error::EngineError;
use crate::filter::{FilterCriteria, TagFilter};
use crate::model::FlowId;
use std::fmt;
use url::{form_urlencoded, Url};

pub const SERVICE_KEY: &str = "service";
pub const TEXT_KEY: &str = "text";
pub const START_KEY: &str = "from";
pub const END_KEY: &str = "to";
pub const TAGS_KEY: &str = "tags";

const FLOW_SEGMENT: &str = "flow";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    Push,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteUpdate {
    pub id: FlowId,
    pub mode: RouteMode,
}

/// `/flow/<id>?<query>`, the persisted view address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub flow_id: Option<FlowId>,
    query: Vec<(String, String)>,
}

impl Location {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        let Ok(url) = Url::parse(&format!("http://flowdeck.local{path}")) else {
            return Self::default();
        };

        let mut segments = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();
        let flow_id = match (segments.next(), segments.next()) {
            (Some(FLOW_SEGMENT), Some(id)) => Some(FlowId::new(id)),
            _ => None,
        };
        let query = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { flow_id, query }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                if let Some(slot) = self.query.iter_mut().find(|(k, _)| k == key) {
                    slot.1 = value;
                } else {
                    self.query.push((key.to_string(), value));
                }
            }
            None => self.query.retain(|(k, _)| k != key),
        }
    }

    pub fn query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.query {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Same query string, different opened flow.
    pub fn with_flow_id(&self, id: FlowId) -> Self {
        Self {
            flow_id: Some(id),
            query: self.query.clone(),
        }
    }

    /// Writes the route-backed fields of `criteria`; flags stay out of the URL.
    pub fn apply_criteria(&mut self, criteria: &FilterCriteria) {
        self.set(SERVICE_KEY, criteria.service.clone());
        self.set(TEXT_KEY, criteria.text.clone());
        self.set(START_KEY, criteria.from_ms.map(|ms| ms.to_string()));
        self.set(END_KEY, criteria.to_ms.map(|ms| ms.to_string()));
        let tags = if criteria.tags.is_empty() {
            None
        } else {
            serde_json::to_string(&criteria.tags).ok()
        };
        self.set(TAGS_KEY, tags);
    }

    /// Reads filter state from the query string. Flags come from `base`.
    /// An undecodable tag filter falls back to empty and is reported.
    pub fn criteria(&self, base: &FilterCriteria) -> (FilterCriteria, Option<EngineError>) {
        let mut criteria = FilterCriteria {
            flags: base.flags.clone(),
            flag_ids: base.flag_ids.clone(),
            ..FilterCriteria::default()
        };
        criteria.set_service(self.get(SERVICE_KEY).map(str::to_string));
        criteria.set_text(self.get(TEXT_KEY).unwrap_or_default());
        criteria.from_ms = self.get(START_KEY).and_then(|v| v.trim().parse().ok());
        criteria.to_ms = self.get(END_KEY).and_then(|v| v.trim().parse().ok());

        let mut error = None;
        if let Some(raw) = self.get(TAGS_KEY) {
            match serde_json::from_str::<TagFilter>(raw) {
                Ok(tags) => criteria.tags = tags.normalize(),
                Err(err) => {
                    error = Some(EngineError::MalformedFilterState(format!(
                        "{TAGS_KEY}={raw}: {err}"
                    )));
                }
            }
        }
        (criteria, error)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.flow_id {
            Some(id) => write!(f, "/{FLOW_SEGMENT}/{id}")?,
            None => f.write_str("/")?,
        }
        if !self.query.is_empty() {
            write!(f, "?{}", self.query_string())?;
        }
        Ok(())
    }
}

/// Back/forward stacks over locations.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Location>,
    cursor: usize,
}

impl History {
    pub fn new(initial: Location) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    pub fn current(&self) -> &Location {
        &self.entries[self.cursor]
    }

    pub fn navigate(&mut self, location: Location, mode: RouteMode) {
        match mode {
            RouteMode::Push => self.push(location),
            RouteMode::Replace => self.replace(location),
        }
    }

    pub fn push(&mut self, location: Location) {
        if *self.current() == location {
            return;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(location);
        self.cursor = self.entries.len() - 1;
    }

    pub fn replace(&mut self, location: Location) {
        self.entries[self.cursor] = location;
    }

    pub fn back(&mut self) -> Option<&Location> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&Location> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flow_path_and_query() {
        let location = Location::parse("/flow/65f0aa?service=web&text=flag%7B&from=10&to=20");
        assert_eq!(location.flow_id, Some(FlowId::new("65f0aa")));
        assert_eq!(location.get(SERVICE_KEY), Some("web"));
        assert_eq!(location.get(TEXT_KEY), Some("flag{"));

        let (criteria, error) = location.criteria(&FilterCriteria::default());
        assert!(error.is_none());
        assert_eq!(criteria.service.as_deref(), Some("web"));
        assert_eq!(criteria.text.as_deref(), Some("flag{"));
        assert_eq!(criteria.from_ms, Some(10));
        assert_eq!(criteria.to_ms, Some(20));
    }

    #[test]
    fn root_location_has_no_flow() {
        assert_eq!(Location::parse("").flow_id, None);
        assert_eq!(Location::parse("/").to_string(), "/");
        assert_eq!(Location::parse("/diff/abc").flow_id, None);
    }

    #[test]
    fn criteria_round_trip_through_query_string() {
        let mut criteria = FilterCriteria::default();
        criteria.set_service(Some("pwn".into()));
        criteria.tags.toggle("flag-out");
        criteria.tags.toggle("blocked");
        criteria.tags.toggle("blocked");
        criteria.from_ms = Some(1_700_000_000_000);

        let mut location = Location::default();
        location.apply_criteria(&criteria);
        let reparsed = Location::parse(&location.with_flow_id("abc".into()).to_string());
        let (decoded, error) = reparsed.criteria(&FilterCriteria::default());
        assert!(error.is_none());
        assert_eq!(decoded, criteria);
        assert_eq!(reparsed.flow_id, Some(FlowId::new("abc")));
    }

    #[test]
    fn empty_tag_filter_is_not_written() {
        let mut location = Location::parse("/?tags=%7B%22include%22%3A%5B%22a%22%5D%7D");
        location.apply_criteria(&FilterCriteria::default());
        assert_eq!(location.get(TAGS_KEY), None);
    }

    #[test]
    fn malformed_tags_fall_back_to_empty() {
        let location = Location::parse("/?tags=not-json&service=web");
        let (criteria, error) = location.criteria(&FilterCriteria::default());
        assert!(matches!(error, Some(EngineError::MalformedFilterState(_))));
        assert!(criteria.tags.is_empty());
        assert_eq!(criteria.service.as_deref(), Some("web"));
    }

    #[test]
    fn with_flow_id_keeps_unrelated_keys() {
        let location = Location::parse("/flow/a?first=x&service=web");
        let moved = location.with_flow_id("b".into());
        assert_eq!(moved.to_string(), "/flow/b?first=x&service=web");
    }

    #[test]
    fn history_push_truncates_forward_entries() {
        let mut history = History::new(Location::parse("/flow/a"));
        history.push(Location::parse("/flow/b"));
        history.push(Location::parse("/flow/c"));
        assert_eq!(history.back().map(ToString::to_string).as_deref(), Some("/flow/b"));

        history.push(Location::parse("/flow/d"));
        assert!(history.forward().is_none());
        assert_eq!(history.len(), 3);

        history.replace(Location::parse("/flow/e"));
        assert_eq!(history.current().to_string(), "/flow/e");
        assert_eq!(history.back().map(ToString::to_string).as_deref(), Some("/flow/b"));
    }

    #[test]
    fn pushing_current_location_is_ignored() {
        let mut history = History::new(Location::parse("/flow/a"));
        history.push(Location::parse("/flow/a"));
        assert_eq!(history.len(), 1);
    }
}
