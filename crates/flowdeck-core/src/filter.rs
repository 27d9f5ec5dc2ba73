use crate::model::ServiceDirectory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Include/exclude tag sets. A tag lives in at most one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    Off,
    Included,
    Excluded,
}

impl TagFilter {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn state(&self, tag: &str) -> TagState {
        if self.include.iter().any(|t| t == tag) {
            TagState::Included
        } else if self.exclude.iter().any(|t| t == tag) {
            TagState::Excluded
        } else {
            TagState::Off
        }
    }

    /// Off -> included -> excluded -> off.
    pub fn toggle(&mut self, tag: &str) {
        match self.state(tag) {
            TagState::Included => {
                self.include.retain(|t| t != tag);
                self.exclude.push(tag.to_string());
            }
            TagState::Excluded => {
                self.exclude.retain(|t| t != tag);
            }
            TagState::Off => {
                self.include.push(tag.to_string());
            }
        }
    }

    /// Restores disjointness after decoding untrusted input; include wins.
    pub fn normalize(mut self) -> Self {
        let mut seen = BTreeSet::new();
        self.include.retain(|tag| seen.insert(tag.clone()));
        self.exclude.retain(|tag| seen.insert(tag.clone()));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub text: Option<String>,
    /// Unix ms, inclusive.
    pub from_ms: Option<i64>,
    /// Unix ms, exclusive.
    pub to_ms: Option<i64>,
    pub service: Option<String>,
    pub tags: TagFilter,
    pub flags: BTreeSet<String>,
    pub flag_ids: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn set_text(&mut self, text: &str) {
        self.text = if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        };
    }

    pub fn set_service(&mut self, service: Option<String>) {
        self.service = service.filter(|name| !name.is_empty() && name != "all");
    }

    pub fn toggle_flag(&mut self, flag: &str) {
        if !self.flags.remove(flag) {
            self.flags.insert(flag.to_string());
        }
    }

    pub fn toggle_flag_id(&mut self, flag_id: &str) {
        if !self.flag_ids.remove(flag_id) {
            self.flag_ids.insert(flag_id.to_string());
        }
    }

    pub fn clear_time_range(&mut self) {
        self.from_ms = None;
        self.to_ms = None;
    }
}

/// Wire body of `POST /query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    #[serde(rename = "flow.data", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_time: Option<i64>,
    pub service: String,
    pub tags: Vec<String>,
    #[serde(rename = "includeTags")]
    pub include_tags: Vec<String>,
    #[serde(rename = "excludeTags")]
    pub exclude_tags: Vec<String>,
    pub flags: Vec<String>,
    pub flagids: Vec<String>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchQuery {
    pub fn from_criteria(
        criteria: &FilterCriteria,
        services: &ServiceDirectory,
        limit: usize,
        offset: usize,
    ) -> Self {
        let service = criteria
            .service
            .as_deref()
            .and_then(|name| services.by_name(name));
        Self {
            text: criteria.text.clone(),
            dst_ip: service.map(|s| s.ip.clone()).filter(|ip| !ip.is_empty()),
            dst_port: service.map(|s| s.port).filter(|port| *port != 0),
            from_time: criteria.from_ms,
            to_time: criteria.to_ms,
            service: service.map(|s| s.name.clone()).unwrap_or_default(),
            tags: criteria.tags.include.clone(),
            include_tags: criteria.tags.include.clone(),
            exclude_tags: criteria.tags.exclude.clone(),
            flags: criteria.flags.iter().cloned().collect(),
            flagids: criteria.flag_ids.iter().cloned().collect(),
            limit,
            offset,
        }
    }

    /// Same query with the pagination window removed, for change detection.
    pub fn without_window(&self) -> Self {
        Self {
            limit: 0,
            offset: 0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Service;

    #[test]
    fn toggle_cycles_and_stays_disjoint() {
        let mut tags = TagFilter::default();
        tags.toggle("flag-in");
        assert_eq!(tags.state("flag-in"), TagState::Included);
        tags.toggle("flag-in");
        assert_eq!(tags.state("flag-in"), TagState::Excluded);
        assert!(tags.include.is_empty());
        tags.toggle("flag-in");
        assert_eq!(tags.state("flag-in"), TagState::Off);
        assert!(tags.is_empty());
    }

    #[test]
    fn normalize_prefers_include_and_drops_duplicates() {
        let tags = TagFilter {
            include: vec!["a".into(), "b".into(), "a".into()],
            exclude: vec!["b".into(), "c".into()],
        }
        .normalize();
        assert_eq!(tags.include, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(tags.exclude, vec!["c".to_string()]);
    }

    #[test]
    fn query_resolves_service_and_skips_empty_fields() {
        let services = ServiceDirectory::new(vec![Service {
            name: "web".into(),
            ip: "10.0.0.1".into(),
            port: 8080,
        }]);
        let mut criteria = FilterCriteria::default();
        criteria.set_service(Some("web".into()));
        criteria.tags.toggle("starred");
        criteria.toggle_flag("FLAG{x}");

        let query = SearchQuery::from_criteria(&criteria, &services, 50, 100);
        let body = serde_json::to_value(&query).expect("query serializes");
        assert_eq!(body["dst_ip"], "10.0.0.1");
        assert_eq!(body["dst_port"], 8080);
        assert_eq!(body["service"], "web");
        assert_eq!(body["includeTags"], serde_json::json!(["starred"]));
        assert_eq!(body["tags"], serde_json::json!(["starred"]));
        assert_eq!(body["flags"], serde_json::json!(["FLAG{x}"]));
        assert_eq!(body["limit"], 50);
        assert_eq!(body["offset"], 100);
        assert!(body.get("flow.data").is_none());
        assert!(body.get("from_time").is_none());
    }

    #[test]
    fn unknown_service_sends_no_destination() {
        let mut criteria = FilterCriteria::default();
        criteria.set_service(Some("ghost".into()));
        criteria.set_text("flag\\{");
        let query = SearchQuery::from_criteria(&criteria, &ServiceDirectory::default(), 50, 0);
        assert_eq!(query.dst_ip, None);
        assert_eq!(query.dst_port, None);
        assert_eq!(query.service, "");
        assert_eq!(query.text.as_deref(), Some("flag\\{"));
    }

    #[test]
    fn all_service_clears_selection() {
        let mut criteria = FilterCriteria::default();
        criteria.set_service(Some("web".into()));
        criteria.set_service(Some("all".into()));
        assert_eq!(criteria.service, None);
    }
}
