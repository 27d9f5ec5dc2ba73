use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Object id the API uses for "no linked flow".
pub const NULL_FLOW_ID: &str = "000000000000000000000000";
pub const UNKNOWN_SERVICE: &str = "unknown";
pub const STARRED_TAG: &str = "starred";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn null() -> Self {
        Self(NULL_FLOW_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty() || self.0 == NULL_FLOW_ID
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FlowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSummary {
    #[serde(rename = "_id")]
    pub id: FlowId,
    #[serde(default)]
    pub src_ip: String,
    #[serde(default)]
    pub src_port: u16,
    #[serde(default)]
    pub dst_ip: String,
    #[serde(default)]
    pub dst_port: u16,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub time: i64,
    /// Milliseconds.
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub num_packets: u64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub flagids: Vec<String>,
    #[serde(default)]
    pub parent_id: FlowId,
    #[serde(default)]
    pub child_id: FlowId,
    #[serde(default)]
    pub filename: String,
    #[serde(default = "unknown_service_tag", skip_serializing)]
    pub service_tag: String,
}

fn unknown_service_tag() -> String {
    UNKNOWN_SERVICE.to_string()
}

impl FlowSummary {
    pub fn is_starred(&self) -> bool {
        self.tags.contains(STARRED_TAG)
    }

    pub fn has_links(&self) -> bool {
        !self.parent_id.is_null() || !self.child_id.is_null()
    }

    /// Tags without the ones rendered as dedicated markers.
    pub fn display_tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .map(String::as_str)
            .filter(|tag| *tag != STARRED_TAG)
    }
}

/// One fetched page, in server order.
pub type Page = Vec<FlowSummary>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDirectory {
    services: Vec<Service>,
}

impl ServiceDirectory {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    pub fn by_name(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.name == name)
    }

    pub fn tag_for(&self, ip: &str, port: u16) -> &str {
        self.services
            .iter()
            .find(|service| service.ip == ip && service.port == port)
            .map(|service| service.name.as_str())
            .unwrap_or(UNKNOWN_SERVICE)
    }

    pub fn annotate(&self, flow: &mut FlowSummary) {
        flow.service_tag = self.tag_for(&flow.dst_ip, flow.dst_port).to_string();
    }

    /// Service name after `current` in directory order; `None` means "all".
    pub fn next_name(&self, current: Option<&str>) -> Option<String> {
        let position = current.and_then(|name| {
            self.services
                .iter()
                .position(|service| service.name == name)
        });
        let next = match position {
            Some(idx) => idx + 1,
            None => 0,
        };
        self.services.get(next).map(|service| service.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickInfo {
    pub start_date: String,
    pub tick_length: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services() -> ServiceDirectory {
        ServiceDirectory::new(vec![
            Service {
                name: "web".to_string(),
                ip: "10.0.0.1".to_string(),
                port: 80,
            },
            Service {
                name: "pwn".to_string(),
                ip: "10.0.0.1".to_string(),
                port: 1337,
            },
        ])
    }

    #[test]
    fn flow_summary_parses_api_payload() {
        let raw = serde_json::json!({
            "_id": "65f0c1d2e3a4b5c6d7e8f901",
            "src_ip": "10.0.0.7",
            "src_port": 41522,
            "dst_ip": "10.0.0.1",
            "dst_port": 80,
            "time": 1_700_000_000_123i64,
            "duration": 42,
            "num_packets": 9,
            "parent_id": NULL_FLOW_ID,
            "child_id": "65f0c1d2e3a4b5c6d7e8f902",
            "tags": ["starred", "flag-out"],
            "flags": ["FLAG{abc}"],
            "flagids": [],
            "filename": "dump-01.pcap",
            "flow": [{"from": "c", "data": "GET /", "b64": "", "time": 1}]
        });

        let flow: FlowSummary = serde_json::from_value(raw).expect("flow parses");
        assert_eq!(flow.id.as_str(), "65f0c1d2e3a4b5c6d7e8f901");
        assert_eq!(flow.service_tag, UNKNOWN_SERVICE);
        assert!(flow.is_starred());
        assert!(flow.has_links());
        assert_eq!(flow.display_tags().collect::<Vec<_>>(), vec!["flag-out"]);
    }

    #[test]
    fn missing_links_default_to_null_sentinel() {
        let flow: FlowSummary =
            serde_json::from_value(serde_json::json!({ "_id": "a" })).expect("flow parses");
        assert!(flow.parent_id.is_null());
        assert!(flow.child_id.is_null());
        assert!(!flow.has_links());
    }

    #[test]
    fn annotate_joins_on_destination() {
        let directory = services();
        let value = serde_json::json!({ "_id": "a", "dst_ip": "10.0.0.1", "dst_port": 1337 });
        let mut flow: FlowSummary = serde_json::from_value(value).expect("flow parses");
        directory.annotate(&mut flow);
        assert_eq!(flow.service_tag, "pwn");

        flow.dst_port = 22;
        directory.annotate(&mut flow);
        assert_eq!(flow.service_tag, UNKNOWN_SERVICE);
    }

    #[test]
    fn next_name_cycles_through_all() {
        let directory = services();
        assert_eq!(directory.next_name(None).as_deref(), Some("web"));
        assert_eq!(directory.next_name(Some("web")).as_deref(), Some("pwn"));
        assert_eq!(directory.next_name(Some("pwn")), None);
        assert_eq!(directory.next_name(Some("gone")).as_deref(), Some("web"));
    }
}
