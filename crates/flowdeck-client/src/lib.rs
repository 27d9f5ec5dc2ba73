//! HTTP client for the Tulip flow API.

use flowdeck_core::{
    EngineError, FlowDirectory, FlowId, FlowMutations, FlowSource, Page, SearchQuery, Service,
    TickInfo,
};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("flowdeck/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid api url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        EngineError::Network(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct TulipClient {
    http: reqwest::Client,
    base: Url,
}

impl TulipClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(base_url.trim()).map_err(|err| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base url".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base url with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    pub async fn search_flows(&self, query: &SearchQuery) -> Result<Page, ClientError> {
        let url = self.endpoint(&["query"]);
        debug!(offset = query.offset, limit = query.limit, "tulip_query");
        let response = self.http.post(url).json(query).send().await?;
        decode(response).await
    }

    pub async fn star(&self, id: &FlowId, starred: bool) -> Result<(), ClientError> {
        let flag = if starred { "1" } else { "0" };
        let url = self.endpoint(&["star", id.as_str(), flag]);
        let response = self.http.get(url).send().await?;
        check_status(response).await.map(|_| ())
    }

    pub async fn list_tags(&self) -> Result<Vec<String>, ClientError> {
        self.get_json(&["tags"]).await
    }

    pub async fn list_services(&self) -> Result<Vec<Service>, ClientError> {
        self.get_json(&["services"]).await
    }

    pub async fn get_tick_info(&self) -> Result<TickInfo, ClientError> {
        self.get_json(&["tick_info"]).await
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let response = self.http.get(self.endpoint(segments)).send().await?;
        decode(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let bytes = check_status(response).await?.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode(err.to_string()))
}

impl FlowSource for TulipClient {
    fn search(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<Page, EngineError>> + Send {
        let query = query.clone();
        let client = self.clone();
        async move { client.search_flows(&query).await.map_err(EngineError::from) }
    }
}

impl FlowMutations for TulipClient {
    fn set_star(
        &self,
        id: &FlowId,
        starred: bool,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        let id = id.clone();
        let client = self.clone();
        async move { client.star(&id, starred).await.map_err(EngineError::from) }
    }
}

impl FlowDirectory for TulipClient {
    fn tags(&self) -> impl Future<Output = Result<Vec<String>, EngineError>> + Send {
        let client = self.clone();
        async move { client.list_tags().await.map_err(EngineError::from) }
    }

    fn services(&self) -> impl Future<Output = Result<Vec<Service>, EngineError>> + Send {
        let client = self.clone();
        async move { client.list_services().await.map_err(EngineError::from) }
    }

    fn tick_info(&self) -> impl Future<Output = Result<TickInfo, EngineError>> + Send {
        let client = self.clone();
        async move { client.get_tick_info().await.map_err(EngineError::from) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> TulipClient {
        TulipClient::new(base, Duration::from_secs(1)).expect("client builds")
    }

    #[test]
    fn endpoint_appends_segments_to_base_path() {
        let api = client("http://tulip.local:5000/api");
        assert_eq!(
            api.endpoint(&["query"]).as_str(),
            "http://tulip.local:5000/api/query"
        );
        let api = client("http://tulip.local/api/");
        assert_eq!(
            api.endpoint(&["star", "65f0", "1"]).as_str(),
            "http://tulip.local/api/star/65f0/1"
        );
    }

    #[test]
    fn endpoint_encodes_path_segments() {
        let api = client("http://tulip.local");
        assert_eq!(
            api.endpoint(&["star", "a/b", "0"]).as_str(),
            "http://tulip.local/star/a%2Fb/0"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(matches!(
            TulipClient::new("mailto:ops@example.com", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            TulipClient::new("not a url", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn client_errors_surface_as_network_errors() {
        let err: EngineError = ClientError::Status {
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        assert_eq!(err, EngineError::Network("api returned 500: boom".to_string()));
    }
}
