use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("network error: {0}")]
    Network(String),
    #[error("stale response from generation {issued}, current generation is {current}")]
    StaleResponse { issued: u64, current: u64 },
    #[error("malformed filter state: {0}")]
    MalformedFilterState(String),
}

impl EngineError {
    pub fn network(message: impl Into<String>) -> Self {
        EngineError::Network(message.into())
    }

    pub fn is_network(&self) -> bool {
        matches!(self, EngineError::Network(_))
    }
}
