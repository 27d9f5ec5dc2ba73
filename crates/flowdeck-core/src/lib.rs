pub mod engine;
pub mod error;
pub mod filter;
pub mod model;
pub mod route;
pub mod source;
pub mod tick;

pub use engine::{Direction, Effect, Engine, EngineConfig, Event, FetchKind, FetchRequest};
pub use error::EngineError;
pub use filter::{FilterCriteria, SearchQuery, TagFilter};
pub use model::{FlowId, FlowSummary, Page, Service, ServiceDirectory, TickInfo};
pub use route::{History, Location, RouteMode, RouteUpdate};
pub use source::{
    FlowDirectory, FlowMutations, FlowSource, ScrollCoordinator, ScrollDone, ScrollMode,
};
pub use tick::TickClock;
