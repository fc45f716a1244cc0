mod dispatcher;
mod fixture;
mod service;
mod types;

pub use dispatcher::{FetchDriver, LineageDispatcher, QueryState, SharedFragment};
pub use fixture::{FixtureRegistry, SAMPLE_REGISTRY};
pub use service::{ItemService, LineageService, ReportService};
pub use types::{
    FetchError, GraphLink, GraphNode, ItemCategory, ItemSubtype, LineageFragment, QueryType,
    RegistryItem,
};

#[cfg(test)]
pub use types::{ItemResponse, LineageRequest, LineageResponse, ResponseStatus};
