use futures::future::BoxFuture;

use super::types::{FetchError, ItemResponse, ItemSubtype, LineageRequest, LineageResponse};

pub trait LineageService: Send + Sync {
    fn fetch_lineage(
        &self,
        start_id: &str,
        request: LineageRequest,
    ) -> BoxFuture<'static, Result<LineageResponse, FetchError>>;
}

pub trait ItemService: Send + Sync {
    fn fetch_item(
        &self,
        id: &str,
        subtype: Option<ItemSubtype>,
    ) -> BoxFuture<'static, Result<ItemResponse, FetchError>>;
}

/// Produces a downloadable document describing a node's lineage.
pub trait ReportService: Send + Sync {
    fn generate_report(
        &self,
        id: &str,
        subtype: ItemSubtype,
        depth: u32,
    ) -> BoxFuture<'static, Result<Vec<u8>, FetchError>>;
}
