use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::service::{ItemService, LineageService};
use super::types::{FetchError, ItemSubtype, LineageFragment, QueryType, RegistryItem};

pub type FragmentResult = Result<Arc<LineageFragment>, FetchError>;
pub type ItemResult = Result<Arc<RegistryItem>, FetchError>;
pub type SharedFragment = Shared<BoxFuture<'static, FragmentResult>>;
pub type SharedItem = Shared<BoxFuture<'static, ItemResult>>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub query: QueryType,
    pub id: String,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.query.key(), self.id)
    }
}

/// Snapshot of a memoized fetch, taken without blocking.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryState<T> {
    Pending,
    Ready(T),
    Failed(FetchError),
}

impl<T: 'static> QueryState<Arc<T>> {
    pub fn of(shared: &Shared<BoxFuture<'static, Result<Arc<T>, FetchError>>>) -> Self {
        match shared.peek() {
            None => Self::Pending,
            Some(Ok(value)) => Self::Ready(Arc::clone(value)),
            Some(Err(error)) => Self::Failed(error.clone()),
        }
    }
}

/// Polls newly created fetches to completion and wakes the UI when each settles.
#[derive(Clone)]
pub struct FetchDriver {
    runtime: Handle,
    notify: Arc<dyn Fn() + Send + Sync>,
}

impl FetchDriver {
    pub fn new(runtime: Handle, notify: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self { runtime, notify }
    }

    fn drive<T: Clone + Send + Sync + 'static>(&self, shared: Shared<BoxFuture<'static, T>>) {
        let notify = Arc::clone(&self.notify);
        self.runtime.spawn(async move {
            let _ = shared.await;
            notify();
        });
    }
}

/// Memoizes lineage and item fetches so that each key is requested at most once.
///
/// Entries are never evicted: a key that has been requested keeps handing out the
/// same shared future for the lifetime of the dispatcher.
pub struct LineageDispatcher {
    lineage: Arc<dyn LineageService>,
    items: Arc<dyn ItemService>,
    driver: Option<FetchDriver>,
    fragments: HashMap<QueryKey, SharedFragment>,
    loaded_items: HashMap<String, SharedItem>,
}

impl LineageDispatcher {
    pub fn new(lineage: Arc<dyn LineageService>, items: Arc<dyn ItemService>) -> Self {
        Self {
            lineage,
            items,
            driver: None,
            fragments: HashMap::new(),
            loaded_items: HashMap::new(),
        }
    }

    pub fn with_driver(mut self, driver: FetchDriver) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn resolve(&mut self, id: &str, query: QueryType) -> SharedFragment {
        let key = QueryKey {
            query,
            id: id.to_owned(),
        };
        if let Some(existing) = self.fragments.get(&key) {
            return existing.clone();
        }

        debug!(%key, "dispatching lineage query");
        let request = query.request();
        let pending = self.lineage.fetch_lineage(id, request);
        let label = key.to_string();
        let shared = async move {
            let outcome = pending
                .await
                .and_then(|response| response.into_fragment())
                .map(Arc::new);
            if let Err(error) = &outcome {
                warn!(key = %label, %error, "lineage query failed");
            }
            outcome
        }
        .boxed()
        .shared();

        if let Some(driver) = &self.driver {
            driver.drive(shared.clone());
        }
        self.fragments.insert(key, shared.clone());
        shared
    }

    pub fn resolve_item(&mut self, id: &str, subtype: Option<ItemSubtype>) -> SharedItem {
        if let Some(existing) = self.loaded_items.get(id) {
            return existing.clone();
        }

        debug!(id, "loading item details");
        let pending = self.items.fetch_item(id, subtype);
        let label = id.to_owned();
        let shared = async move {
            let outcome = pending
                .await
                .and_then(|response| response.into_item())
                .map(Arc::new);
            if let Err(error) = &outcome {
                warn!(id = %label, %error, "item fetch failed");
            }
            outcome
        }
        .boxed()
        .shared();

        if let Some(driver) = &self.driver {
            driver.drive(shared.clone());
        }
        self.loaded_items.insert(id.to_owned(), shared.clone());
        shared
    }

    pub fn item_state(&self, id: &str) -> Option<QueryState<Arc<RegistryItem>>> {
        self.loaded_items.get(id).map(QueryState::of)
    }

    pub fn cached_queries(&self) -> usize {
        self.fragments.len()
    }

    #[cfg(test)]
    pub(crate) fn pending_items(&self) -> Vec<SharedItem> {
        self.loaded_items
            .values()
            .filter(|item| item.peek().is_none())
            .cloned()
            .collect()
    }

    pub fn settled_items(&self) -> usize {
        self.loaded_items
            .values()
            .filter(|item| item.peek().is_some())
            .count()
    }
}
