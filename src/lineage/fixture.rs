use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::service::{ItemService, LineageService, ReportService};
use super::types::{
    Direction, FetchError, GraphLink, GraphNode, ItemResponse, ItemSubtype, LineageFragment,
    LineageRequest, LineageResponse, RegistryItem, ResponseStatus, TargetFilter,
};

pub const SAMPLE_REGISTRY: &str = include_str!("../../demos/sample_registry.json");

#[derive(Debug, Deserialize)]
struct FixtureDocument {
    items: Vec<RegistryItem>,
    #[serde(default)]
    links: Vec<GraphLink>,
}

/// In-process registry that answers lineage, item and report requests from a JSON document.
pub struct FixtureRegistry {
    items: HashMap<String, RegistryItem>,
    outgoing: HashMap<String, Vec<GraphLink>>,
    incoming: HashMap<String, Vec<GraphLink>>,
    latency: Duration,
}

struct Traversal {
    visited: Vec<String>,
    links: Vec<GraphLink>,
}

impl FixtureRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry fixture {}", path.display()))?;
        Self::parse(&raw)
            .with_context(|| format!("failed to parse registry fixture {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let document: FixtureDocument =
            serde_json::from_str(raw).context("invalid registry fixture JSON")?;
        if document.items.is_empty() {
            return Err(anyhow!("registry fixture contains no items"));
        }

        let mut items = HashMap::with_capacity(document.items.len());
        for item in document.items {
            if item.id.is_empty() {
                return Err(anyhow!("registry fixture contains an item with an empty id"));
            }
            if items.insert(item.id.clone(), item).is_some() {
                warn!("registry fixture repeats an item id; keeping the last entry");
            }
        }

        let mut outgoing: HashMap<String, Vec<GraphLink>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<GraphLink>> = HashMap::new();
        let mut seen_pairs = HashSet::new();
        for link in document.links {
            if !items.contains_key(&link.source) || !items.contains_key(&link.target) {
                warn!(
                    source = %link.source,
                    target = %link.target,
                    "skipping fixture link with unknown endpoint"
                );
                continue;
            }
            if !seen_pairs.insert((link.source.clone(), link.target.clone())) {
                continue;
            }

            outgoing
                .entry(link.source.clone())
                .or_default()
                .push(link.clone());
            incoming.entry(link.target.clone()).or_default().push(link);
        }

        info!(
            items = items.len(),
            links = seen_pairs.len(),
            "loaded registry fixture"
        );

        Ok(Self {
            items,
            outgoing,
            incoming,
            latency: Duration::ZERO,
        })
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Picks a default root: the first dataset by id, or the first item overall.
    pub fn default_root(&self) -> Option<String> {
        let mut ids = self.items.keys().collect::<Vec<_>>();
        ids.sort();
        ids.iter()
            .find(|id| {
                self.items
                    .get(id.as_str())
                    .is_some_and(|item| item.item_subtype == ItemSubtype::Dataset)
            })
            .or_else(|| ids.first())
            .map(|id| (*id).clone())
    }

    fn graph_node(&self, id: &str) -> Option<GraphNode> {
        self.items.get(id).map(|item| GraphNode {
            id: item.id.clone(),
            item_category: item.item_category,
            item_subtype: item.item_subtype,
            details: None,
        })
    }

    fn traverse(&self, start: &str, direction: Direction, depth: u32) -> Traversal {
        let mut visited = vec![start.to_owned()];
        let mut seen = HashSet::from([start.to_owned()]);
        let mut links = Vec::new();
        let mut queue = VecDeque::from([(start.to_owned(), 0u32)]);

        while let Some((node_id, level)) = queue.pop_front() {
            if level >= depth {
                continue;
            }

            let adjacent = match direction {
                Direction::Upstream => self.incoming.get(&node_id),
                Direction::Downstream => self.outgoing.get(&node_id),
            };

            for link in adjacent.into_iter().flatten() {
                let next = match direction {
                    Direction::Upstream => &link.source,
                    Direction::Downstream => &link.target,
                };
                links.push(link.clone());
                if seen.insert(next.clone()) {
                    visited.push(next.clone());
                    queue.push_back((next.clone(), level + 1));
                }
            }
        }

        Traversal { visited, links }
    }

    /// Keeps only the part of a traversal that leads from `start` to a node matching `target`.
    fn prune_to_targets(
        &self,
        start: &str,
        direction: Direction,
        target: TargetFilter,
        traversal: Traversal,
    ) -> Traversal {
        let mut keep = traversal
            .visited
            .iter()
            .filter(|id| id.as_str() != start)
            .filter(|id| {
                self.graph_node(id)
                    .is_some_and(|node| target.matches(&node))
            })
            .cloned()
            .collect::<HashSet<_>>();

        loop {
            let mut changed = false;
            for link in &traversal.links {
                let (from, to) = match direction {
                    Direction::Upstream => (&link.target, &link.source),
                    Direction::Downstream => (&link.source, &link.target),
                };
                if keep.contains(to) && !keep.contains(from) {
                    keep.insert(from.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        keep.insert(start.to_owned());

        let visited = traversal
            .visited
            .into_iter()
            .filter(|id| keep.contains(id))
            .collect();
        let links = traversal
            .links
            .into_iter()
            .filter(|link| keep.contains(&link.source) && keep.contains(&link.target))
            .collect();
        Traversal { visited, links }
    }

    fn fragment_for(&self, traversal: Traversal) -> LineageFragment {
        LineageFragment {
            nodes: traversal
                .visited
                .iter()
                .filter_map(|id| self.graph_node(id))
                .collect(),
            links: traversal.links,
        }
    }

    pub fn lineage(&self, start_id: &str, request: LineageRequest) -> LineageResponse {
        if !self.items.contains_key(start_id) {
            return LineageResponse {
                status: ResponseStatus::failed(format!(
                    "no registry item with handle {start_id}"
                )),
                graph: None,
            };
        }

        let traversal = match request {
            LineageRequest::Explore { direction, depth } => {
                self.traverse(start_id, direction, depth)
            }
            LineageRequest::Special {
                direction,
                target,
                depth,
            } => {
                let traversal = self.traverse(start_id, direction, depth);
                self.prune_to_targets(start_id, direction, target, traversal)
            }
        };

        let fragment = self.fragment_for(traversal);
        debug!(
            start_id,
            ?request,
            nodes = fragment.nodes.len(),
            links = fragment.links.len(),
            "answered lineage query from fixture"
        );
        LineageResponse {
            status: ResponseStatus::ok(),
            graph: Some(fragment),
        }
    }

    fn delayed<T: Send + 'static>(&self, value: T) -> BoxFuture<'static, T> {
        let latency = self.latency;
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            value
        }
        .boxed()
    }
}

impl LineageService for FixtureRegistry {
    fn fetch_lineage(
        &self,
        start_id: &str,
        request: LineageRequest,
    ) -> BoxFuture<'static, Result<LineageResponse, FetchError>> {
        self.delayed(Ok(self.lineage(start_id, request)))
    }
}

impl ItemService for FixtureRegistry {
    fn fetch_item(
        &self,
        id: &str,
        subtype: Option<ItemSubtype>,
    ) -> BoxFuture<'static, Result<ItemResponse, FetchError>> {
        let response = match self.items.get(id) {
            Some(item) if subtype.is_none_or(|expected| expected == item.item_subtype) => {
                ItemResponse {
                    status: ResponseStatus::ok(),
                    item: Some(item.clone()),
                }
            }
            Some(item) => ItemResponse {
                status: ResponseStatus::failed(format!(
                    "item {id} is a {}, not the requested subtype",
                    item.item_subtype.label()
                )),
                item: None,
            },
            None => ItemResponse {
                status: ResponseStatus::failed(format!("no registry item with handle {id}")),
                item: None,
            },
        };
        self.delayed(Ok(response))
    }
}

impl ReportService for FixtureRegistry {
    fn generate_report(
        &self,
        id: &str,
        subtype: ItemSubtype,
        depth: u32,
    ) -> BoxFuture<'static, Result<Vec<u8>, FetchError>> {
        let Some(item) = self.items.get(id) else {
            return self.delayed(Err(FetchError::Backend(format!(
                "cannot generate a report for unknown handle {id}"
            ))));
        };

        let upstream = self.fragment_for(self.traverse(id, Direction::Upstream, depth));
        let downstream = self.fragment_for(self.traverse(id, Direction::Downstream, depth));
        let report = json!({
            "id": id,
            "display_name": item.display_name,
            "item_subtype": subtype,
            "depth": depth,
            "summary": {
                "upstream_nodes": upstream.nodes.len().saturating_sub(1),
                "upstream_links": upstream.links.len(),
                "downstream_nodes": downstream.nodes.len().saturating_sub(1),
                "downstream_links": downstream.links.len(),
            },
            "upstream": upstream,
            "downstream": downstream,
        });

        let rendered = serde_json::to_vec_pretty(&report)
            .map_err(|error| FetchError::MalformedResponse(error.to_string()));
        self.delayed(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::types::QueryType;

    const CHAIN: &str = r#"{
        "items": [
            {"id": "P", "item_category": "AGENT", "item_subtype": "PERSON", "display_name": "Ada"},
            {"id": "D0", "item_category": "ENTITY", "item_subtype": "DATASET", "display_name": "raw"},
            {"id": "R1", "item_category": "ACTIVITY", "item_subtype": "MODEL_RUN", "display_name": "run 1"},
            {"id": "D1", "item_category": "ENTITY", "item_subtype": "DATASET", "display_name": "derived"},
            {"id": "M", "item_category": "ENTITY", "item_subtype": "MODEL", "display_name": "model"}
        ],
        "links": [
            {"source": "D0", "target": "R1", "type": "used"},
            {"source": "M", "target": "R1", "type": "used"},
            {"source": "P", "target": "R1", "type": "wasAssociatedWith"},
            {"source": "R1", "target": "D1", "type": "wasGeneratedBy"},
            {"source": "R1", "target": "D1", "type": "duplicate"},
            {"source": "D1", "target": "ghost", "type": "used"}
        ]
    }"#;

    fn registry() -> FixtureRegistry {
        FixtureRegistry::parse(CHAIN).expect("valid fixture")
    }

    fn ids(fragment: &LineageFragment) -> Vec<&str> {
        let mut ids = fragment.nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>();
        ids.sort();
        ids
    }

    #[test]
    fn explore_upstream_is_one_hop() {
        let response = registry().lineage("D1", QueryType::ExploreUpstream.request());
        let fragment = response.into_fragment().expect("success");
        assert_eq!(ids(&fragment), vec!["D1", "R1"]);
        assert_eq!(fragment.links.len(), 1);
        assert_eq!(fragment.links[0].kind, "wasGeneratedBy");
    }

    #[test]
    fn special_dataset_query_prunes_non_dataset_branches() {
        let response = registry().lineage("D1", QueryType::UpstreamDataset.request());
        let fragment = response.into_fragment().expect("success");
        assert_eq!(ids(&fragment), vec!["D0", "D1", "R1"]);
        assert!(fragment.links.iter().all(|l| l.source != "M" && l.source != "P"));
    }

    #[test]
    fn special_agent_query_keeps_path_to_agent() {
        let response = registry().lineage("D1", QueryType::UpstreamAgent.request());
        let fragment = response.into_fragment().expect("success");
        assert_eq!(ids(&fragment), vec!["D1", "P", "R1"]);
    }

    #[test]
    fn unknown_start_is_a_logical_failure() {
        let response = registry().lineage("nope", QueryType::ExploreDownstream.request());
        assert!(!response.status.success);
        assert!(matches!(response.into_fragment(), Err(FetchError::Backend(_))));
    }

    #[test]
    fn default_root_prefers_datasets() {
        assert_eq!(registry().default_root().as_deref(), Some("D0"));
    }

    #[test]
    fn bundled_sample_parses() {
        let sample = FixtureRegistry::parse(SAMPLE_REGISTRY).expect("sample is valid");
        let root = sample.default_root().expect("sample has items");
        assert!(sample.contains(&root));
    }

    #[tokio::test]
    async fn report_lists_both_directions() {
        let bytes = registry()
            .generate_report("R1", ItemSubtype::ModelRun, 2)
            .await
            .expect("report renders");
        let report: serde_json::Value = serde_json::from_slice(&bytes).expect("json report");
        assert_eq!(report["summary"]["upstream_nodes"], 3);
        assert_eq!(report["summary"]["downstream_nodes"], 1);
    }

    #[tokio::test]
    async fn item_subtype_mismatch_fails() {
        let response = registry()
            .fetch_item("P", Some(ItemSubtype::Dataset))
            .await
            .expect("transport ok");
        assert!(response.into_item().is_err());
    }
}
