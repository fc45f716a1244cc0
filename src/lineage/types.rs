use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCategory {
    Activity,
    Agent,
    Entity,
}

impl ItemCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Activity => "Activity",
            Self::Agent => "Agent",
            Self::Entity => "Entity",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemSubtype {
    Create,
    Version,
    ModelRun,
    Study,
    Person,
    Organisation,
    Model,
    ModelRunWorkflowTemplate,
    DatasetTemplate,
    Dataset,
}

impl ItemSubtype {
    pub const ALL: [Self; 10] = [
        Self::Create,
        Self::Version,
        Self::ModelRun,
        Self::Study,
        Self::Person,
        Self::Organisation,
        Self::Model,
        Self::ModelRunWorkflowTemplate,
        Self::DatasetTemplate,
        Self::Dataset,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Version => "Version",
            Self::ModelRun => "Model run",
            Self::Study => "Study",
            Self::Person => "Person",
            Self::Organisation => "Organisation",
            Self::Model => "Model",
            Self::ModelRunWorkflowTemplate => "Workflow template",
            Self::DatasetTemplate => "Dataset template",
            Self::Dataset => "Dataset",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    ExploreUpstream,
    ExploreDownstream,
    DownstreamDataset,
    UpstreamDataset,
    DownstreamAgent,
    UpstreamAgent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Upstream,
    Downstream,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetFilter {
    Dataset,
    Agent,
}

impl TargetFilter {
    pub fn matches(self, node: &GraphNode) -> bool {
        match self {
            Self::Dataset => node.item_subtype == ItemSubtype::Dataset,
            Self::Agent => node.item_category == ItemCategory::Agent,
        }
    }
}

/// The concrete request shape a query type is sent as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineageRequest {
    Explore {
        direction: Direction,
        depth: u32,
    },
    Special {
        direction: Direction,
        target: TargetFilter,
        depth: u32,
    },
}

pub const EXPLORE_DEPTH: u32 = 1;
pub const SPECIAL_DEPTH: u32 = 4;

impl QueryType {
    pub const ALL: [Self; 6] = [
        Self::ExploreUpstream,
        Self::ExploreDownstream,
        Self::DownstreamDataset,
        Self::UpstreamDataset,
        Self::DownstreamAgent,
        Self::UpstreamAgent,
    ];

    pub fn request(self) -> LineageRequest {
        match self {
            Self::ExploreUpstream => LineageRequest::Explore {
                direction: Direction::Upstream,
                depth: EXPLORE_DEPTH,
            },
            Self::ExploreDownstream => LineageRequest::Explore {
                direction: Direction::Downstream,
                depth: EXPLORE_DEPTH,
            },
            Self::DownstreamDataset => LineageRequest::Special {
                direction: Direction::Downstream,
                target: TargetFilter::Dataset,
                depth: SPECIAL_DEPTH,
            },
            Self::UpstreamDataset => LineageRequest::Special {
                direction: Direction::Upstream,
                target: TargetFilter::Dataset,
                depth: SPECIAL_DEPTH,
            },
            Self::DownstreamAgent => LineageRequest::Special {
                direction: Direction::Downstream,
                target: TargetFilter::Agent,
                depth: SPECIAL_DEPTH,
            },
            Self::UpstreamAgent => LineageRequest::Special {
                direction: Direction::Upstream,
                target: TargetFilter::Agent,
                depth: SPECIAL_DEPTH,
            },
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::ExploreUpstream => "explore_upstream",
            Self::ExploreDownstream => "explore_downstream",
            Self::DownstreamDataset => "downstream_dataset",
            Self::UpstreamDataset => "upstream_dataset",
            Self::DownstreamAgent => "downstream_agent",
            Self::UpstreamAgent => "upstream_agent",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ExploreUpstream => "Explore upstream",
            Self::ExploreDownstream => "Explore downstream",
            Self::DownstreamDataset => "Effected datasets",
            Self::UpstreamDataset => "Contributing datasets",
            Self::DownstreamAgent => "Effected agents",
            Self::UpstreamAgent => "Contributing agents",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub item_category: ItemCategory,
    pub item_subtype: ItemSubtype,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl GraphLink {
    pub fn pair(&self) -> (&str, &str) {
        (self.source.as_str(), self.target.as_str())
    }
}

/// One resolved lineage response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageFragment {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub success: bool,
    #[serde(default)]
    pub details: String,
}

impl ResponseStatus {
    pub fn ok() -> Self {
        Self {
            success: true,
            details: String::new(),
        }
    }

    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            success: false,
            details: details.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineageResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<LineageFragment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistryItem {
    pub id: String,
    pub item_category: ItemCategory,
    pub item_subtype: ItemSubtype,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub record: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<RegistryItem>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("{0}")]
    Backend(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl LineageResponse {
    /// Collapses the wire response into a fragment or a readable failure.
    pub fn into_fragment(self) -> Result<LineageFragment, FetchError> {
        if !self.status.success {
            let details = if self.status.details.is_empty() {
                "lineage query was not successful".to_owned()
            } else {
                self.status.details
            };
            return Err(FetchError::Backend(details));
        }

        self.graph.ok_or_else(|| {
            FetchError::MalformedResponse("successful lineage response had no graph".to_owned())
        })
    }
}

impl ItemResponse {
    pub fn into_item(self) -> Result<RegistryItem, FetchError> {
        if !self.status.success {
            let details = if self.status.details.is_empty() {
                "item fetch was not successful".to_owned()
            } else {
                self.status.details
            };
            return Err(FetchError::Backend(details));
        }

        self.item.ok_or_else(|| {
            FetchError::MalformedResponse("successful item response had no item".to_owned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_queries_use_single_hop() {
        assert_eq!(
            QueryType::ExploreUpstream.request(),
            LineageRequest::Explore {
                direction: Direction::Upstream,
                depth: 1
            }
        );
        assert_eq!(
            QueryType::ExploreDownstream.request(),
            LineageRequest::Explore {
                direction: Direction::Downstream,
                depth: 1
            }
        );
    }

    #[test]
    fn special_queries_use_fixed_depth_and_filter() {
        for query in [
            QueryType::DownstreamDataset,
            QueryType::UpstreamDataset,
            QueryType::DownstreamAgent,
            QueryType::UpstreamAgent,
        ] {
            match query.request() {
                LineageRequest::Special { depth, .. } => assert_eq!(depth, SPECIAL_DEPTH),
                other => panic!("{query:?} mapped to {other:?}"),
            }
        }
    }

    #[test]
    fn failed_status_becomes_backend_error() {
        let response = LineageResponse {
            status: ResponseStatus::failed("no such handle"),
            graph: None,
        };
        assert_eq!(
            response.into_fragment(),
            Err(FetchError::Backend("no such handle".to_owned()))
        );
    }

    #[test]
    fn wire_shape_parses() {
        let raw = r#"{
            "status": {"success": true, "details": ""},
            "graph": {
                "nodes": [{"id": "X", "item_category": "ENTITY", "item_subtype": "DATASET"}],
                "links": [{"source": "A", "target": "X", "type": "wasDerivedFrom"}]
            }
        }"#;
        let response: LineageResponse = serde_json::from_str(raw).expect("valid response");
        let fragment = response.into_fragment().expect("successful");
        assert_eq!(fragment.nodes[0].item_subtype, ItemSubtype::Dataset);
        assert_eq!(fragment.links[0].kind, "wasDerivedFrom");
    }
}
