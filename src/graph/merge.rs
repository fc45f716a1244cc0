use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::lineage::{GraphLink, GraphNode, LineageFragment};

/// Deduplicated union of every resolved fragment for the current root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeGraphData {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl NodeGraphData {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes
            .binary_search_by(|node| node.id.as_str().cmp(id))
            .ok()
            .map(|index| &self.nodes[index])
    }

    /// True when both graphs hold the same node ids and link pairs.
    pub fn same_structure(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self.links.len() == other.links.len()
            && self
                .nodes
                .iter()
                .zip(&other.nodes)
                .all(|(a, b)| a.id == b.id)
            && self
                .links
                .iter()
                .zip(&other.links)
                .all(|(a, b)| a.pair() == b.pair())
    }
}

/// Folds fragments into one graph.
///
/// Nodes are unique by id and links by ordered `(source, target)` pair. When two
/// fragments disagree about a node or a link, the first one seen is kept, so a
/// second relation between the same pair is dropped. Output is sorted by id and
/// pair, which makes the result independent of fragment order in id/pair space.
pub fn merge_fragments<'a, I>(fragments: I) -> NodeGraphData
where
    I: IntoIterator<Item = &'a LineageFragment>,
{
    let mut nodes: HashMap<&str, &GraphNode> = HashMap::new();
    let mut links: HashMap<(&str, &str), &GraphLink> = HashMap::new();
    let mut dropped = 0usize;

    for fragment in fragments {
        for node in &fragment.nodes {
            nodes.entry(node.id.as_str()).or_insert(node);
        }
        for link in &fragment.links {
            match links.entry(link.pair()) {
                std::collections::hash_map::Entry::Occupied(existing) => {
                    if existing.get().kind != link.kind {
                        dropped += 1;
                    }
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(link);
                }
            }
        }
    }

    if dropped > 0 {
        trace!(dropped, "collapsed parallel relations onto existing links");
    }

    let mut nodes = nodes.into_values().cloned().collect::<Vec<_>>();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    let mut links = links.into_values().cloned().collect::<Vec<_>>();
    links.sort_by(|a, b| a.pair().cmp(&b.pair()));

    NodeGraphData { nodes, links }
}

/// Ids of links whose endpoints are not both present as nodes.
pub fn dangling_links(graph: &NodeGraphData) -> Vec<(String, String)> {
    let ids = graph
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();
    graph
        .links
        .iter()
        .filter(|link| !ids.contains(link.source.as_str()) || !ids.contains(link.target.as_str()))
        .map(|link| (link.source.clone(), link.target.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::{ItemCategory, ItemSubtype};

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_owned(),
            item_category: ItemCategory::Entity,
            item_subtype: ItemSubtype::Dataset,
            details: None,
        }
    }

    fn link(source: &str, target: &str, kind: &str) -> GraphLink {
        GraphLink {
            source: source.to_owned(),
            target: target.to_owned(),
            kind: kind.to_owned(),
        }
    }

    fn fragment(nodes: &[&str], links: &[(&str, &str, &str)]) -> LineageFragment {
        LineageFragment {
            nodes: nodes.iter().map(|id| node(id)).collect(),
            links: links.iter().map(|(s, t, k)| link(s, t, k)).collect(),
        }
    }

    #[test]
    fn merging_a_fragment_twice_is_idempotent() {
        let f = fragment(&["X", "A"], &[("A", "X", "used")]);
        let once = merge_fragments([&f]);
        let twice = merge_fragments([&f, &f]);
        assert_eq!(once, twice);
        assert_eq!(twice.nodes.len(), 2);
        assert_eq!(twice.links.len(), 1);
    }

    #[test]
    fn second_relation_on_same_pair_is_dropped() {
        let first = fragment(&["A", "B"], &[("A", "B", "used")]);
        let second = fragment(&["A", "B"], &[("A", "B", "wasInformedBy")]);
        let merged = merge_fragments([&first, &second]);
        assert_eq!(merged.links, vec![link("A", "B", "used")]);
    }

    #[test]
    fn reverse_pair_is_a_distinct_link() {
        let f = fragment(&["A", "B"], &[("A", "B", "used"), ("B", "A", "used")]);
        assert_eq!(merge_fragments([&f]).links.len(), 2);
    }

    #[test]
    fn fragment_order_does_not_change_the_structure() {
        let f1 = fragment(&["X", "A"], &[("A", "X", "used")]);
        let f2 = fragment(&["X", "B"], &[("X", "B", "wasGeneratedBy")]);
        let f3 = fragment(&["B", "C"], &[("B", "C", "used")]);

        let forward = merge_fragments([&f1, &f2, &f3]);
        for order in [[&f3, &f1, &f2], [&f2, &f3, &f1], [&f3, &f2, &f1]] {
            let merged = merge_fragments(order);
            assert!(forward.same_structure(&merged));
            assert_eq!(forward, merged);
        }
    }

    #[test]
    fn node_lookup_and_dangling_links() {
        let f = fragment(&["X", "A"], &[("A", "X", "used"), ("X", "Z", "used")]);
        let merged = merge_fragments([&f]);
        assert!(merged.node("A").is_some());
        assert!(merged.node("Z").is_none());
        assert_eq!(
            dangling_links(&merged),
            vec![("X".to_owned(), "Z".to_owned())]
        );
    }
}
