use std::collections::HashSet;

mod collect;
mod paths;

use self::collect::collect_neighbours;
use self::paths::shortest_root_path;
use super::physics::Simulation;

#[derive(Debug, Default)]
pub(super) struct HighlightState {
    pub related_nodes: HashSet<usize>,
    pub related_edges: HashSet<(usize, usize)>,
    pub root_path_nodes: HashSet<usize>,
    pub root_path_edges: HashSet<(usize, usize)>,
}

impl HighlightState {
    pub(super) fn is_active(&self) -> bool {
        !self.related_nodes.is_empty() || !self.root_path_nodes.is_empty()
    }
}

pub(super) fn build_highlight_state(
    simulation: &Simulation,
    focused_id: &str,
    root_id: Option<&str>,
) -> Option<HighlightState> {
    let &focused = simulation.index_by_id.get(focused_id)?;

    let mut related_nodes = HashSet::from([focused]);
    let mut related_edges = HashSet::new();
    collect_neighbours(simulation, focused, &mut related_nodes, &mut related_edges);

    let (root_path_nodes, root_path_edges) = root_id
        .and_then(|id| simulation.index_by_id.get(id))
        .map(|&root| shortest_root_path(simulation, root, focused))
        .unwrap_or_default();

    Some(HighlightState {
        related_nodes,
        related_edges,
        root_path_nodes,
        root_path_edges,
    })
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::graph::NodeGraphData;
    use crate::lineage::{GraphLink, GraphNode, ItemCategory, ItemSubtype};

    fn simulation(ids: &[&str], pairs: &[(&str, &str)]) -> Simulation {
        let graph = NodeGraphData {
            nodes: ids
                .iter()
                .map(|id| GraphNode {
                    id: (*id).to_owned(),
                    item_category: ItemCategory::Entity,
                    item_subtype: ItemSubtype::Dataset,
                    details: None,
                })
                .collect(),
            links: pairs
                .iter()
                .map(|(source, target)| GraphLink {
                    source: (*source).to_owned(),
                    target: (*target).to_owned(),
                    kind: "wasDerivedFrom".to_owned(),
                })
                .collect(),
        };
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        simulation.merge_graph_data(&graph);
        simulation
    }

    #[test]
    fn neighbours_cover_both_directions() {
        let simulation = simulation(&["A", "B", "C", "D"], &[("A", "B"), ("C", "B"), ("B", "D")]);
        let state = build_highlight_state(&simulation, "B", None).expect("focused");
        let index = |id: &str| simulation.index_by_id[id];

        assert_eq!(state.related_nodes.len(), 4);
        assert!(state.related_edges.contains(&(index("A"), index("B"))));
        assert!(state.related_edges.contains(&(index("B"), index("D"))));
        assert!(state.root_path_nodes.is_empty());
    }

    #[test]
    fn root_path_ignores_link_direction() {
        let simulation = simulation(
            &["root", "up", "side", "far"],
            &[("up", "root"), ("up", "side"), ("far", "side")],
        );
        let state = build_highlight_state(&simulation, "far", Some("root")).expect("focused");
        let index = |id: &str| simulation.index_by_id[id];

        assert_eq!(state.root_path_nodes.len(), 4);
        assert!(state.root_path_edges.contains(&(index("up"), index("root"))));
        assert!(state.root_path_edges.contains(&(index("far"), index("side"))));
    }

    #[test]
    fn unknown_focus_has_no_highlight() {
        let simulation = simulation(&["A"], &[]);
        assert!(build_highlight_state(&simulation, "ghost", Some("A")).is_none());
    }
}
