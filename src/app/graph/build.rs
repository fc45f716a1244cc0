use std::collections::{HashMap, HashSet};

use eframe::egui::{Vec2, vec2};
use tracing::{debug, warn};

use crate::graph::NodeGraphData;
use crate::util::stable_pair;

use super::super::physics::{NODE_RADIUS, SimLink, SimNode, Simulation};

const NEIGHBOUR_SPAWN_OFFSET: f32 = 40.0;

impl Simulation {
    /// Reconciles the drawn graph with the logical graph.
    ///
    /// Existing nodes keep their physics state. Returns true when any node or link
    /// was added or removed; field updates on surviving nodes do not count.
    pub(in crate::app) fn merge_graph_data(&mut self, graph: &NodeGraphData) -> bool {
        let mut changed = false;

        let wanted_nodes = graph
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .collect::<HashSet<_>>();
        let before = self.nodes.len();
        self.nodes
            .retain(|node| wanted_nodes.contains(node.id.as_str()));
        let removed_nodes = before - self.nodes.len();
        changed |= removed_nodes > 0;
        self.reindex();

        let mut added = Vec::new();
        for node in &graph.nodes {
            if let Some(&index) = self.index_by_id.get(&node.id) {
                let drawn = &mut self.nodes[index];
                drawn.category = node.item_category;
                drawn.subtype = node.item_subtype;
                continue;
            }

            let index = self.nodes.len();
            self.nodes.push(SimNode {
                id: node.id.clone(),
                category: node.item_category,
                subtype: node.item_subtype,
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                pinned: None,
                radius: NODE_RADIUS,
            });
            self.index_by_id.insert(node.id.clone(), index);
            added.push(index);
        }
        changed |= !added.is_empty();

        let wanted_links = graph
            .links
            .iter()
            .map(|link| link.pair())
            .collect::<HashSet<_>>();
        let before = self.links.len();
        self.links.retain(|link| {
            wanted_links.contains(&(link.source.as_str(), link.target.as_str()))
                && self.index_by_id.contains_key(&link.source)
                && self.index_by_id.contains_key(&link.target)
        });
        let removed_links = before - self.links.len();
        changed |= removed_links > 0;

        let mut present = self
            .links
            .iter()
            .map(|link| (link.source.clone(), link.target.clone()))
            .collect::<HashSet<_>>();
        let mut added_links = 0usize;
        for link in &graph.links {
            if present.contains(&(link.source.clone(), link.target.clone())) {
                continue;
            }
            let (Some(&source), Some(&target)) = (
                self.index_by_id.get(&link.source),
                self.index_by_id.get(&link.target),
            ) else {
                warn!(
                    source = %link.source,
                    target = %link.target,
                    "skipping link with an endpoint missing from the drawn graph"
                );
                continue;
            };

            present.insert((link.source.clone(), link.target.clone()));
            self.links.push(SimLink {
                source: link.source.clone(),
                target: link.target.clone(),
                kind: link.kind.clone(),
                ends: (source, target),
            });
            added_links += 1;
        }
        changed |= added_links > 0;

        self.rebind_links();
        self.place_new_nodes(&added);

        if changed {
            self.mark_topology_changed();
            debug!(
                added_nodes = added.len(),
                removed_nodes,
                added_links,
                removed_links,
                "drawn graph reconciled"
            );
        }
        changed
    }

    fn reindex(&mut self) {
        self.index_by_id = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect::<HashMap<_, _>>();
    }

    fn rebind_links(&mut self) {
        for link in &mut self.links {
            if let (Some(&source), Some(&target)) = (
                self.index_by_id.get(&link.source),
                self.index_by_id.get(&link.target),
            ) {
                link.ends = (source, target);
            }
        }

        let mut outgoing = vec![Vec::new(); self.nodes.len()];
        let mut incoming = vec![Vec::new(); self.nodes.len()];
        for link in &self.links {
            let (source, target) = link.ends;
            outgoing[source].push(target);
            incoming[target].push(source);
        }
        self.outgoing = outgoing;
        self.incoming = incoming;
    }

    fn place_new_nodes(&mut self, added: &[usize]) {
        if added.is_empty() {
            return;
        }

        let mut placed = vec![true; self.nodes.len()];
        for &index in added {
            placed[index] = false;
        }

        let mut spiral = 0usize;
        for &index in added {
            let anchor = self.outgoing[index]
                .iter()
                .chain(self.incoming[index].iter())
                .copied()
                .find(|&neighbour| placed[neighbour]);

            let position = match anchor {
                Some(neighbour) => {
                    let (jx, jy) = stable_pair(&self.nodes[index].id);
                    let mut direction = vec2(jx, jy);
                    if direction.length_sq() <= 0.0001 {
                        let angle = ((index as f32) * 0.618_034 + 0.11) * std::f32::consts::TAU;
                        direction = vec2(angle.cos(), angle.sin());
                    } else {
                        direction = direction.normalized();
                    }
                    self.nodes[neighbour].position + direction * NEIGHBOUR_SPAWN_OFFSET
                }
                None => {
                    let slot = self.nodes.len() - added.len() + spiral;
                    spiral += 1;
                    self.spiral_slot(slot)
                }
            };

            self.nodes[index].position = position;
            placed[index] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::lineage::{GraphLink, GraphNode, ItemCategory, ItemSubtype};

    fn node(id: &str, subtype: ItemSubtype) -> GraphNode {
        GraphNode {
            id: id.to_owned(),
            item_category: ItemCategory::Entity,
            item_subtype: subtype,
            details: None,
        }
    }

    fn link(source: &str, target: &str) -> GraphLink {
        GraphLink {
            source: source.to_owned(),
            target: target.to_owned(),
            kind: "used".to_owned(),
        }
    }

    fn scenario() -> NodeGraphData {
        NodeGraphData {
            nodes: vec![
                node("A", ItemSubtype::Dataset),
                node("B", ItemSubtype::Dataset),
                node("X", ItemSubtype::ModelRun),
            ],
            links: vec![link("A", "X"), link("X", "B")],
        }
    }

    #[test]
    fn first_merge_adds_everything() {
        let mut simulation = Simulation::new(vec2(300.0, 200.0));
        assert!(simulation.merge_graph_data(&scenario()));
        assert_eq!(simulation.nodes.len(), 3);
        assert_eq!(simulation.links.len(), 2);
        assert!(simulation.nodes.iter().all(|node| node.pinned.is_none()));
        assert!(!simulation.merge_graph_data(&scenario()));
    }

    #[test]
    fn field_updates_are_not_structural() {
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        simulation.merge_graph_data(&scenario());
        let mut updated = scenario();
        updated.nodes[0].item_subtype = ItemSubtype::Model;

        assert!(!simulation.merge_graph_data(&updated));
        let a = simulation.index_by_id["A"];
        assert_eq!(simulation.nodes[a].subtype, ItemSubtype::Model);
    }

    #[test]
    fn surviving_nodes_keep_their_physics_state() {
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        simulation.merge_graph_data(&scenario());
        let x = simulation.index_by_id["X"];
        simulation.nodes[x].position = vec2(123.0, 45.0);
        simulation.nodes[x].pinned = Some(vec2(123.0, 45.0));

        let mut grown = scenario();
        grown.nodes.push(node("C", ItemSubtype::Dataset));
        grown.links.push(link("C", "X"));
        assert!(simulation.merge_graph_data(&grown));

        let x = simulation.index_by_id["X"];
        assert_eq!(simulation.nodes[x].position, vec2(123.0, 45.0));
        assert_eq!(simulation.nodes[x].pinned, Some(vec2(123.0, 45.0)));
        let c = simulation.index_by_id["C"];
        let spawn_distance = (simulation.nodes[c].position - vec2(123.0, 45.0)).length();
        assert!((spawn_distance - NEIGHBOUR_SPAWN_OFFSET).abs() < 0.01);
    }

    #[test]
    fn removed_nodes_take_their_links_with_them() {
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        simulation.merge_graph_data(&scenario());

        let shrunk = NodeGraphData {
            nodes: vec![node("A", ItemSubtype::Dataset), node("X", ItemSubtype::ModelRun)],
            links: vec![link("A", "X"), link("X", "B")],
        };
        assert!(simulation.merge_graph_data(&shrunk));
        assert_eq!(simulation.nodes.len(), 2);
        assert_eq!(simulation.links.len(), 1);
        assert!(!simulation.index_by_id.contains_key("B"));

        let (source, target) = simulation.links[0].ends;
        assert_eq!(simulation.nodes[source].id, "A");
        assert_eq!(simulation.nodes[target].id, "X");
        assert_eq!(simulation.outgoing[source], vec![target]);
    }

    #[test]
    fn malformed_links_are_skipped() {
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        let graph = NodeGraphData {
            nodes: vec![node("A", ItemSubtype::Dataset)],
            links: vec![link("A", "ghost")],
        };
        assert!(simulation.merge_graph_data(&graph));
        assert_eq!(simulation.nodes.len(), 1);
        assert!(simulation.links.is_empty());
        assert!(!simulation.merge_graph_data(&graph));
    }
}
