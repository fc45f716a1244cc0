mod forces;
mod quadtree;

use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};
use tracing::debug;

use crate::lineage::{ItemCategory, ItemSubtype};

use forces::{
    ChargeParams, CollideParams, Spring, accumulate_charge, accumulate_collisions, apply_springs,
};
use quadtree::QuadNode;

pub(in crate::app) const NODE_RADIUS: f32 = 22.0;
const CHARGE_STRENGTH: f32 = -500.0;
const CHARGE_DISTANCE_MAX: f32 = 400.0;
const BARNES_HUT_THETA: f32 = 0.4;
const LINK_DISTANCE: f32 = 200.0;
const COLLISION_PADDING: f32 = 50.0;
const VELOCITY_DECAY: f32 = 0.5;
const DRAG_ALPHA_TARGET: f32 = 0.3;
const ALPHA_MIN: f32 = 0.001;

fn alpha_decay() -> f32 {
    1.0 - ALPHA_MIN.powf(1.0 / 300.0)
}

pub(in crate::app) struct SimNode {
    pub id: String,
    pub category: ItemCategory,
    pub subtype: ItemSubtype,
    pub position: Vec2,
    pub velocity: Vec2,
    pub pinned: Option<Vec2>,
    pub radius: f32,
}

pub(in crate::app) struct SimLink {
    pub source: String,
    pub target: String,
    pub kind: String,
    pub ends: (usize, usize),
}

struct PhysicsScratch {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    predicted: Vec<Vec2>,
    radii: Vec<f32>,
    deltas: Vec<Vec2>,
    springs: Vec<Spring>,
}

/// Persistent force simulation over the drawn graph.
///
/// Created once the canvas has a size, updated with `merge_graph_data`, advanced
/// with `tick`, and stopped with `dispose`.
pub(in crate::app) struct Simulation {
    pub(in crate::app) nodes: Vec<SimNode>,
    pub(in crate::app) links: Vec<SimLink>,
    pub(in crate::app) index_by_id: HashMap<String, usize>,
    pub(in crate::app) outgoing: Vec<Vec<usize>>,
    pub(in crate::app) incoming: Vec<Vec<usize>>,
    alpha: f32,
    alpha_target: f32,
    center: Vec2,
    dragging: Option<usize>,
    disposed: bool,
    springs_dirty: bool,
    scratch: PhysicsScratch,
}

impl Simulation {
    pub(in crate::app) fn new(center: Vec2) -> Self {
        debug!(?center, "creating force simulation");
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            index_by_id: HashMap::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            alpha: 1.0,
            alpha_target: 0.0,
            center,
            dragging: None,
            disposed: false,
            springs_dirty: true,
            scratch: PhysicsScratch {
                positions: Vec::new(),
                velocities: Vec::new(),
                predicted: Vec::new(),
                radii: Vec::new(),
                deltas: Vec::new(),
                springs: Vec::new(),
            },
        }
    }

    pub(in crate::app) fn alpha(&self) -> f32 {
        self.alpha
    }

    pub(in crate::app) fn is_active(&self) -> bool {
        !self.disposed && (self.alpha >= ALPHA_MIN || self.alpha_target > 0.0)
    }

    #[cfg(test)]
    pub(in crate::app) fn center(&self) -> Vec2 {
        self.center
    }

    pub(in crate::app) fn set_center(&mut self, center: Vec2) {
        self.center = center;
    }

    pub(in crate::app) fn reheat(&mut self) {
        if self.disposed {
            return;
        }
        self.alpha = 1.0;
    }

    pub(in crate::app) fn dispose(&mut self) {
        if !self.disposed {
            debug!(nodes = self.nodes.len(), "disposing force simulation");
        }
        self.disposed = true;
        self.dragging = None;
        self.alpha = 0.0;
        self.alpha_target = 0.0;
    }

    pub(in crate::app) fn mark_topology_changed(&mut self) {
        self.springs_dirty = true;
    }

    fn rebuild_springs(&mut self) {
        let mut degrees = vec![0usize; self.nodes.len()];
        for link in &self.links {
            degrees[link.ends.0] += 1;
            degrees[link.ends.1] += 1;
        }
        self.scratch.springs.clear();
        self.scratch.springs.extend(
            self.links
                .iter()
                .map(|link| Spring::new(link.ends.0, link.ends.1, &degrees)),
        );
        self.springs_dirty = false;
    }

    pub(in crate::app) fn tick(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.springs_dirty {
            self.rebuild_springs();
        }

        self.alpha += (self.alpha_target - self.alpha) * alpha_decay();
        let alpha = self.alpha;
        let node_count = self.nodes.len();
        if node_count == 0 {
            return self.is_active();
        }

        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch.velocities.clear();
        scratch.radii.clear();
        for node in &self.nodes {
            scratch.positions.push(node.position);
            scratch.velocities.push(node.velocity);
            scratch.radii.push(node.radius + COLLISION_PADDING);
        }

        let charge = ChargeParams {
            strength: CHARGE_STRENGTH,
            theta: BARNES_HUT_THETA,
            distance_min_sq: 1.0,
            distance_max_sq: CHARGE_DISTANCE_MAX * CHARGE_DISTANCE_MAX,
        };
        if let Some(tree) = QuadNode::build(&scratch.positions) {
            for (index, velocity) in scratch.velocities.iter_mut().enumerate() {
                accumulate_charge(&tree, index, &scratch.positions, charge, alpha, velocity);
            }
        }

        apply_springs(
            &scratch.springs,
            &scratch.positions,
            &mut scratch.velocities,
            LINK_DISTANCE,
            alpha,
        );

        scratch.predicted.clear();
        scratch
            .predicted
            .extend(scratch.positions.iter().zip(&scratch.velocities).map(|(p, v)| *p + *v));
        scratch.deltas.clear();
        scratch.deltas.resize(node_count, Vec2::ZERO);
        let max_reach = scratch.radii.iter().copied().fold(0.0_f32, f32::max) * 2.0;
        if let Some(tree) = QuadNode::build(&scratch.predicted) {
            accumulate_collisions(
                &tree,
                &tree,
                true,
                &scratch.predicted,
                &scratch.radii,
                CollideParams {
                    strength: 1.0,
                    max_distance_sq: max_reach * max_reach,
                },
                &mut scratch.deltas,
            );
        }

        let centroid =
            scratch.positions.iter().fold(Vec2::ZERO, |sum, p| sum + *p) / node_count as f32;
        let shift = centroid - self.center;

        for (index, node) in self.nodes.iter_mut().enumerate() {
            if let Some(fixed) = node.pinned {
                node.position = fixed;
                node.velocity = Vec2::ZERO;
                continue;
            }
            let velocity =
                (scratch.velocities[index] + scratch.deltas[index]) * (1.0 - VELOCITY_DECAY);
            node.velocity = velocity;
            node.position = scratch.positions[index] - shift + velocity;
        }

        self.is_active()
    }

    pub(in crate::app) fn drag_start(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        node.pinned = Some(node.position);
        self.dragging = Some(index);
        if !self.disposed {
            self.alpha_target = DRAG_ALPHA_TARGET;
            self.alpha = self.alpha.max(ALPHA_MIN);
        }
    }

    pub(in crate::app) fn drag_to(&mut self, world: Vec2) {
        if let Some(node) = self.dragging.and_then(|index| self.nodes.get_mut(index)) {
            node.pinned = Some(world);
            node.position = world;
        }
    }

    pub(in crate::app) fn drag_end(&mut self) {
        self.dragging = None;
        self.alpha_target = 0.0;
    }

    pub(in crate::app) fn dragging(&self) -> Option<usize> {
        self.dragging
    }

    pub(in crate::app) fn pinned_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.pinned.is_some()).count()
    }

    pub(in crate::app) fn reset_physics(&mut self) {
        for node in &mut self.nodes {
            node.pinned = None;
        }
        self.dragging = None;
        self.alpha_target = 0.0;
        self.reheat();
    }

    pub(in crate::app) fn spiral_slot(&self, slot: usize) -> Vec2 {
        let angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
        let radius = 10.0 * (0.5 + slot as f32).sqrt();
        let turn = slot as f32 * angle;
        self.center + vec2(turn.cos(), turn.sin()) * radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeGraphData;
    use crate::lineage::{GraphLink, GraphNode};

    fn graph(ids: &[&str], pairs: &[(&str, &str)]) -> NodeGraphData {
        NodeGraphData {
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
                    kind: "used".to_owned(),
                })
                .collect(),
        }
    }

    fn warm(simulation: &mut Simulation, ticks: usize) {
        for _ in 0..ticks {
            simulation.tick();
        }
    }

    #[test]
    fn cools_down_and_stops() {
        let mut simulation = Simulation::new(vec2(400.0, 300.0));
        simulation.merge_graph_data(&graph(&["X", "A", "B"], &[("A", "X"), ("X", "B")]));
        let mut ticks = 0;
        while simulation.tick() {
            ticks += 1;
            assert!(ticks < 1000, "simulation never cooled");
        }
        assert!(simulation.alpha() < ALPHA_MIN);
        assert!(!simulation.tick());
    }

    #[test]
    fn linked_nodes_settle_near_link_distance() {
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        simulation.merge_graph_data(&graph(&["A", "B"], &[("A", "B")]));
        warm(&mut simulation, 600);
        let a = simulation.nodes[simulation.index_by_id["A"]].position;
        let b = simulation.nodes[simulation.index_by_id["B"]].position;
        let distance = (a - b).length();
        assert!(distance > 120.0 && distance < 420.0, "distance {distance}");
    }

    #[test]
    fn dragged_node_is_pinned_until_physics_reset() {
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        simulation.merge_graph_data(&graph(&["X", "A", "B"], &[("A", "X"), ("X", "B")]));
        warm(&mut simulation, 20);

        let b = simulation.index_by_id["B"];
        let target = vec2(900.0, -650.0);
        simulation.drag_start(b);
        simulation.drag_to(target);
        simulation.drag_end();
        assert_eq!(simulation.nodes[b].pinned, Some(target));

        simulation.reheat();
        warm(&mut simulation, 30);
        assert_eq!(simulation.nodes[b].position, target);

        simulation.reset_physics();
        assert_eq!(simulation.pinned_count(), 0);
        assert!(simulation.is_active());
        warm(&mut simulation, 5);
        assert_ne!(simulation.nodes[b].position, target);
    }

    #[test]
    fn drag_keeps_simulation_warm() {
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        simulation.merge_graph_data(&graph(&["A", "B"], &[("A", "B")]));
        while simulation.tick() {}

        simulation.drag_start(0);
        assert!(simulation.is_active());
        warm(&mut simulation, 400);
        assert!(simulation.alpha() > 0.2);
        simulation.drag_end();
        assert!(simulation.nodes[0].pinned.is_some());
    }

    #[test]
    fn disposed_simulation_does_not_tick() {
        let mut simulation = Simulation::new(vec2(0.0, 0.0));
        simulation.merge_graph_data(&graph(&["A", "B"], &[("A", "B")]));
        simulation.dispose();
        let before = simulation.nodes[0].position;
        assert!(!simulation.tick());
        simulation.reheat();
        assert!(!simulation.tick());
        assert_eq!(simulation.nodes[0].position, before);
    }
}
