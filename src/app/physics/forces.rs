use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;

fn jiggle(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin()) * 1e-6
}

#[derive(Clone, Copy)]
pub(super) struct ChargeParams {
    pub(super) strength: f32,
    pub(super) theta: f32,
    pub(super) distance_min_sq: f32,
    pub(super) distance_max_sq: f32,
}

fn charge_between(offset: Vec2, distance_sq: f32, charge: f32, params: ChargeParams, alpha: f32) -> Vec2 {
    let distance_sq = if distance_sq < params.distance_min_sq {
        (params.distance_min_sq * distance_sq).sqrt()
    } else {
        distance_sq
    };
    offset * (charge * alpha / distance_sq)
}

pub(super) fn accumulate_charge(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    params: ChargeParams,
    alpha: f32,
    velocity: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other in &node.indices {
            if other == index {
                continue;
            }
            let mut offset = positions[other] - point;
            if offset == Vec2::ZERO {
                offset = jiggle(index, other);
            }
            let distance_sq = offset.length_sq();
            if distance_sq >= params.distance_max_sq {
                continue;
            }
            *velocity += charge_between(offset, distance_sq, params.strength, params, alpha);
        }
        return;
    }

    let offset = node.center_of_mass - point;
    let distance_sq = offset.length_sq();
    let side = node.bounds.side_length();
    let can_approximate = !node.bounds.contains(point)
        && side * side / (params.theta * params.theta) < distance_sq;

    if can_approximate {
        if distance_sq < params.distance_max_sq {
            *velocity += charge_between(
                offset,
                distance_sq,
                params.strength * node.mass,
                params,
                alpha,
            );
        }
        return;
    }

    for child in node.children() {
        accumulate_charge(child, index, positions, params, alpha, velocity);
    }
}

#[derive(Clone, Copy)]
pub(super) struct CollideParams {
    pub(super) strength: f32,
    pub(super) max_distance_sq: f32,
}

fn collide_pair(
    from: usize,
    to: usize,
    predicted: &[Vec2],
    radii: &[f32],
    strength: f32,
    deltas: &mut [Vec2],
) {
    let reach = radii[from] + radii[to];
    let mut offset = predicted[from] - predicted[to];
    if offset == Vec2::ZERO {
        offset = jiggle(from, to);
    }
    let distance_sq = offset.length_sq();
    if distance_sq >= reach * reach {
        return;
    }

    let distance = distance_sq.sqrt();
    let push = offset * ((reach - distance) / distance * strength);
    let from_sq = radii[from] * radii[from];
    let to_sq = radii[to] * radii[to];
    let share = to_sq / (from_sq + to_sq);
    deltas[from] += push * share;
    deltas[to] -= push * (1.0 - share);
}

pub(super) fn accumulate_collisions(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    predicted: &[Vec2],
    radii: &[f32],
    params: CollideParams,
    deltas: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    collide_pair(from, to, predicted, radii, params.strength, deltas);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    collide_pair(from, to, predicted, radii, params.strength, deltas);
                }
            }
        }
        return;
    }

    if same_node {
        let children = node_a.children().collect::<Vec<_>>();
        for (first, child_a) in children.iter().enumerate() {
            accumulate_collisions(child_a, child_a, true, predicted, radii, params, deltas);
            for child_b in &children[first + 1..] {
                accumulate_collisions(child_a, child_b, false, predicted, radii, params, deltas);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children() {
            accumulate_collisions(child, node_b, false, predicted, radii, params, deltas);
        }
    } else {
        for child in node_b.children() {
            accumulate_collisions(node_a, child, false, predicted, radii, params, deltas);
        }
    }
}

#[derive(Clone, Copy)]
pub(super) struct Spring {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) strength: f32,
    pub(super) bias: f32,
}

impl Spring {
    pub(super) fn new(source: usize, target: usize, degrees: &[usize]) -> Self {
        let source_degree = degrees[source].max(1) as f32;
        let target_degree = degrees[target].max(1) as f32;
        Self {
            source,
            target,
            strength: 1.0 / source_degree.min(target_degree),
            bias: source_degree / (source_degree + target_degree),
        }
    }
}

pub(super) fn apply_springs(
    springs: &[Spring],
    positions: &[Vec2],
    velocities: &mut [Vec2],
    distance: f32,
    alpha: f32,
) {
    for spring in springs {
        let (source, target) = (spring.source, spring.target);
        if source == target {
            continue;
        }

        let mut offset =
            positions[target] + velocities[target] - positions[source] - velocities[source];
        if offset == Vec2::ZERO {
            offset = jiggle(source, target);
        }
        let length = offset.length();
        let correction = offset * ((length - distance) / length * alpha * spring.strength);

        velocities[target] -= correction * spring.bias;
        velocities[source] += correction * (1.0 - spring.bias);
    }
}
