use std::collections::HashSet;

use super::super::physics::Simulation;

pub(super) fn collect_neighbours(
    simulation: &Simulation,
    focused: usize,
    related_nodes: &mut HashSet<usize>,
    related_edges: &mut HashSet<(usize, usize)>,
) {
    let Some(outgoing) = simulation.outgoing.get(focused) else {
        return;
    };
    for &target in outgoing {
        related_nodes.insert(target);
        related_edges.insert((focused, target));
    }

    for &source in simulation.incoming.get(focused).into_iter().flatten() {
        related_nodes.insert(source);
        related_edges.insert((source, focused));
    }
}
