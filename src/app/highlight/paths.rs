use std::collections::{HashSet, VecDeque};

use super::super::physics::Simulation;

pub(super) fn shortest_root_path(
    simulation: &Simulation,
    root_index: usize,
    target_index: usize,
) -> (HashSet<usize>, HashSet<(usize, usize)>) {
    let node_count = simulation.nodes.len();
    let mut path_nodes = HashSet::new();
    let mut path_edges = HashSet::new();

    if root_index >= node_count || target_index >= node_count {
        return (path_nodes, path_edges);
    }

    if root_index == target_index {
        path_nodes.insert(root_index);
        return (path_nodes, path_edges);
    }

    let mut queue = VecDeque::from([root_index]);
    let mut visited = vec![false; node_count];
    let mut parent: Vec<Option<(usize, (usize, usize))>> = vec![None; node_count];
    visited[root_index] = true;

    while let Some(node) = queue.pop_front() {
        if node == target_index {
            break;
        }

        let forward = simulation.outgoing[node].iter().map(|&next| (next, (node, next)));
        let backward = simulation.incoming[node].iter().map(|&next| (next, (next, node)));
        for (next, edge) in forward.chain(backward) {
            if !visited[next] {
                visited[next] = true;
                parent[next] = Some((node, edge));
                queue.push_back(next);
            }
        }
    }

    if !visited[target_index] {
        return (path_nodes, path_edges);
    }

    let mut cursor = target_index;
    path_nodes.insert(cursor);
    while let Some((prev, edge)) = parent[cursor] {
        path_edges.insert(edge);
        path_nodes.insert(prev);
        cursor = prev;
    }

    (path_nodes, path_edges)
}
