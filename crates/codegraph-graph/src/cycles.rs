// ABOUTME: Cycle detection for the bottom-up batch processor. Walks the dependency
// ABOUTME: edge set from each unvisited node, reporting a cycle whenever an edge
// ABOUTME: lands on a node still on the current DFS stack.
use codegraph_core::NodeId;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// `adjacency` maps a node to the nodes it depends on (its outgoing dependency
/// edges). Returns one member list per cycle found; a node calling itself yields a
/// single-element list. A node with two unrelated dependents that share a third,
/// non-cyclic dependency never appears here, since the third node is visited once
/// and marked `Done` before either dependent's DFS can revisit it as an ancestor.
pub fn detect_cycles(nodes: &[NodeId], adjacency: &HashMap<NodeId, Vec<NodeId>>) -> Vec<Vec<NodeId>> {
    let mut marks: HashMap<NodeId, Mark> = nodes.iter().map(|n| (n.clone(), Mark::Unvisited)).collect();
    let mut cycles = Vec::new();

    for start in nodes {
        if marks.get(start).copied() != Some(Mark::Unvisited) {
            continue;
        }
        let mut stack: Vec<NodeId> = Vec::new();
        walk(start, adjacency, &mut marks, &mut stack, &mut cycles);
    }
    cycles
}

fn walk(
    node: &NodeId,
    adjacency: &HashMap<NodeId, Vec<NodeId>>,
    marks: &mut HashMap<NodeId, Mark>,
    stack: &mut Vec<NodeId>,
    cycles: &mut Vec<Vec<NodeId>>,
) {
    marks.insert(node.clone(), Mark::OnStack);
    stack.push(node.clone());

    if let Some(neighbors) = adjacency.get(node) {
        for next in neighbors {
            match marks.get(next).copied() {
                Some(Mark::OnStack) => {
                    let start_idx = stack.iter().position(|n| n == next).unwrap_or(0);
                    cycles.push(stack[start_idx..].to_vec());
                }
                Some(Mark::Done) => {}
                Some(Mark::Unvisited) => walk(next, adjacency, marks, stack, cycles),
                None => {}
            }
        }
    }

    stack.pop();
    marks.insert(node.clone(), Mark::Done);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adj(pairs: &[(&str, &str)]) -> HashMap<NodeId, Vec<NodeId>> {
        let mut map: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (from, to) in pairs {
            map.entry(from.to_string()).or_default().push(to.to_string());
        }
        map
    }

    #[test]
    fn direct_recursion_is_reported() {
        let nodes = vec!["a".to_string()];
        let adjacency = adj(&[("a", "a")]);
        let cycles = detect_cycles(&nodes, &adjacency);
        assert_eq!(cycles, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn mutual_recursion_is_reported() {
        let nodes = vec!["a".to_string(), "b".to_string()];
        let adjacency = adj(&[("a", "b"), ("b", "a")]);
        let cycles = detect_cycles(&nodes, &adjacency);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn shared_dependency_is_not_a_cycle() {
        let nodes = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let adjacency = adj(&[("a", "c"), ("b", "c")]);
        let cycles = detect_cycles(&nodes, &adjacency);
        assert!(cycles.is_empty());
    }

    #[test]
    fn longer_loop_is_reported() {
        let nodes = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let adjacency = adj(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let cycles = detect_cycles(&nodes, &adjacency);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
    }
}
