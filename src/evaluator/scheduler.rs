//! Deterministic topological ordering of the nodes an output depends on.

use crate::foundation::error::{CompositorError, CompositorResult};
use crate::tree::NodeTree;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Indices into `tree.nodes` of every node `output` depends on, `output` included, such that
/// each node comes after all nodes linked into it. Ties are broken by document order.
pub(crate) fn schedule(tree: &NodeTree, output: usize) -> CompositorResult<Vec<usize>> {
    let index: HashMap<&str, usize> = tree
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();
    let endpoints = |from: &str, to: &str| -> CompositorResult<(usize, usize)> {
        match (index.get(from), index.get(to)) {
            (Some(&f), Some(&t)) => Ok((f, t)),
            _ => Err(CompositorError::validation(format!(
                "link {from} -> {to} references a missing node"
            ))),
        }
    };

    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); tree.nodes.len()];
    for link in &tree.links {
        let (from, to) = endpoints(&link.from, &link.to)?;
        incoming[to].push(from);
    }

    let mut reachable = vec![false; tree.nodes.len()];
    let mut stack = vec![output];
    while let Some(node) = stack.pop() {
        if std::mem::replace(&mut reachable[node], true) {
            continue;
        }
        stack.extend(incoming[node].iter().copied().filter(|&n| !reachable[n]));
    }

    let mut pending = vec![0usize; tree.nodes.len()];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); tree.nodes.len()];
    for (to, sources) in incoming.iter().enumerate() {
        if !reachable[to] {
            continue;
        }
        for &from in sources {
            pending[to] += 1;
            outgoing[from].push(to);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..tree.nodes.len())
        .filter(|&n| reachable[n] && pending[n] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::new();
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &outgoing[node] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    let reachable_count = reachable.iter().filter(|&&r| r).count();
    if order.len() != reachable_count {
        let stuck = (0..tree.nodes.len())
            .find(|&n| reachable[n] && pending[n] > 0)
            .map(|n| tree.nodes[n].id.as_str())
            .unwrap_or_default();
        return Err(CompositorError::validation(format!(
            "node tree has a cycle through '{stuck}'"
        )));
    }
    Ok(order)
}
