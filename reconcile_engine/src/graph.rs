/// Reconcile engine — Graph Utilities
///
/// Pure graph analysis over a `StepGraph`. No evaluation, no work callbacks.

use std::collections::BTreeSet;

use crate::step::{StepGraph, StepId};

// ---------------------------------------------------------------------------
// Reachability
// ---------------------------------------------------------------------------

/// Every Step reachable from `roots` through prerequisites, roots included.
///
/// Post-order: a Step appears after all of its prerequisites. Iterative DFS,
/// prerequisites visited in declared order, so the output is deterministic
/// for a given root order. Roots not registered in `graph` are skipped.
pub fn reachable<C: ?Sized>(graph: &StepGraph<C>, roots: &[StepId]) -> Vec<StepId> {
    let mut visited: BTreeSet<StepId> = BTreeSet::new();
    let mut order: Vec<StepId> = Vec::new();

    for root in roots {
        if !graph.contains(*root) || !visited.insert(*root) {
            continue;
        }
        let mut stack: Vec<(StepId, usize)> = vec![(*root, 0)];

        while let Some((node, idx)) = stack.last().copied() {
            let prereqs = graph.get(node).prereqs();
            if idx < prereqs.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 = idx + 1;
                }
                let next = prereqs[idx];
                if visited.insert(next) {
                    stack.push((next, 0));
                }
            } else {
                order.push(node);
                stack.pop();
            }
        }
    }

    order
}
