//! Topological ordering of the dependency graph
//!
//! Depth-first traversal on an explicit stack. Each table moves through
//! `Unvisited -> InProgress -> Visited`; reaching an `InProgress` table again
//! is a back edge, i.e. a cycle. Roots are taken in graph node order and
//! dependencies in first-seen order, so the output is deterministic.

use crate::graph::DependencyGraph;
use std::collections::HashMap;
use thiserror::Error;

/// A foreign key cycle found while computing a destructive order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cycle detected involving tables {}", path.join(" -> "))]
pub struct CycleDetected {
    /// Tables on the cycle, starting and ending with the same table
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Visited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CyclePolicy {
    Ignore,
    Fail,
}

struct Frame<'g> {
    table: &'g str,
    next_dependency: usize,
}

/// Post-order walk: every table is emitted after the tables it depends on.
/// Self-edges are skipped, as are references to tables outside the graph.
fn post_order(graph: &DependencyGraph, policy: CyclePolicy) -> Result<Vec<String>, CycleDetected> {
    let mut state: HashMap<&str, VisitState> = HashMap::new();
    let mut emitted = Vec::with_capacity(graph.nodes().len());

    for root in graph.nodes() {
        if state.contains_key(root.as_str()) {
            continue;
        }

        state.insert(root, VisitState::InProgress);
        let mut stack = vec![Frame {
            table: root,
            next_dependency: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let table = frame.table;
            let deps = graph.dependencies(table);

            if frame.next_dependency >= deps.len() {
                stack.pop();
                state.insert(table, VisitState::Visited);
                emitted.push(table.to_string());
                continue;
            }

            let dep = deps[frame.next_dependency].as_str();
            frame.next_dependency += 1;

            if dep == table || !graph.contains(dep) {
                continue;
            }

            match state.get(dep) {
                None => {
                    state.insert(dep, VisitState::InProgress);
                    stack.push(Frame {
                        table: dep,
                        next_dependency: 0,
                    });
                }
                Some(VisitState::InProgress) => {
                    if policy == CyclePolicy::Fail {
                        let start = stack.iter().position(|f| f.table == dep).unwrap_or(0);
                        let mut path: Vec<String> =
                            stack[start..].iter().map(|f| f.table.to_string()).collect();
                        path.push(dep.to_string());
                        return Err(CycleDetected { path });
                    }
                }
                Some(VisitState::Visited) => {}
            }
        }
    }

    Ok(emitted)
}

/// Creation / population order: referenced tables come before referencing
/// tables. Best effort on cycles, which never fail here because data loads
/// run with constraint checking disabled.
pub fn constructive_order(graph: &DependencyGraph) -> Vec<String> {
    post_order(graph, CyclePolicy::Ignore).unwrap_or_default()
}

/// Drop order: a table comes only after every table referencing it.
pub fn destructive_order(graph: &DependencyGraph) -> Result<Vec<String>, CycleDetected> {
    let mut order = post_order(graph, CyclePolicy::Fail)?;
    order.reverse();
    Ok(order)
}
