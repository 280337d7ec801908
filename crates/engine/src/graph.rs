// SPDX-License-Identifier: MIT

//! Edge resolution: evaluate every want's `using` selectors against every
//! other want's labels to produce the producer→consumer edge set
//! (spec.md §4.2 step 2), plus a topological ordering that tolerates
//! cycles (spec.md §4.2 "tick ordering", §9 "cyclic graphs").

use mywant_core::{Want, WantId};
use std::collections::{HashMap, HashSet, VecDeque};

/// One resolved edge: `producer` feeds `consumer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub producer: WantId,
    pub consumer: WantId,
}

/// Resolve every active edge by matching each want's `using` selectors
/// against every other want's labels. Unmatched selectors are tolerated —
/// they simply produce no edge and are re-evaluated next tick (spec.md
/// §4.2 step 2).
pub fn resolve_edges(wants: &[Want]) -> Vec<Edge> {
    let mut edges = Vec::new();
    for consumer in wants {
        if consumer.spec.using.is_empty() {
            continue;
        }
        for producer in wants {
            if producer.id == consumer.id {
                continue;
            }
            if consumer.spec.using.matches(&producer.labels) {
                edges.push(Edge { producer: producer.id.clone(), consumer: consumer.id.clone() });
            }
        }
    }
    edges
}

/// A topological ordering of want ids, processing wants with no unresolved
/// incoming edge first. Cycles are permitted by design (spec.md §9); any
/// id still unplaced once no further progress can be made is appended in
/// stable id order so cyclic components still get a deterministic,
/// concurrency-safe position (spec.md §4.2 "ties broken by stable id
/// ordering").
pub fn topological_order(ids: &[WantId], edges: &[Edge]) -> Vec<WantId> {
    let mut indegree: HashMap<WantId, usize> = ids.iter().map(|id| (id.clone(), 0)).collect();
    let mut outgoing: HashMap<WantId, Vec<WantId>> = ids.iter().map(|id| (id.clone(), Vec::new())).collect();
    for edge in edges {
        if let Some(count) = indegree.get_mut(&edge.consumer) {
            *count += 1;
        }
        outgoing.entry(edge.producer.clone()).or_default().push(edge.consumer.clone());
    }

    let mut sorted_ids: Vec<WantId> = ids.to_vec();
    sorted_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    let mut ready: VecDeque<WantId> =
        sorted_ids.iter().filter(|id| indegree.get(*id).copied().unwrap_or(0) == 0).cloned().collect();
    let mut placed: HashSet<WantId> = HashSet::new();
    let mut order = Vec::with_capacity(ids.len());

    while let Some(id) = ready.pop_front() {
        if !placed.insert(id.clone()) {
            continue;
        }
        order.push(id.clone());
        if let Some(children) = outgoing.get(&id) {
            let mut next: Vec<WantId> = Vec::new();
            for child in children {
                if let Some(count) = indegree.get_mut(child) {
                    *count = count.saturating_sub(1);
                    if *count == 0 && !placed.contains(child) {
                        next.push(child.clone());
                    }
                }
            }
            next.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            for n in next {
                ready.push_back(n);
            }
        }
    }

    // Anything left belongs to a cycle; append remaining ids in stable
    // order so they still run (concurrently, per spec.md §4.2).
    for id in sorted_ids {
        if !placed.contains(&id) {
            order.push(id.clone());
            placed.insert(id);
        }
    }
    order
}
