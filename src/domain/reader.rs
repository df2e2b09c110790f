//! Collecting the learning units reachable from a set of branches.

use std::collections::BTreeSet;

use petgraph::{
    algo::{has_path_connecting, tarjan_scc},
    graphmap::DiGraphMap,
};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::{
    Acronym,
    node::{ChildRef, ChildRow, NodeId},
};

/// A persistence backend that can list the direct children of many branches
/// at once.
pub trait HierarchyStore {
    /// The error returned when the backend cannot be queried.
    type Error: std::error::Error + 'static;

    /// Returns every direct child of every branch in `parents`, in a single
    /// round-trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    fn children_of(&self, parents: &BTreeSet<NodeId>) -> Result<Vec<ChildRow>, Self::Error>;
}

/// Errors that can occur while walking a hierarchy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraversalError<E: std::error::Error + 'static> {
    /// A branch was reached from one of its own descendants.
    #[error("hierarchy contains a cycle through node {0}")]
    Cycle(NodeId),
    /// The backend failed.
    #[error(transparent)]
    Store(E),
}

/// Collects the acronyms of all learning units reachable from `roots`.
///
/// Children are fetched one depth level at a time, so the number of store
/// round-trips is bounded by the depth of the hierarchy. A branch reachable
/// through several parents is only expanded once.
///
/// Cycles are detected from the rows already fetched: no extra round-trip is
/// made when a branch is met again.
///
/// # Errors
///
/// Returns [`TraversalError::Cycle`] if a branch is reached again from one of
/// its descendants, and [`TraversalError::Store`] if the backend fails.
#[instrument(level = "debug", skip(store))]
pub fn collect_leaf_acronyms<S: HierarchyStore>(
    store: &S,
    roots: &BTreeSet<NodeId>,
) -> Result<BTreeSet<Acronym>, TraversalError<S::Error>> {
    let mut acronyms = BTreeSet::new();
    if roots.is_empty() {
        return Ok(acronyms);
    }

    // Branch-to-branch edges fetched so far.
    let mut fetched: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    let mut expanded: BTreeSet<NodeId> = roots.clone();
    let mut level = roots.clone();
    let mut depth = 0usize;

    while !level.is_empty() {
        let rows = store.children_of(&level).map_err(TraversalError::Store)?;
        debug!(depth, parents = level.len(), children = rows.len(), "fetched level");

        let mut next = BTreeSet::new();
        for row in rows {
            match row.child {
                ChildRef::Leaf(acronym) => {
                    acronyms.insert(acronym);
                }
                ChildRef::Branch(id) => {
                    fetched.add_edge(row.parent, id, ());
                    if expanded.insert(id) {
                        next.insert(id);
                    } else if has_path_connecting(&fetched, id, row.parent, None) {
                        return Err(TraversalError::Cycle(id));
                    }
                }
            }
        }

        level = next;
        depth += 1;
    }

    // A back edge can be fetched before the path that closes it.
    let cyclic = tarjan_scc(&fetched)
        .into_iter()
        .filter(|component| component.len() > 1)
        .filter_map(|component| component.into_iter().min())
        .min();
    if let Some(id) = cyclic {
        return Err(TraversalError::Cycle(id));
    }

    Ok(acronyms)
}
