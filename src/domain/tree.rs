//! In-memory education-group hierarchy.
//!
//! The [`Hierarchy`] knows nothing about how nodes are persisted. It stores
//! nodes in a map and the parent/child links in a directed graph.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    convert::Infallible,
};

use petgraph::{
    Direction,
    algo::{has_path_connecting, is_cyclic_directed, tarjan_scc},
    graphmap::DiGraphMap,
};
use thiserror::Error;
use tracing::instrument;

use crate::domain::{
    Acronym,
    node::{ChildRef, ChildRow, HierarchyNode, Node, NodeId, NodeKind},
    reader::{HierarchyStore, TraversalError},
};

/// Data stored on each edge of the hierarchy graph.
///
/// Edges point from parent to child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkData {
    /// Position of the child among its siblings. Lower comes first.
    pub order: u32,
    /// Whether the child is mandatory within its parent.
    pub mandatory: bool,
}

/// An in-memory representation of a program hierarchy.
///
/// - Nodes: `HashMap<NodeId, HierarchyNode>`
/// - Leaf lookup: `BTreeMap<Acronym, NodeId>`
/// - Links: `DiGraphMap<NodeId, LinkData>` (edges are parent→child)
#[derive(Debug, Default, Clone)]
pub struct Hierarchy {
    nodes: HashMap<NodeId, HierarchyNode>,

    /// Each learning unit appears as a single leaf node, which may be linked
    /// under several branches.
    acronym_to_id: BTreeMap<Acronym, NodeId>,

    /// Sole source of truth for parent/child relationships.
    graph: DiGraphMap<NodeId, LinkData>,
}

/// Errors that can occur when inserting a node.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsertError {
    /// A node with the same identifier already exists.
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),
    /// A leaf with the same acronym already exists.
    #[error("learning unit {0} is already present in the hierarchy")]
    DuplicateAcronym(Acronym),
}

/// Errors that can occur when linking nodes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// The parent node could not be found.
    #[error("parent node {0} not found")]
    ParentNotFound(NodeId),
    /// The child node could not be found.
    #[error("child node {0} not found")]
    ChildNotFound(NodeId),
    /// Leaves cannot have children.
    #[error("node {0} is a learning unit and cannot contain children")]
    LeafParent(NodeId),
    /// Establishing the link would introduce a cycle.
    #[error("link {parent} → {child} would create a cycle")]
    Cycle {
        /// Identifier of the parent node.
        parent: NodeId,
        /// Identifier of the child node.
        child: NodeId,
    },
}

/// Result of linking two nodes together.
#[derive(Debug, PartialEq, Eq)]
pub struct LinkOutcome {
    /// Identifier of the parent node.
    pub parent: NodeId,
    /// Identifier of the child node.
    pub child: NodeId,
    /// Whether the relationship already existed prior to linking.
    pub already_linked: bool,
}

impl Hierarchy {
    /// Creates a new hierarchy with pre-allocated capacity for the given
    /// number of nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: HashMap::with_capacity(capacity),
            acronym_to_id: BTreeMap::new(),
            graph: DiGraphMap::with_capacity(capacity, capacity),
        }
    }

    /// Inserts a node into the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if a node with the same identifier, or a leaf with the
    /// same acronym, already exists.
    pub fn insert(&mut self, node: HierarchyNode) -> Result<(), InsertError> {
        if self.nodes.contains_key(&node.id) {
            return Err(InsertError::DuplicateNode(node.id));
        }

        if let NodeKind::Leaf(acronym) = &node.kind {
            if self.acronym_to_id.contains_key(acronym) {
                return Err(InsertError::DuplicateAcronym(acronym.clone()));
            }
            self.acronym_to_id.insert(acronym.clone(), node.id);
        }

        self.graph.add_node(node.id);
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// The number of nodes in the hierarchy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the hierarchy has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Retrieves a node by identifier.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&HierarchyNode> {
        self.nodes.get(&id)
    }

    /// Finds the leaf node of a learning unit.
    #[must_use]
    pub fn find_by_acronym(&self, acronym: &Acronym) -> Option<&HierarchyNode> {
        let id = self.acronym_to_id.get(acronym)?;
        self.nodes.get(id)
    }

    /// Resolves a node together with its ordered children.
    #[must_use]
    pub fn resolve(&self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get(&id)?;
        Some(match &node.kind {
            NodeKind::Leaf(acronym) => Node::Leaf(acronym.clone()),
            NodeKind::Branch => Node::Branch(self.children(id).map(|(child, _)| child).collect()),
        })
    }

    /// Returns an iterator over all nodes, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.values()
    }

    /// Returns an iterator over all links as `(parent, child, data)`.
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId, LinkData)> + '_ {
        self.graph
            .all_edges()
            .map(|(parent, child, data)| (parent, child, *data))
    }

    /// Branches that have no parent, in ascending identifier order.
    #[must_use]
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<_> = self
            .nodes
            .values()
            .filter(|node| node.is_branch())
            .map(|node| node.id)
            .filter(|&id| self.parents(id).next().is_none())
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Direct children of a node, sorted by link order then identifier.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, LinkData)> + use<> {
        let mut children: Vec<(NodeId, LinkData)> = if self.graph.contains_node(id) {
            self.graph
                .edges(id)
                .map(|(_, child, data)| (child, *data))
                .collect()
        } else {
            Vec::new()
        };
        children.sort_by_key(|(child, data)| (data.order, *child));
        children.into_iter()
    }

    /// Direct parents of a node.
    pub fn parents(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        if self.graph.contains_node(id) {
            Some(self.graph.neighbors_directed(id, Direction::Incoming))
        } else {
            None
        }
        .into_iter()
        .flatten()
    }

    /// Link a child under a parent, rejecting links that would create a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ParentNotFound`] or [`LinkError::ChildNotFound`]
    /// when either node does not exist, [`LinkError::LeafParent`] when the
    /// parent is a learning unit, or [`LinkError::Cycle`] if the link would
    /// introduce a cycle.
    pub fn link(
        &mut self,
        parent: NodeId,
        child: NodeId,
        data: LinkData,
    ) -> Result<LinkOutcome, LinkError> {
        self.check_endpoints(parent, child)?;

        if parent == child {
            return Err(LinkError::Cycle { parent, child });
        }

        let already_linked = self.graph.contains_edge(parent, child);

        if !already_linked && self.link_would_create_cycle(parent, child) {
            return Err(LinkError::Cycle { parent, child });
        }

        self.graph.add_edge(parent, child, data);

        Ok(LinkOutcome {
            parent,
            child,
            already_linked,
        })
    }

    /// Insert or update a link without checking for cycles.
    ///
    /// This is used when loading persisted data, which may already be
    /// inconsistent. Use [`Hierarchy::cycles`] to report problems afterwards.
    ///
    /// Returns `true` if an existing link was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if either node is missing or the parent is a leaf.
    pub fn upsert_link(
        &mut self,
        parent: NodeId,
        child: NodeId,
        data: LinkData,
    ) -> Result<bool, LinkError> {
        self.check_endpoints(parent, child)?;
        Ok(self.graph.add_edge(parent, child, data).is_some())
    }

    /// Remove the link between a parent and a child.
    ///
    /// Returns `true` if the link existed.
    pub fn unlink(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.graph.remove_edge(parent, child).is_some()
    }

    /// Remove a node and all of its links.
    ///
    /// Children are not removed; they may become roots.
    /// Returns `true` if the node existed.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.remove(&id) else {
            return false;
        };

        if let NodeKind::Leaf(acronym) = node.kind {
            self.acronym_to_id.remove(&acronym);
        }
        self.graph.remove_node(id);

        true
    }

    /// Determine whether the graph contains any cycles.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Return all cycles in the graph as sorted sets of node identifiers.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        let mut cycles = Vec::new();

        for mut component in tarjan_scc(&self.graph) {
            if component.len() > 1 {
                component.sort_unstable();
                cycles.push(component);
                continue;
            }

            let Some(&node) = component.first() else {
                continue;
            };

            if self.graph.contains_edge(node, node) {
                cycles.push(vec![node]);
            }
        }

        cycles.sort();
        cycles
    }

    /// Every descendant of `root`, keyed by its path from the root.
    ///
    /// Paths are node identifiers joined with `|`, starting with the root
    /// (e.g. `"1|4|9"`). A node reachable through two parents appears once per
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Cycle`] if a node is its own ancestor.
    #[instrument(level = "debug", skip(self))]
    pub fn descendants(
        &self,
        root: NodeId,
    ) -> Result<BTreeMap<String, NodeId>, TraversalError<Infallible>> {
        let mut descendants = BTreeMap::new();
        let mut ancestors = vec![root];
        self.collect_descendants(root, &root.to_string(), &mut ancestors, &mut descendants)?;
        Ok(descendants)
    }

    fn collect_descendants(
        &self,
        node: NodeId,
        path: &str,
        ancestors: &mut Vec<NodeId>,
        out: &mut BTreeMap<String, NodeId>,
    ) -> Result<(), TraversalError<Infallible>> {
        for (child, _) in self.children(node) {
            if ancestors.contains(&child) {
                return Err(TraversalError::Cycle(child));
            }

            let child_path = format!("{path}|{child}");
            out.insert(child_path.clone(), child);

            ancestors.push(child);
            self.collect_descendants(child, &child_path, ancestors, out)?;
            ancestors.pop();
        }
        Ok(())
    }
}

impl Hierarchy {
    fn check_endpoints(&self, parent: NodeId, child: NodeId) -> Result<(), LinkError> {
        let parent_node = self
            .nodes
            .get(&parent)
            .ok_or(LinkError::ParentNotFound(parent))?;
        if !self.nodes.contains_key(&child) {
            return Err(LinkError::ChildNotFound(child));
        }
        if !parent_node.is_branch() {
            return Err(LinkError::LeafParent(parent));
        }
        Ok(())
    }

    fn link_would_create_cycle(&self, parent: NodeId, child: NodeId) -> bool {
        if !has_path_connecting(&self.graph, child, parent, None) {
            return false;
        }

        // If the parent can already reach the child through existing links,
        // then the graph already contains a cycle involving these nodes.
        if has_path_connecting(&self.graph, parent, child, None) {
            return false;
        }

        true
    }
}

impl HierarchyStore for Hierarchy {
    type Error = Infallible;

    fn children_of(&self, parents: &BTreeSet<NodeId>) -> Result<Vec<ChildRow>, Self::Error> {
        let mut rows = Vec::new();
        for &parent in parents {
            for (child, _) in self.children(parent) {
                let Some(node) = self.nodes.get(&child) else {
                    continue;
                };
                let child = match &node.kind {
                    NodeKind::Branch => ChildRef::Branch(child),
                    NodeKind::Leaf(acronym) => ChildRef::Leaf(acronym.clone()),
                };
                rows.push(ChildRow { parent, child });
            }
        }
        Ok(rows)
    }
}
