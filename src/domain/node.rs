//! Nodes of the education-group hierarchy.

use std::{fmt, num::NonZeroU64, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::Acronym;

/// Stable identifier of a node in the hierarchy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(NonZeroU64);

impl NodeId {
    /// Creates a node identifier.
    ///
    /// Returns `None` if `id` is zero.
    #[must_use]
    pub const fn new(id: u64) -> Option<Self> {
        match NonZeroU64::new(id) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<NonZeroU64>().map(Self)
    }
}

/// What a node is, independent of its position in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A program year or sub-group. May contain children.
    Branch,
    /// A learning unit year. Always terminal.
    Leaf(Acronym),
}

impl NodeKind {
    /// The acronym of a leaf, or `None` for a branch.
    #[must_use]
    pub const fn acronym(&self) -> Option<&Acronym> {
        match self {
            Self::Branch => None,
            Self::Leaf(acronym) => Some(acronym),
        }
    }
}

/// A node stored in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    /// The node's identifier.
    pub id: NodeId,
    /// Branch or leaf.
    pub kind: NodeKind,
    /// Human-readable title, if known.
    pub title: Option<String>,
}

impl HierarchyNode {
    /// Creates a branch node.
    #[must_use]
    pub const fn branch(id: NodeId, title: Option<String>) -> Self {
        Self {
            id,
            kind: NodeKind::Branch,
            title,
        }
    }

    /// Creates a leaf node referencing a learning unit.
    #[must_use]
    pub const fn leaf(id: NodeId, acronym: Acronym) -> Self {
        Self {
            id,
            kind: NodeKind::Leaf(acronym),
            title: None,
        }
    }

    /// Whether this node is a branch.
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch)
    }
}

impl fmt::Display for HierarchyNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.kind, &self.title) {
            (NodeKind::Leaf(acronym), _) => write!(f, "{acronym}"),
            (NodeKind::Branch, Some(title)) => write!(f, "{title} (#{})", self.id),
            (NodeKind::Branch, None) => write!(f, "#{}", self.id),
        }
    }
}

/// A node resolved together with its direct children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A branch and its children, in display order.
    Branch(Vec<NodeId>),
    /// A leaf and the acronym of its learning unit.
    Leaf(Acronym),
}

/// One direct child of a branch, as returned by a batched children query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildRef {
    /// A child that is itself a branch.
    Branch(NodeId),
    /// A child that is a learning unit.
    Leaf(Acronym),
}

/// A parent/child row produced by a children query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRow {
    /// The branch the child belongs to.
    pub parent: NodeId,
    /// The child itself.
    pub child: ChildRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_node_id() {
        assert!(NodeId::new(0).is_none());
        assert_eq!(NodeId::new(7).map(NodeId::get), Some(7));
    }

    #[test]
    fn node_id_parses_from_string() {
        let id: NodeId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert!("0".parse::<NodeId>().is_err());
        assert!("abc".parse::<NodeId>().is_err());
    }

    #[test]
    fn display_prefers_acronym_then_title() {
        let id = NodeId::new(3).unwrap();
        let leaf = HierarchyNode::leaf(id, Acronym::try_from("LU100").unwrap());
        assert_eq!(leaf.to_string(), "LU100");

        let titled = HierarchyNode::branch(id, Some("Bachelor in law".to_string()));
        assert_eq!(titled.to_string(), "Bachelor in law (#3)");

        let untitled = HierarchyNode::branch(id, None);
        assert_eq!(untitled.to_string(), "#3");
    }
}
