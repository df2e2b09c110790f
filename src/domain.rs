//! Domain models for program management.
//!
//! This module contains the core domain types including the program
//! hierarchy, prerequisites, learning units and configuration.

mod academic_year;
pub use academic_year::{AcademicYear, YearError};

mod acronym;
pub use acronym::{Acronym, AcronymError};

mod config;
pub use config::Config;

pub mod gap;
pub use gap::{GapWarning, acronyms_outside_subtree, outside_acronyms};

/// Learning units and their yearly snapshots.
pub mod learning_unit;
pub use learning_unit::{LearningUnit, Snapshot};

pub mod node;
pub use node::{HierarchyNode, Node, NodeId, NodeKind};

pub mod postponement;
pub use postponement::{PostponementConfig, PostponementResult};

pub mod prerequisite;
pub use prerequisite::{Prerequisite, PrerequisiteExpression, PrerequisiteSource};

pub mod reader;
pub use reader::{HierarchyStore, TraversalError, collect_leaf_acronyms};

pub mod tree;
pub use tree::{Hierarchy, LinkError};
