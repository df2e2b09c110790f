//! Program hierarchy management
//!
//! Programs are trees of sub-groups whose leaves are learning units. This
//! crate collects the learning units of a program, checks that prerequisites
//! stay within their program, and postpones learning units into the following
//! academic years.

pub mod domain;
pub use domain::{
    AcademicYear, Acronym, Config, GapWarning, Hierarchy, LearningUnit, NodeId, Prerequisite,
    PostponementResult, TraversalError, acronyms_outside_subtree, collect_leaf_acronyms,
};

/// Filesystem storage of the program catalogue.
pub mod storage;
pub use storage::{Catalogue, Directory};
