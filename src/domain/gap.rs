//! Finding prerequisites that point outside of a program.

use std::{collections::BTreeSet, fmt};

use tracing::{debug, instrument};

use crate::domain::{
    Acronym, NodeId,
    prerequisite::Prerequisite,
    reader::{HierarchyStore, TraversalError, collect_leaf_acronyms},
};

/// Returns the acronyms in `referenced` that are not reachable from `root`.
///
/// # Errors
///
/// Returns an error if the hierarchy below `root` cannot be walked.
pub fn outside_acronyms<S, I>(
    store: &S,
    root: NodeId,
    referenced: I,
) -> Result<BTreeSet<Acronym>, TraversalError<S::Error>>
where
    S: HierarchyStore,
    I: IntoIterator<Item = Acronym>,
{
    let reachable = collect_leaf_acronyms(store, &BTreeSet::from([root]))?;
    Ok(referenced
        .into_iter()
        .filter(|acronym| !reachable.contains(acronym))
        .collect())
}

/// Returns the acronyms referenced by `prerequisite` that are not part of the
/// program rooted at `root`.
///
/// The result is empty if and only if every referenced learning unit is
/// reachable from `root`.
///
/// # Errors
///
/// Returns an error if the hierarchy below `root` cannot be walked.
#[instrument(level = "debug", skip(store, prerequisite), fields(prerequisite = prerequisite.id))]
pub fn acronyms_outside_subtree<S: HierarchyStore>(
    store: &S,
    root: NodeId,
    prerequisite: &Prerequisite,
) -> Result<BTreeSet<Acronym>, TraversalError<S::Error>> {
    let outside = outside_acronyms(store, root, prerequisite.expression.acronyms())?;
    debug!(outside = outside.len(), "checked prerequisite");
    Ok(outside)
}

/// Checks a prerequisite and wraps a non-empty result in a [`GapWarning`].
///
/// # Errors
///
/// Returns an error if the hierarchy below `root` cannot be walked.
pub fn check_prerequisite<S: HierarchyStore>(
    store: &S,
    root: NodeId,
    prerequisite: &Prerequisite,
) -> Result<Option<GapWarning>, TraversalError<S::Error>> {
    let outside = acronyms_outside_subtree(store, root, prerequisite)?;
    if outside.is_empty() {
        return Ok(None);
    }
    Ok(Some(GapWarning {
        learning_unit: prerequisite.learning_unit.clone(),
        root,
        outside,
    }))
}

/// A prerequisite that references learning units outside its program.
///
/// This is informational: it never prevents a prerequisite from being saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapWarning {
    /// The learning unit whose prerequisite was checked.
    pub learning_unit: Acronym,
    /// The program the prerequisite belongs to.
    pub root: NodeId,
    /// Referenced learning units that are not part of the program.
    pub outside: BTreeSet<Acronym>,
}

impl fmt::Display for GapWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let outside: Vec<&str> = self.outside.iter().map(Acronym::as_str).collect();
        write!(
            f,
            "The prerequisites {} for the learning unit {} are outside of program #{}",
            outside.join(", "),
            self.learning_unit,
            self.root
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        node::HierarchyNode,
        tree::{Hierarchy, LinkData},
    };

    fn id(n: u64) -> NodeId {
        NodeId::new(n).unwrap()
    }

    fn acronym(s: &str) -> Acronym {
        Acronym::try_from(s).unwrap()
    }

    /// R(1) -> B(2), LU100(3) ; B(2) -> LU200(4). LX1(5) lives elsewhere.
    fn program() -> Hierarchy {
        let mut tree = Hierarchy::default();
        tree.insert(HierarchyNode::branch(id(1), Some("R".to_string())))
            .unwrap();
        tree.insert(HierarchyNode::branch(id(2), Some("B".to_string())))
            .unwrap();
        tree.insert(HierarchyNode::leaf(id(3), acronym("LU100")))
            .unwrap();
        tree.insert(HierarchyNode::leaf(id(4), acronym("LU200")))
            .unwrap();
        tree.insert(HierarchyNode::leaf(id(5), acronym("LX1")))
            .unwrap();
        tree.link(id(1), id(2), LinkData::default()).unwrap();
        tree.link(id(1), id(3), LinkData::default()).unwrap();
        tree.link(id(2), id(4), LinkData::default()).unwrap();
        tree
    }

    fn prerequisite(expression: &str) -> Prerequisite {
        Prerequisite {
            id: 7,
            root: id(1),
            learning_unit: acronym("LU200"),
            expression: expression.parse().unwrap(),
        }
    }

    #[test]
    fn reachable_references_produce_no_gap() {
        let tree = program();
        let outside = acronyms_outside_subtree(&tree, id(1), &prerequisite("LU100")).unwrap();
        assert!(outside.is_empty());
        assert_eq!(
            check_prerequisite(&tree, id(1), &prerequisite("LU100")).unwrap(),
            None
        );
    }

    #[test]
    fn reference_outside_root_is_reported() {
        let tree = program();
        let outside =
            acronyms_outside_subtree(&tree, id(1), &prerequisite("LU100 AND (LX1 OR LU200)"))
                .unwrap();
        assert_eq!(outside, BTreeSet::from([acronym("LX1")]));
    }

    #[test]
    fn sibling_branch_is_outside_of_a_subgroup() {
        let tree = program();
        let outside = acronyms_outside_subtree(&tree, id(2), &prerequisite("LU100")).unwrap();
        assert_eq!(outside, BTreeSet::from([acronym("LU100")]));
    }

    #[test]
    fn empty_prerequisite_has_no_gap() {
        let tree = program();
        let outside = acronyms_outside_subtree(&tree, id(1), &prerequisite("")).unwrap();
        assert!(outside.is_empty());
    }

    #[test]
    fn warning_lists_every_outside_acronym() {
        let tree = program();
        let warning = check_prerequisite(&tree, id(1), &prerequisite("LX1 OR LZ9"))
            .unwrap()
            .expect("gap expected");
        assert_eq!(
            warning.to_string(),
            "The prerequisites LX1, LZ9 for the learning unit LU200 are outside of program #1"
        );
    }

    #[test]
    fn plain_acronym_lists_are_supported() {
        let tree = program();
        let outside =
            outside_acronyms(&tree, id(1), vec![acronym("LU200"), acronym("LX1")]).unwrap();
        assert_eq!(outside, BTreeSet::from([acronym("LX1")]));
    }
}
