//! The catalogue: a program hierarchy, its prerequisites and its learning
//! units, serialized as a single YAML document.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    convert::Infallible,
    io,
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{
    AcademicYear, Acronym, GapWarning, Hierarchy, HierarchyNode, LearningUnit, NodeId, NodeKind,
    Prerequisite, PrerequisiteSource, TraversalError,
    gap::check_prerequisite,
    learning_unit::Snapshot,
    postponement::{
        DuplicateError, LearningUnitPolicy, PostponementConfig, PostponementResult,
        duplicate_learning_unit, learning_unit_filter, postpone,
    },
    tree::{InsertError, LinkData, LinkError},
};

/// Errors that can occur when loading a catalogue.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    /// The catalogue file could not be read or written.
    #[error("failed to access catalogue: {0}")]
    Io(#[from] io::Error),
    /// The catalogue is not valid YAML, or does not match the schema.
    #[error("failed to parse catalogue: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A node is declared twice.
    #[error(transparent)]
    Node(#[from] InsertError),
    /// A link references an unknown node, or hangs below a learning unit.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// A learning unit is declared twice.
    #[error("learning unit {0} is declared twice")]
    DuplicateUnit(Acronym),
    /// A learning unit has two snapshots for the same year.
    #[error("learning unit {acronym} has two snapshots for {year}")]
    DuplicateSnapshot {
        /// The learning unit.
        acronym: Acronym,
        /// The academic year declared twice.
        year: AcademicYear,
    },
    /// A prerequisite identifier is used twice.
    #[error("prerequisite {0} is declared twice")]
    DuplicatePrerequisite(u64),
}

/// Everything the core needs, loaded in memory.
#[derive(Debug, Default, Clone)]
pub struct Catalogue {
    hierarchy: Hierarchy,
    prerequisites: BTreeMap<u64, Prerequisite>,
    learning_units: BTreeMap<Acronym, LearningUnit>,
}

impl Catalogue {
    /// Reads a catalogue from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not describe a
    /// consistent catalogue.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Writes the catalogue to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    #[instrument(level = "debug", skip(self))]
    pub fn save(&self, path: &Path) -> Result<(), CatalogueError> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Parses a catalogue from YAML.
    ///
    /// Links are loaded without cycle checks, so that an inconsistent
    /// hierarchy can still be inspected and reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or declares duplicate or
    /// dangling entries.
    pub fn from_yaml(content: &str) -> Result<Self, CatalogueError> {
        let CatalogueFile::V1 {
            nodes,
            links,
            prerequisites,
            learning_units,
        } = serde_yaml::from_str(content)?;

        let mut hierarchy = Hierarchy::with_capacity(nodes.len());
        for node in nodes {
            hierarchy.insert(node.into())?;
        }
        for link in links {
            hierarchy.upsert_link(
                link.parent,
                link.child,
                LinkData {
                    order: link.order,
                    mandatory: link.mandatory,
                },
            )?;
        }

        let mut by_id = BTreeMap::new();
        for prerequisite in prerequisites {
            match by_id.entry(prerequisite.id) {
                Entry::Occupied(_) => {
                    return Err(CatalogueError::DuplicatePrerequisite(prerequisite.id));
                }
                Entry::Vacant(slot) => {
                    slot.insert(prerequisite);
                }
            }
        }

        let mut units = BTreeMap::new();
        for record in learning_units {
            let unit = record.into_learning_unit()?;
            match units.entry(unit.acronym.clone()) {
                Entry::Occupied(_) => return Err(CatalogueError::DuplicateUnit(unit.acronym)),
                Entry::Vacant(slot) => {
                    slot.insert(unit);
                }
            }
        }

        debug!(
            nodes = hierarchy.len(),
            prerequisites = by_id.len(),
            learning_units = units.len(),
            "loaded catalogue"
        );

        Ok(Self {
            hierarchy,
            prerequisites: by_id,
            learning_units: units,
        })
    }

    /// Serializes the catalogue to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, CatalogueError> {
        let mut nodes: Vec<NodeRecord> = self.hierarchy.iter().map(NodeRecord::from).collect();
        nodes.sort_by_key(NodeRecord::id);

        let mut links: Vec<LinkRecord> = self
            .hierarchy
            .links()
            .map(|(parent, child, data)| LinkRecord {
                parent,
                child,
                order: data.order,
                mandatory: data.mandatory,
            })
            .collect();
        links.sort_by_key(|link| (link.parent, link.order, link.child));

        let file = CatalogueFile::V1 {
            nodes,
            links,
            prerequisites: self.prerequisites.values().cloned().collect(),
            learning_units: self
                .learning_units
                .values()
                .map(LearningUnitRecord::from)
                .collect(),
        };

        Ok(serde_yaml::to_string(&file)?)
    }

    /// The program hierarchy.
    #[must_use]
    pub const fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Mutable access to the program hierarchy.
    pub const fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }

    /// All prerequisites, ordered by identifier.
    pub fn prerequisites(&self) -> impl Iterator<Item = &Prerequisite> {
        self.prerequisites.values()
    }

    /// All learning units, ordered by acronym.
    pub fn learning_units(&self) -> impl Iterator<Item = &LearningUnit> {
        self.learning_units.values()
    }

    /// Looks a learning unit up by acronym.
    #[must_use]
    pub fn learning_unit(&self, acronym: &Acronym) -> Option<&LearningUnit> {
        self.learning_units.get(acronym)
    }

    /// Checks every prerequisite against the program it was defined in.
    ///
    /// # Errors
    ///
    /// Returns an error if a program hierarchy contains a cycle.
    #[instrument(level = "debug", skip(self))]
    pub fn check_prerequisites(&self) -> Result<Vec<GapWarning>, TraversalError<Infallible>> {
        let mut warnings = Vec::new();
        for prerequisite in self.prerequisites.values() {
            if let Some(warning) =
                check_prerequisite(&self.hierarchy, prerequisite.root, prerequisite)?
            {
                warnings.push(warning);
            }
        }
        Ok(warnings)
    }

    /// Runs the yearly postponement of learning units.
    ///
    /// `notify_before` receives the learning units about to be postponed,
    /// `notify_after` receives them again with the outcome.
    pub fn postpone<'a>(
        &'a mut self,
        policy: LearningUnitPolicy,
        notify_before: impl FnMut(&[LearningUnit]) + 'a,
        notify_after: impl FnMut(&[LearningUnit], &PostponementResult) + 'a,
    ) -> PostponementResult {
        let records: Vec<LearningUnit> = self.learning_units.values().cloned().collect();
        let units = &mut self.learning_units;

        let mut config: PostponementConfig<'a, LearningUnit, AcademicYear, DuplicateError> =
            PostponementConfig {
                entity_filter: Box::new(learning_unit_filter(policy)),
                duplicate: Box::new(move |record: &LearningUnit| {
                    duplicate_learning_unit(units, record)
                }),
                notify_before: Box::new(notify_before),
                notify_after: Box::new(notify_after),
            };

        postpone(&mut config, records)
    }
}

impl PrerequisiteSource for Catalogue {
    fn prerequisite(&self, id: u64) -> Option<&Prerequisite> {
        self.prerequisites.get(&id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum CatalogueFile {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        nodes: Vec<NodeRecord>,
        #[serde(default)]
        links: Vec<LinkRecord>,
        #[serde(default)]
        prerequisites: Vec<Prerequisite>,
        #[serde(default)]
        learning_units: Vec<LearningUnitRecord>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum NodeRecord {
    Branch {
        id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Leaf {
        id: NodeId,
        acronym: Acronym,
    },
}

impl NodeRecord {
    const fn id(&self) -> NodeId {
        match self {
            Self::Branch { id, .. } | Self::Leaf { id, .. } => *id,
        }
    }
}

impl From<NodeRecord> for HierarchyNode {
    fn from(record: NodeRecord) -> Self {
        match record {
            NodeRecord::Branch { id, title } => Self::branch(id, title),
            NodeRecord::Leaf { id, acronym } => Self::leaf(id, acronym),
        }
    }
}

impl From<&HierarchyNode> for NodeRecord {
    fn from(node: &HierarchyNode) -> Self {
        match &node.kind {
            NodeKind::Branch => Self::Branch {
                id: node.id,
                title: node.title.clone(),
            },
            NodeKind::Leaf(acronym) => Self::Leaf {
                id: node.id,
                acronym: acronym.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkRecord {
    parent: NodeId,
    child: NodeId,
    #[serde(default)]
    order: u32,
    #[serde(default)]
    mandatory: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct LearningUnitRecord {
    acronym: Acronym,
    #[serde(default)]
    is_class: bool,
    #[serde(default)]
    mobility: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_year: Option<AcademicYear>,
    #[serde(default)]
    snapshots: Vec<SnapshotRecord>,
}

impl LearningUnitRecord {
    fn into_learning_unit(self) -> Result<LearningUnit, CatalogueError> {
        let mut unit = LearningUnit::new(self.acronym);
        unit.is_class = self.is_class;
        unit.mobility = self.mobility;
        unit.end_year = self.end_year;

        for record in self.snapshots {
            let year = record.year;
            let snapshot = Snapshot {
                uuid: record.uuid,
                title: record.title,
                credits: record.credits,
                created: record.created,
                copied_from: record.copied_from,
            };
            if !unit.insert_snapshot(year, snapshot) {
                return Err(CatalogueError::DuplicateSnapshot {
                    acronym: unit.acronym,
                    year,
                });
            }
        }

        Ok(unit)
    }
}

impl From<&LearningUnit> for LearningUnitRecord {
    fn from(unit: &LearningUnit) -> Self {
        Self {
            acronym: unit.acronym.clone(),
            is_class: unit.is_class,
            mobility: unit.mobility,
            end_year: unit.end_year,
            snapshots: unit
                .snapshots()
                .map(|(year, snapshot)| SnapshotRecord {
                    year,
                    uuid: snapshot.uuid,
                    title: snapshot.title.clone(),
                    credits: snapshot.credits,
                    created: snapshot.created,
                    copied_from: snapshot.copied_from.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    year: AcademicYear,
    #[serde(default = "Uuid::new_v4")]
    uuid: Uuid,
    title: String,
    credits: u16,
    #[serde(default = "Utc::now")]
    created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    copied_from: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::BTreeSet};

    use super::*;
    use crate::domain::collect_leaf_acronyms;

    const SAMPLE: &str = r#"
_version: "1"
nodes:
  - { id: 1, kind: branch, title: "Bachelor in law" }
  - { id: 2, kind: branch, title: "Common core" }
  - { id: 3, kind: leaf, acronym: LU100 }
  - { id: 4, kind: leaf, acronym: LU200 }
  - { id: 5, kind: leaf, acronym: LX1 }
links:
  - { parent: 1, child: 2, order: 1, mandatory: true }
  - { parent: 1, child: 3, order: 2 }
  - { parent: 2, child: 4, order: 1 }
prerequisites:
  - { id: 1, root: 1, learning_unit: LU200, expression: "LU100" }
  - { id: 2, root: 1, learning_unit: LU100, expression: "LX1 OR LU200" }
learning_units:
  - acronym: LU100
    snapshots:
      - { year: 2020, title: "Civil law", credits: 5, created: "2020-06-01T00:00:00Z" }
  - acronym: LU200
    is_class: true
    snapshots:
      - { year: 2020, title: "Civil law, tutorials", credits: 2 }
  - acronym: LX1
    mobility: true
    snapshots:
      - { year: 2020, title: "Exchange", credits: 5 }
"#;

    fn acronym(s: &str) -> Acronym {
        Acronym::try_from(s).unwrap()
    }

    fn policy() -> LearningUnitPolicy {
        LearningUnitPolicy {
            horizon: AcademicYear::new(2026),
            exclude_classes: true,
            exclude_mobility: true,
        }
    }

    #[test]
    fn loads_hierarchy_prerequisites_and_units() {
        let catalogue = Catalogue::from_yaml(SAMPLE).unwrap();

        let root = NodeId::new(1).unwrap();
        let leaves =
            collect_leaf_acronyms(catalogue.hierarchy(), &BTreeSet::from([root])).unwrap();
        assert_eq!(leaves, BTreeSet::from([acronym("LU100"), acronym("LU200")]));

        assert_eq!(catalogue.prerequisites().count(), 2);
        assert_eq!(
            catalogue.prerequisite(2).map(|p| p.learning_unit.clone()),
            Some(acronym("LU100"))
        );
        assert!(catalogue.learning_unit(&acronym("LU200")).unwrap().is_class);
        assert!(catalogue.learning_unit(&acronym("LX1")).unwrap().is_external());
    }

    #[test]
    fn prerequisite_check_reports_outside_units() {
        let catalogue = Catalogue::from_yaml(SAMPLE).unwrap();
        let warnings = catalogue.check_prerequisites().unwrap();

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].learning_unit, acronym("LU100"));
        assert_eq!(warnings[0].outside, BTreeSet::from([acronym("LX1")]));
    }

    #[test]
    fn postpone_extends_only_qualifying_units() {
        let mut catalogue = Catalogue::from_yaml(SAMPLE).unwrap();
        let before = Cell::new(0);
        let after = Cell::new(0);

        let result = catalogue.postpone(
            policy(),
            |units: &[LearningUnit]| {
                assert_eq!(units.len(), 1);
                before.set(before.get() + 1);
            },
            |_: &[LearningUnit], _: &PostponementResult| after.set(after.get() + 1),
        );

        assert_eq!(result.to_string(), "1 extended and 0 error(s)");
        assert_eq!(before.get(), 1);
        assert_eq!(after.get(), 1);

        let unit = catalogue.learning_unit(&acronym("LU100")).unwrap();
        assert!(unit.snapshot(AcademicYear::new(2021)).is_some());
        let class = catalogue.learning_unit(&acronym("LU200")).unwrap();
        assert!(class.snapshot(AcademicYear::new(2021)).is_none());
    }

    #[test]
    fn save_and_reload_preserves_content() {
        let mut catalogue = Catalogue::from_yaml(SAMPLE).unwrap();
        catalogue.postpone(
            policy(),
            |_: &[LearningUnit]| {},
            |_: &[LearningUnit], _: &PostponementResult| {},
        );

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalogue.yaml");
        catalogue.save(&path).unwrap();
        let reloaded = Catalogue::load(&path).unwrap();

        assert_eq!(reloaded.hierarchy().len(), 5);
        assert_eq!(reloaded.hierarchy().links().count(), 3);
        assert_eq!(
            reloaded.learning_units().collect::<Vec<_>>(),
            catalogue.learning_units().collect::<Vec<_>>()
        );
        assert_eq!(
            reloaded.prerequisites().collect::<Vec<_>>(),
            catalogue.prerequisites().collect::<Vec<_>>()
        );
    }

    #[test]
    fn dangling_link_is_rejected() {
        let yaml = r#"
_version: "1"
nodes:
  - { id: 1, kind: branch }
links:
  - { parent: 1, child: 9 }
"#;
        let err = Catalogue::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            CatalogueError::Link(LinkError::ChildNotFound(_))
        ));
    }

    #[test]
    fn duplicate_snapshot_year_is_rejected() {
        let yaml = r#"
_version: "1"
learning_units:
  - acronym: LU100
    snapshots:
      - { year: 2020, title: "A", credits: 5 }
      - { year: 2020, title: "B", credits: 5 }
"#;
        let err = Catalogue::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, CatalogueError::DuplicateSnapshot { .. }));
    }

    #[test]
    fn out_of_range_snapshot_year_is_rejected() {
        let yaml = r#"
_version: "1"
learning_units:
  - acronym: LU100
    snapshots:
      - { year: 65535, title: "A", credits: 5 }
"#;
        let err = Catalogue::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, CatalogueError::Yaml(_)));
    }

    #[test]
    fn cyclic_hierarchy_loads_but_fails_checks() {
        let yaml = r#"
_version: "1"
nodes:
  - { id: 1, kind: branch }
  - { id: 2, kind: branch }
links:
  - { parent: 1, child: 2 }
  - { parent: 2, child: 1 }
prerequisites:
  - { id: 1, root: 1, learning_unit: LU100, expression: "LU200" }
"#;
        let catalogue = Catalogue::from_yaml(yaml).unwrap();
        assert!(catalogue.hierarchy().has_cycles());
        assert!(matches!(
            catalogue.check_prerequisites().unwrap_err(),
            TraversalError::Cycle(_)
        ));
    }

    #[test]
    fn empty_document_is_an_empty_catalogue() {
        let catalogue = Catalogue::from_yaml("_version: \"1\"\n").unwrap();
        assert!(catalogue.hierarchy().is_empty());
        assert_eq!(catalogue.learning_units().count(), 0);
    }
}
