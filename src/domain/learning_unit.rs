use std::{collections::BTreeMap, fmt};

use borsh::BorshSerialize;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{AcademicYear, Acronym};

/// A learning unit, versioned per academic year.
///
/// The unit itself is created once. A [`Snapshot`] is added for every academic
/// year the unit is taught in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningUnit {
    /// The acronym of the learning unit.
    pub acronym: Acronym,
    /// Classes are sub-parts of a learning unit and are not postponed on
    /// their own.
    pub is_class: bool,
    /// `Some(true)` for external units followed through a mobility program,
    /// `Some(false)` for other external units, `None` for internal units.
    pub mobility: Option<bool>,
    /// The last academic year the unit is taught in, if it is being retired.
    pub end_year: Option<AcademicYear>,
    snapshots: BTreeMap<AcademicYear, Snapshot>,
}

/// The state of a learning unit for a single academic year.
///
/// Snapshots are never modified after they are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Globally unique identifier of this yearly version.
    pub uuid: Uuid,
    /// The title for that year.
    pub title: String,
    /// The number of ECTS credits for that year.
    pub credits: u16,
    /// When the snapshot was created.
    pub created: DateTime<Utc>,
    /// Fingerprint of the snapshot this one was copied from, if any.
    pub copied_from: Option<String>,
}

impl Snapshot {
    /// Creates a new snapshot with a fresh UUID.
    #[must_use]
    pub fn new(title: String, credits: u16) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title,
            credits,
            created: Utc::now(),
            copied_from: None,
        }
    }

    /// Returns a hash of the yearly content of the learning unit.
    ///
    /// Identity and timestamps do not contribute to the fingerprint.
    ///
    /// # Panics
    ///
    /// Panics if borsh serialization fails (which should never happen for this
    /// data structure).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        #[derive(BorshSerialize)]
        struct FingerprintData<'a> {
            title: &'a str,
            credits: u16,
        }

        let data = FingerprintData {
            title: &self.title,
            credits: self.credits,
        };

        let encoded = borsh::to_vec(&data).expect("this should never fail");
        let hash = Sha256::digest(encoded);
        format!("{hash:x}")
    }

    /// Copies this snapshot into a new one, recording where it came from.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: self.title.clone(),
            credits: self.credits,
            created: Utc::now(),
            copied_from: Some(self.fingerprint()),
        }
    }
}

impl LearningUnit {
    /// Creates an internal learning unit with no snapshots.
    #[must_use]
    pub const fn new(acronym: Acronym) -> Self {
        Self {
            acronym,
            is_class: false,
            mobility: None,
            end_year: None,
            snapshots: BTreeMap::new(),
        }
    }

    /// Whether this is an external learning unit.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.mobility.is_some()
    }

    /// The snapshot for a given academic year.
    #[must_use]
    pub fn snapshot(&self, year: AcademicYear) -> Option<&Snapshot> {
        self.snapshots.get(&year)
    }

    /// All snapshots in chronological order.
    pub fn snapshots(&self) -> impl Iterator<Item = (AcademicYear, &Snapshot)> {
        self.snapshots.iter().map(|(year, snapshot)| (*year, snapshot))
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<(AcademicYear, &Snapshot)> {
        self.snapshots
            .iter()
            .next_back()
            .map(|(year, snapshot)| (*year, snapshot))
    }

    /// Adds the snapshot for a year.
    ///
    /// Returns `false`, leaving the existing snapshot untouched, if the year
    /// already has one.
    pub fn insert_snapshot(&mut self, year: AcademicYear, snapshot: Snapshot) -> bool {
        if self.snapshots.contains_key(&year) {
            return false;
        }
        self.snapshots.insert(year, snapshot);
        true
    }
}

impl fmt::Display for LearningUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.acronym)
    }
}
