//! Annual postponement of yearly-versioned records into the next academic
//! year.
//!
//! The runner is generic: the caller provides a [`PostponementConfig`] that
//! says which records qualify, how one record is copied forward, and who is
//! told before and after the batch. [`learning_unit_filter`] and
//! [`duplicate_learning_unit`] specialise it for learning units.

use std::{collections::BTreeMap, fmt};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::{AcademicYear, Acronym, LearningUnit};

/// Outcome of copying one record forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Duplication<S> {
    /// A new snapshot was created.
    Created(S),
    /// The target year already had a snapshot; nothing was written.
    AlreadyExists,
}

/// Duplicate operation supplied to the runner.
pub type DuplicateFn<'a, R, S, E> = Box<dyn FnMut(&R) -> Result<Duplication<S>, E> + 'a>;

/// How a postponement batch selects, copies and reports on records.
pub struct PostponementConfig<'a, R, S, E> {
    /// Keeps only the records that should be postponed.
    pub entity_filter: Box<dyn Fn(&R) -> bool + 'a>,
    /// Copies the latest snapshot of one record into the next year.
    pub duplicate: DuplicateFn<'a, R, S, E>,
    /// Called once, before any record is processed.
    pub notify_before: Box<dyn FnMut(&[R]) + 'a>,
    /// Called once, after every record was processed.
    pub notify_after: Box<dyn FnMut(&[R], &PostponementResult) + 'a>,
}

impl<R, S, E> fmt::Debug for PostponementConfig<'_, R, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostponementConfig").finish_non_exhaustive()
    }
}

/// A record that could not be postponed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// The record, as displayed.
    pub record: String,
    /// Why the duplication failed.
    pub message: String,
}

/// Tally of a postponement batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostponementResult {
    /// Records for which a new snapshot was created.
    pub extended: usize,
    /// Records whose target snapshot already existed.
    pub skipped: usize,
    /// Records whose duplication failed.
    pub errors: Vec<RecordError>,
}

impl PostponementResult {
    /// The number of records extended.
    #[must_use]
    pub const fn number_extended(&self) -> usize {
        self.extended
    }

    /// The number of records that failed.
    #[must_use]
    pub fn number_error(&self) -> usize {
        self.errors.len()
    }
}

impl fmt::Display for PostponementResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} extended and {} error(s)",
            self.number_extended(),
            self.number_error()
        )
    }
}

/// Postpones every qualifying record of `records`.
///
/// A failure to duplicate one record is recorded in the result and does not
/// stop the batch.
#[instrument(level = "debug", skip_all, fields(records = records.len()))]
pub fn postpone<R, S, E>(
    config: &mut PostponementConfig<'_, R, S, E>,
    records: Vec<R>,
) -> PostponementResult
where
    R: fmt::Display,
    E: fmt::Display,
{
    let working: Vec<R> = records
        .into_iter()
        .filter(|record| (config.entity_filter)(record))
        .collect();
    debug!(qualifying = working.len(), "resolved working set");

    (config.notify_before)(&working);

    let mut result = PostponementResult::default();
    for record in &working {
        match (config.duplicate)(record) {
            Ok(Duplication::Created(_)) => {
                debug!(%record, "extended");
                result.extended += 1;
            }
            Ok(Duplication::AlreadyExists) => {
                debug!(%record, "already extended");
                result.skipped += 1;
            }
            Err(error) => {
                warn!(%record, %error, "postponement failed");
                result.errors.push(RecordError {
                    record: record.to_string(),
                    message: error.to_string(),
                });
            }
        }
    }

    info!(%result, skipped = result.skipped, "postponement finished");
    (config.notify_after)(&working, &result);

    result
}

/// Loads the base collection and postpones it.
///
/// This is the entry point for callers whose records come from a fallible
/// source. [`Directory::load`](crate::storage::Directory::load) reads the
/// catalogue up front, so the CLI already fails before any notification and
/// then calls [`postpone`] directly.
///
/// # Errors
///
/// A failure of `load` aborts the whole batch: it is returned as-is, and
/// neither notification is sent.
pub fn run<R, S, E, L, LE>(
    config: &mut PostponementConfig<'_, R, S, E>,
    load: L,
) -> Result<PostponementResult, LE>
where
    R: fmt::Display,
    E: fmt::Display,
    L: FnOnce() -> Result<Vec<R>, LE>,
{
    let records = load()?;
    Ok(postpone(config, records))
}

/// Which learning units the yearly postponement applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearningUnitPolicy {
    /// The furthest academic year snapshots are extended to.
    pub horizon: AcademicYear,
    /// Skip classes.
    pub exclude_classes: bool,
    /// Skip external units followed through a mobility program.
    pub exclude_mobility: bool,
}

/// Selects the learning units that should be postponed under `policy`.
///
/// Units without any snapshot, units that already reached the horizon, and
/// units that end before their next year are never selected.
pub fn learning_unit_filter(policy: LearningUnitPolicy) -> impl Fn(&LearningUnit) -> bool {
    move |unit| {
        if policy.exclude_classes && unit.is_class {
            return false;
        }
        if policy.exclude_mobility && unit.mobility == Some(true) {
            return false;
        }
        let Some((latest, _)) = unit.latest() else {
            return false;
        };
        if latest >= policy.horizon {
            return false;
        }
        unit.end_year.is_none_or(|end| end > latest)
    }
}

/// Errors that can occur when postponing a single learning unit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DuplicateError {
    /// The learning unit is not present in the store.
    #[error("learning unit {0} not found")]
    UnknownUnit(Acronym),
    /// The learning unit has no snapshot to copy.
    #[error("learning unit {0} has no yearly snapshot to copy")]
    NoSnapshot(Acronym),
    /// The latest snapshot is already in the last representable year.
    #[error("learning unit {0} cannot be extended past {max}", max = AcademicYear::MAX)]
    YearOverflow(Acronym),
}

/// Copies the latest snapshot of `record` into the following academic year.
///
/// The target year is derived from `record`, so running the same batch twice
/// produces [`Duplication::AlreadyExists`] the second time.
///
/// # Errors
///
/// Returns an error if the unit is missing from `units`, has no snapshot, or
/// its latest snapshot is in [`AcademicYear::MAX`].
pub fn duplicate_learning_unit(
    units: &mut BTreeMap<Acronym, LearningUnit>,
    record: &LearningUnit,
) -> Result<Duplication<AcademicYear>, DuplicateError> {
    let (source_year, _) = record
        .latest()
        .ok_or_else(|| DuplicateError::NoSnapshot(record.acronym.clone()))?;
    let unit = units
        .get_mut(&record.acronym)
        .ok_or_else(|| DuplicateError::UnknownUnit(record.acronym.clone()))?;

    let target = source_year
        .next()
        .ok_or_else(|| DuplicateError::YearOverflow(record.acronym.clone()))?;
    if unit.snapshot(target).is_some() {
        return Ok(Duplication::AlreadyExists);
    }

    let copy = unit
        .snapshot(source_year)
        .ok_or_else(|| DuplicateError::NoSnapshot(record.acronym.clone()))?
        .duplicate();
    unit.insert_snapshot(target, copy);

    Ok(Duplication::Created(target))
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::domain::learning_unit::Snapshot;

    fn acronym(s: &str) -> Acronym {
        Acronym::try_from(s).unwrap()
    }

    fn unit_with_years(name: &str, years: &[u16]) -> LearningUnit {
        let mut unit = LearningUnit::new(acronym(name));
        for &year in years {
            unit.insert_snapshot(
                AcademicYear::new(year),
                Snapshot::new(format!("{name} title"), 5),
            );
        }
        unit
    }

    fn policy() -> LearningUnitPolicy {
        LearningUnitPolicy {
            horizon: AcademicYear::new(2026),
            exclude_classes: true,
            exclude_mobility: true,
        }
    }

    #[test]
    fn one_failure_does_not_abort_the_batch() {
        let before = Cell::new(0);
        let after = Cell::new(0);

        let mut config: PostponementConfig<'_, u32, (), String> = PostponementConfig {
            entity_filter: Box::new(|_: &u32| true),
            duplicate: Box::new(|record: &u32| {
                if *record == 3 {
                    Err("boom".to_string())
                } else {
                    Ok(Duplication::Created(()))
                }
            }),
            notify_before: Box::new(|records: &[u32]| {
                assert_eq!(records.len(), 5);
                before.set(before.get() + 1);
            }),
            notify_after: Box::new(|_: &[u32], result: &PostponementResult| {
                assert_eq!(result.number_extended(), 4);
                after.set(after.get() + 1);
            }),
        };

        let result = postpone(&mut config, vec![1, 2, 3, 4, 5]);
        drop(config);

        assert_eq!(result.number_extended(), 4);
        assert_eq!(result.number_error(), 1);
        assert_eq!(
            result.errors,
            vec![RecordError {
                record: "3".to_string(),
                message: "boom".to_string()
            }]
        );
        assert_eq!(result.to_string(), "4 extended and 1 error(s)");
        assert_eq!(before.get(), 1);
        assert_eq!(after.get(), 1);
    }

    #[test]
    fn filter_narrows_the_working_set() {
        let seen = RefCell::new(Vec::new());

        let mut config: PostponementConfig<'_, u32, (), String> = PostponementConfig {
            entity_filter: Box::new(|record: &u32| record % 2 == 0),
            duplicate: Box::new(|record: &u32| {
                seen.borrow_mut().push(*record);
                Ok(Duplication::Created(()))
            }),
            notify_before: Box::new(|_: &[u32]| {}),
            notify_after: Box::new(|_: &[u32], _: &PostponementResult| {}),
        };

        let result = postpone(&mut config, vec![1, 2, 3, 4]);
        drop(config);

        assert_eq!(result.number_extended(), 2);
        assert_eq!(seen.into_inner(), vec![2, 4]);
    }

    #[test]
    fn load_failure_is_fatal_and_silent() {
        let notified = Cell::new(false);

        let mut config: PostponementConfig<'_, u32, (), String> = PostponementConfig {
            entity_filter: Box::new(|_: &u32| true),
            duplicate: Box::new(|_: &u32| Ok(Duplication::Created(()))),
            notify_before: Box::new(|_: &[u32]| notified.set(true)),
            notify_after: Box::new(|_: &[u32], _: &PostponementResult| notified.set(true)),
        };

        let result = run(&mut config, || Err::<Vec<u32>, _>("connection lost"));
        drop(config);

        assert_eq!(result.unwrap_err(), "connection lost");
        assert!(!notified.get());
    }

    #[test]
    fn empty_batch_still_notifies() {
        let after = Cell::new(0);

        let mut config: PostponementConfig<'_, u32, (), String> = PostponementConfig {
            entity_filter: Box::new(|_: &u32| true),
            duplicate: Box::new(|_: &u32| Ok(Duplication::Created(()))),
            notify_before: Box::new(|_: &[u32]| {}),
            notify_after: Box::new(|_: &[u32], result: &PostponementResult| {
                assert_eq!(result.to_string(), "0 extended and 0 error(s)");
                after.set(after.get() + 1);
            }),
        };

        let result = run(&mut config, || Ok::<_, String>(Vec::new())).unwrap();
        drop(config);

        assert_eq!(result, PostponementResult::default());
        assert_eq!(after.get(), 1);
    }

    #[test]
    fn learning_unit_filter_excludes_classes_mobility_and_finished_units() {
        let filter = learning_unit_filter(policy());

        let regular = unit_with_years("LU100", &[2020]);
        assert!(filter(&regular));

        let mut class = unit_with_years("LU101", &[2020]);
        class.is_class = true;
        assert!(!filter(&class));

        let mut mobility = unit_with_years("LU102", &[2020]);
        mobility.mobility = Some(true);
        assert!(!filter(&mobility));

        let mut external = unit_with_years("LU103", &[2020]);
        external.mobility = Some(false);
        assert!(filter(&external));

        let at_horizon = unit_with_years("LU104", &[2026]);
        assert!(!filter(&at_horizon));

        let without_snapshot = unit_with_years("LU105", &[]);
        assert!(!filter(&without_snapshot));

        let mut ending = unit_with_years("LU106", &[2020]);
        ending.end_year = Some(AcademicYear::new(2020));
        assert!(!filter(&ending));
        ending.end_year = Some(AcademicYear::new(2022));
        assert!(filter(&ending));
    }

    #[test]
    fn policy_switches_are_honoured() {
        let filter = learning_unit_filter(LearningUnitPolicy {
            exclude_classes: false,
            exclude_mobility: false,
            ..policy()
        });

        let mut class = unit_with_years("LU101", &[2020]);
        class.is_class = true;
        assert!(filter(&class));

        let mut mobility = unit_with_years("LU102", &[2020]);
        mobility.mobility = Some(true);
        assert!(filter(&mobility));
    }

    fn store(units: Vec<LearningUnit>) -> BTreeMap<Acronym, LearningUnit> {
        units
            .into_iter()
            .map(|unit| (unit.acronym.clone(), unit))
            .collect()
    }

    #[test]
    fn duplicate_copies_latest_snapshot_forward() {
        let unit = unit_with_years("LU100", &[2019, 2020]);
        let mut units = store(vec![unit.clone()]);

        let outcome = duplicate_learning_unit(&mut units, &unit).unwrap();
        assert_eq!(outcome, Duplication::Created(AcademicYear::new(2021)));

        let stored = &units[&acronym("LU100")];
        let source = stored.snapshot(AcademicYear::new(2020)).unwrap();
        let copy = stored.snapshot(AcademicYear::new(2021)).unwrap();
        assert_eq!(copy.title, source.title);
        assert_eq!(copy.copied_from, Some(source.fingerprint()));
    }

    #[test]
    fn duplicate_reports_missing_units() {
        let unit = unit_with_years("LU100", &[2020]);
        let mut units = BTreeMap::new();
        assert_eq!(
            duplicate_learning_unit(&mut units, &unit).unwrap_err(),
            DuplicateError::UnknownUnit(acronym("LU100"))
        );

        let empty = unit_with_years("LU200", &[]);
        let mut units = store(vec![empty.clone()]);
        assert_eq!(
            duplicate_learning_unit(&mut units, &empty).unwrap_err(),
            DuplicateError::NoSnapshot(acronym("LU200"))
        );
    }

    #[test]
    fn duplicate_in_the_last_year_is_an_error() {
        let unit = unit_with_years("LU100", &[9999]);
        let mut units = store(vec![unit.clone()]);
        assert_eq!(
            duplicate_learning_unit(&mut units, &unit).unwrap_err(),
            DuplicateError::YearOverflow(acronym("LU100"))
        );
        assert_eq!(units[&acronym("LU100")].snapshots().count(), 1);
    }

    fn run_batch(
        units: &mut BTreeMap<Acronym, LearningUnit>,
        records: Vec<LearningUnit>,
    ) -> PostponementResult {
        let mut config: PostponementConfig<'_, LearningUnit, AcademicYear, DuplicateError> =
            PostponementConfig {
                entity_filter: Box::new(learning_unit_filter(policy())),
                duplicate: Box::new(|record: &LearningUnit| duplicate_learning_unit(units, record)),
                notify_before: Box::new(|_: &[LearningUnit]| {}),
                notify_after: Box::new(|_: &[LearningUnit], _: &PostponementResult| {}),
            };
        postpone(&mut config, records)
    }

    #[test]
    fn rerunning_the_same_batch_creates_no_duplicates() {
        let records = vec![
            unit_with_years("LU100", &[2020]),
            unit_with_years("LU200", &[2021]),
        ];
        let mut units = store(records.clone());

        let first = run_batch(&mut units, records.clone());
        assert_eq!(first.number_extended(), 2);

        let second = run_batch(&mut units, records);
        assert_eq!(second.number_extended(), 0);
        assert_eq!(second.skipped, 2);

        assert_eq!(units[&acronym("LU100")].snapshots().count(), 2);
        assert_eq!(units[&acronym("LU200")].snapshots().count(), 2);
    }

    #[test]
    fn fresh_loads_extend_one_year_per_run_until_the_horizon() {
        let mut units = store(vec![unit_with_years("LU100", &[2024])]);

        for _ in 0..4 {
            let records: Vec<_> = units.values().cloned().collect();
            run_batch(&mut units, records);
        }

        let years: Vec<u16> = units[&acronym("LU100")]
            .snapshots()
            .map(|(year, _)| year.year())
            .collect();
        assert_eq!(years, vec![2024, 2025, 2026]);
    }
}
