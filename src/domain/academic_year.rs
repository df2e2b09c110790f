use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// An academic year, identified by the calendar year it starts in.
///
/// Displayed as `2020-21`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u16", try_from = "u16")]
pub struct AcademicYear(u16);

/// Month in which a new academic year starts.
const START_MONTH: u32 = 9;

impl AcademicYear {
    /// The last academic year that can be represented.
    pub const MAX: Self = Self(9999);

    /// Creates an academic year starting in the given calendar year.
    ///
    /// Years past [`AcademicYear::MAX`] are clamped to it.
    #[must_use]
    pub const fn new(year: u16) -> Self {
        if year > Self::MAX.0 {
            Self::MAX
        } else {
            Self(year)
        }
    }

    /// The calendar year the academic year starts in.
    #[must_use]
    pub const fn year(self) -> u16 {
        self.0
    }

    /// The following academic year, or `None` past [`AcademicYear::MAX`].
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        if self.0 < Self::MAX.0 {
            Some(Self(self.0 + 1))
        } else {
            None
        }
    }

    /// The academic year `offset` years after this one, saturating at
    /// [`AcademicYear::MAX`].
    #[must_use]
    pub const fn plus(self, offset: u16) -> Self {
        Self::new(self.0.saturating_add(offset))
    }

    /// The academic year running on `date`.
    ///
    /// Academic years start in September.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        let year = u16::try_from(date.year()).unwrap_or(0);
        if date.month() >= START_MONTH {
            Self::new(year)
        } else {
            Self::new(year.saturating_sub(1))
        }
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{:02}", self.0, suffix(self.0))
    }
}

/// The two-digit calendar year an academic year ends in.
const fn suffix(year: u16) -> u16 {
    (year % 100 + 1) % 100
}

impl From<AcademicYear> for u16 {
    fn from(year: AcademicYear) -> Self {
        year.0
    }
}

impl TryFrom<u16> for AcademicYear {
    type Error = YearError;

    fn try_from(year: u16) -> Result<Self, Self::Error> {
        if year > Self::MAX.0 {
            return Err(YearError(year.to_string()));
        }
        Ok(Self(year))
    }
}

/// Error returned when an academic year cannot be parsed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid academic year '{0}': expected e.g. '2020' or '2020-21', up to 9999")]
pub struct YearError(String);

impl FromStr for AcademicYear {
    type Err = YearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || YearError(s.to_string());
        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (start, Some(end)),
            None => (s, None),
        };

        let year: u16 = start.parse().map_err(|_| error())?;
        if year > Self::MAX.0 {
            return Err(error());
        }
        if let Some(end) = end {
            let end_year: u16 = end.parse().map_err(|_| error())?;
            if end.len() != 2 || end_year != suffix(year) {
                return Err(error());
            }
        }
        Ok(Self(year))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(2020, "2020-21")]
    #[test_case(1999, "1999-00")]
    #[test_case(2009, "2009-10")]
    fn display(year: u16, expected: &str) {
        assert_eq!(AcademicYear::new(year).to_string(), expected);
    }

    #[test_case("2020", 2020; "bare year")]
    #[test_case("2020-21", 2020; "full form")]
    #[test_case("1999-00", 1999; "century rollover")]
    fn parse_valid(input: &str, expected: u16) {
        assert_eq!(input.parse::<AcademicYear>().unwrap().year(), expected);
    }

    #[test_case("2020-22"; "wrong suffix")]
    #[test_case("2020-2021"; "long suffix")]
    #[test_case("twenty"; "not a number")]
    fn parse_invalid(input: &str) {
        assert!(input.parse::<AcademicYear>().is_err());
    }

    #[test]
    fn academic_year_starts_in_september() {
        let august = NaiveDate::from_ymd_opt(2021, 8, 31).unwrap();
        let september = NaiveDate::from_ymd_opt(2021, 9, 1).unwrap();
        assert_eq!(AcademicYear::containing(august), AcademicYear::new(2020));
        assert_eq!(AcademicYear::containing(september), AcademicYear::new(2021));
    }

    #[test]
    fn next_and_plus() {
        let year = AcademicYear::new(2020);
        assert_eq!(year.next(), Some(AcademicYear::new(2021)));
        assert_eq!(year.plus(6), AcademicYear::new(2026));
    }

    #[test]
    fn arithmetic_stops_at_the_last_year() {
        assert_eq!(AcademicYear::MAX.next(), None);
        assert_eq!(AcademicYear::new(2020).plus(u16::MAX), AcademicYear::MAX);
        assert_eq!(AcademicYear::new(u16::MAX), AcademicYear::MAX);
        assert_eq!(AcademicYear::new(u16::MAX).to_string(), "9999-00");
    }

    #[test_case("65535-00"; "overflowing full form")]
    #[test_case("65535"; "overflowing bare year")]
    #[test_case("10000"; "five digits")]
    fn parse_out_of_range(input: &str) {
        assert!(input.parse::<AcademicYear>().is_err());
    }

    #[test]
    fn deserialize_rejects_out_of_range_years() {
        let year: AcademicYear = serde_yaml::from_str("2020").unwrap();
        assert_eq!(year, AcademicYear::new(2020));
        assert!(serde_yaml::from_str::<AcademicYear>("65535").is_err());
        assert_eq!(serde_yaml::to_string(&year).unwrap().trim(), "2020");
    }
}
