use std::{fmt, ops::Deref, str::FromStr, sync::LazyLock};

use non_empty_string::NonEmptyString;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ACRONYM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]*$").expect("acronym pattern is valid"));

/// The acronym of a learning unit (e.g. `LDROI1200`).
///
/// An acronym is a non-empty string of uppercase ASCII letters and digits,
/// starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Acronym(NonEmptyString);

impl Acronym {
    /// Creates a new `Acronym` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`AcronymError`] if the string is empty, does not start with a
    /// letter, or contains characters other than `A-Z` and `0-9`.
    pub fn new(s: String) -> Result<Self, AcronymError> {
        if !ACRONYM_PATTERN.is_match(&s) {
            return Err(AcronymError(s));
        }

        NonEmptyString::new(s).map(Self).map_err(AcronymError)
    }

    /// Parses an acronym, normalizing it to uppercase first.
    ///
    /// This is intended for user input at the CLI boundary.
    ///
    /// # Errors
    ///
    /// Returns [`AcronymError`] if the normalized string is not a valid
    /// acronym.
    pub fn parse_lenient(s: &str) -> Result<Self, AcronymError> {
        Self::new(s.trim().to_uppercase())
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Acronym {
    type Error = AcronymError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Acronym {
    type Error = AcronymError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl AsRef<str> for Acronym {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Acronym {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Acronym {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Acronym {
    type Err = AcronymError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl Serialize for Acronym {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Acronym {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a string is not a valid acronym.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "Invalid acronym '{0}': must start with an uppercase letter and contain only A-Z and 0-9"
)]
pub struct AcronymError(String);
