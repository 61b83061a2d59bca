use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `chrono` format of a version string.
pub const VERSION_FORMAT: &str = "%Y%m%d-%H%M%S";

const VERSION_LEN: usize = 15;

/// Errors that can occur when parsing a version.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version length: expected 15 characters, got {0}")]
    InvalidLength(usize),
    #[error("Invalid version timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Identifier of one exported snapshot object.
///
/// A UTC timestamp rendered as `YYYYMMDD-HHMMSS`. Because every field is
/// zero-padded, string order equals chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    /// Version for the given instant, truncated to the second.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(VERSION_FORMAT).to_string())
    }

    /// Parses a version string.
    ///
    /// ```
    /// use strata_core::object_store::Version;
    ///
    /// assert!(Version::parse("20250114-103000").is_ok());
    /// assert!(Version::parse("all-20250114-103000").is_err());
    /// assert!(Version::parse("20251399-103000").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        if value.len() != VERSION_LEN {
            return Err(VersionError::InvalidLength(value.len()));
        }
        NaiveDateTime::parse_from_str(value, VERSION_FORMAT)
            .map_err(|_| VersionError::InvalidTimestamp(value.to_string()))?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The instant this version was taken at.
    pub fn timestamp(&self) -> DateTime<Utc> {
        // Parsing succeeded when the value was constructed.
        NaiveDateTime::parse_from_str(&self.0, VERSION_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_default()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl std::str::FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
