//! Platform identifiers.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Milliseconds between the Unix epoch and the platform epoch (2015-01-01).
const PLATFORM_EPOCH_MS: i64 = 1_420_070_400_000;

/// A 64-bit platform identifier whose top 42 bits encode its creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Snowflake(pub u64);

impl Snowflake {
    pub fn id(self) -> u64 {
        self.0
    }

    /// Creation time in Unix milliseconds.
    pub fn timestamp_ms(self) -> i64 {
        (self.0 >> 22) as i64 + PLATFORM_EPOCH_MS
    }

    pub fn created_at(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms())
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Snowflake)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
