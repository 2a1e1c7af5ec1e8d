//! Round period identifiers.
//!
//! A period is the unique id of a round, formatted from the UTC wall clock
//! as `YYYYMMDDHHMM` plus a fixed `32` seconds suffix. The fixed suffix is
//! load-bearing: every call within the same minute produces the same id, so
//! restarts, previews and the live loop all agree on upcoming period values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds suffix appended to every period id.
pub const PERIOD_SECONDS_SUFFIX: &str = "32";

/// Unique round identifier, e.g. `20260821143032`.
///
/// The digit layout makes lexicographic order equal chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(String);

impl Period {
    /// Period for the minute containing `t`.
    pub fn at(t: DateTime<Utc>) -> Self {
        Period(format!("{}{}", t.format("%Y%m%d%H%M"), PERIOD_SECONDS_SUFFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Period {
    fn from(s: String) -> Self {
        Period(s)
    }
}
