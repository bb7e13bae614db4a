use serde::{Deserialize, Serialize};

/// Aggregate statistics for one monitoring point.
///
/// `min` and `max` keep the raw date text of the earliest and latest
/// observation so the presentation layer can show it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointStats {
    pub min: Option<String>,
    pub max: Option<String>,
    pub count: u64,
    /// Rows whose date text could not be parsed and sorted as the epoch.
    #[serde(default)]
    pub unparsed_dates: u64,
}
