//! Core types for groundwater monitoring data.
//!
//! - [`row`]: loosely typed observation rows as returned by the backend
//! - [`variable`]: the measured quantities and the columns each one uses
//! - [`region`]: aquifer-system / basin filter
//! - [`stats`]: per-point aggregate statistics
//! - [`key`]: cache key composition
//! - [`coords`]: projected-grid / geographic coordinate normalization
//! - [`dates`]: tolerant date parsing used for chronological ordering

pub mod coords;
pub mod dates;
pub mod key;
pub mod region;
pub mod row;
pub mod stats;
pub mod variable;

pub use coords::{normalize, GeoPoint};
pub use key::CacheKey;
pub use region::Region;
pub use row::Row;
pub use stats::PointStats;
pub use variable::{Variable, VariableSpec};
