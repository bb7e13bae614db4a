//! Query orchestration for the groundwater dashboard.
//!
//! [`Orchestrator`] is the entry point the presentation layer calls: given
//! a variable and a region it serves point data from the [`CacheStore`]
//! when a fresh entry exists, and otherwise pages the rows out of the
//! backend, aggregates them per point, resolves coordinates and writes the
//! result back to the cache.
//!
//! Region labels for a variable are cached the same way under their own
//! namespace with a longer (weekly) expiry.
//!
//! [`CacheStore`]: gwm_cache::CacheStore

pub mod error;
pub mod orchestrator;
pub mod points;
pub mod settings;

pub use error::LoadError;
pub use orchestrator::{history_query, points_query, regions_query, LoadPolicy, Orchestrator};
pub use points::{MapPoint, PointSet};
pub use settings::{BackendSettings, CacheSettings, Settings};
