use crate::{LoadError, PointSet, Settings};
use gwm_cache::CacheStore;
use gwm_core::{CacheKey, Region, Row, Variable, VariableSpec};
use gwm_data::{aggregate, distinct_regions};
use gwm_fetch::{fetch_table_with_cancel, CancelFlag, Direction, TableQuery, TabularSource, DEFAULT_PAGE_SIZE};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Page size and cache expiry applied by an [`Orchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    pub page_size: usize,
    pub points_max_age: Duration,
    pub regions_max_age: Duration,
    pub history_max_age: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            points_max_age: DAY,
            regions_max_age: 7 * DAY,
            history_max_age: DAY,
        }
    }
}

impl From<&Settings> for LoadPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            page_size: settings.backend.page_size,
            points_max_age: settings.cache.points_max_age(),
            regions_max_age: settings.cache.regions_max_age(),
            history_max_age: settings.cache.history_max_age(),
        }
    }
}

/// Rows for every point of `spec` in `region`, oldest observation first.
pub fn points_query(spec: &VariableSpec, region: &Region) -> TableQuery {
    let mut query = TableQuery::new(spec.table)
        .select(spec.columns())
        .not_null(spec.code_field);
    if let (Some(field), Some(label)) = (spec.region_field, region.label()) {
        query = query.eq(field, label);
    }
    query.order_by(spec.date_field, Direction::Ascending)
}

/// Region labels of `spec`; `None` when the table carries no region column.
pub fn regions_query(spec: &VariableSpec) -> Option<TableQuery> {
    let field = spec.region_field?;
    Some(
        TableQuery::new(spec.table)
            .select([field])
            .not_null(field)
            .order_by(field, Direction::Ascending),
    )
}

/// Every observation of one point, oldest first.
pub fn history_query(spec: &VariableSpec, code: &str) -> TableQuery {
    TableQuery::new(spec.table)
        .select(spec.columns())
        .eq(spec.code_field, code)
        .order_by(spec.date_field, Direction::Ascending)
}

/// Serves dashboard queries from the cache, falling back to the backend.
///
/// Loads are read-through: a fresh, non-empty cache entry is returned
/// without touching the source; otherwise the full result set is paged in,
/// reduced and written back. Failed or cancelled loads write nothing.
pub struct Orchestrator<S> {
    source: S,
    cache: Arc<CacheStore>,
    policy: LoadPolicy,
}

impl<S: TabularSource> Orchestrator<S> {
    pub fn new(source: S, cache: Arc<CacheStore>, policy: LoadPolicy) -> Self {
        Self { source, cache, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn policy(&self) -> &LoadPolicy {
        &self.policy
    }

    /// Drop every cached entry, or those whose key starts with `prefix`.
    pub fn clear_cache(&self, prefix: Option<&str>) {
        self.cache.clear(prefix)
    }

    pub async fn load_points(&self, variable: Variable, region: &Region) -> Result<PointSet, LoadError> {
        self.load_points_cancellable(variable, region, &CancelFlag::new()).await
    }

    pub async fn load_points_cancellable(
        &self,
        variable: Variable,
        region: &Region,
        cancel: &CancelFlag,
    ) -> Result<PointSet, LoadError> {
        let key = CacheKey::points(variable, region);
        if let Some(cached) = self.cache.read_as::<PointSet>(key.as_str(), self.policy.points_max_age) {
            if !cached.is_empty() {
                debug!("{}: {} points from cache", key, cached.points.len());
                return Ok(cached);
            }
        }

        let spec = variable.spec();
        let query = points_query(spec, region);
        let rows = fetch_table_with_cancel(&self.source, &query, self.policy.page_size, cancel).await?;
        let points = PointSet::resolve(aggregate(rows, spec), spec);
        cancel.check()?;

        info!("{}: {} points on the map, {} with stats", key, points.points.len(), points.stats.len());
        self.cache.write_as(key.as_str(), &points);
        Ok(points)
    }

    pub async fn load_regions(&self, variable: Variable) -> Result<Vec<String>, LoadError> {
        self.load_regions_cancellable(variable, &CancelFlag::new()).await
    }

    pub async fn load_regions_cancellable(
        &self,
        variable: Variable,
        cancel: &CancelFlag,
    ) -> Result<Vec<String>, LoadError> {
        let spec = variable.spec();
        let Some(query) = regions_query(spec) else {
            debug!("{} has no region column", variable);
            return Ok(Vec::new());
        };
        let key = CacheKey::regions(variable);
        if let Some(cached) = self.cache.read_as::<Vec<String>>(key.as_str(), self.policy.regions_max_age) {
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let rows = fetch_table_with_cancel(&self.source, &query, self.policy.page_size, cancel).await?;
        let regions = match spec.region_field {
            Some(field) => distinct_regions(&rows, field),
            None => Vec::new(),
        };
        cancel.check()?;

        info!("{}: {} regions", key, regions.len());
        self.cache.write_as(key.as_str(), &regions);
        Ok(regions)
    }

    pub async fn load_point_history(&self, variable: Variable, code: &str) -> Result<Vec<Row>, LoadError> {
        self.load_point_history_cancellable(variable, code, &CancelFlag::new()).await
    }

    pub async fn load_point_history_cancellable(
        &self,
        variable: Variable,
        code: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<Row>, LoadError> {
        let code = code.trim();
        let key = CacheKey::history(variable, code);
        if let Some(cached) = self.cache.read_as::<Vec<Row>>(key.as_str(), self.policy.history_max_age) {
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let spec = variable.spec();
        let rows = fetch_table_with_cancel(&self.source, &history_query(spec, code), self.policy.page_size, cancel)
            .await?;
        cancel.check()?;

        info!("{}: {} observations", key, rows.len());
        self.cache.write_as(key.as_str(), &rows);
        Ok(rows)
    }
}
