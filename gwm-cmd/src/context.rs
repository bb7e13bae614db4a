//! Settings, cache and backend wiring shared by the commands.

use crate::GlobalArgs;
use anyhow::Context as _;
use gwm_cache::{CacheStore, PersistentStore, SqliteStore};
use gwm_core::Row;
use gwm_fetch::{FetchError, MemorySource, PageRange, RestSource, RetryPolicy, TableQuery, TabularSource};
use gwm_query::{LoadPolicy, Orchestrator, Settings};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Where rows come from for this invocation.
pub enum Backend {
    Rest(RestSource),
    Offline(MemorySource),
}

impl TabularSource for Backend {
    async fn fetch_range(&self, query: &TableQuery, range: PageRange) -> Result<Vec<Row>, FetchError> {
        match self {
            Backend::Rest(source) => source.fetch_range(query, range).await,
            Backend::Offline(source) => source.fetch_range(query, range).await,
        }
    }
}

pub struct Context {
    pub settings: Settings,
    pub orchestrator: Orchestrator<Backend>,
}

impl Context {
    pub fn build(global: &GlobalArgs) -> anyhow::Result<Self> {
        let settings = load_settings(global)?;
        let cache = Arc::new(open_cache(&settings)?);
        let backend = match &global.offline {
            Some(dir) => Backend::Offline(
                MemorySource::from_csv_dir(dir)
                    .with_context(|| format!("failed to load offline tables from {}", dir.display()))?,
            ),
            None => Backend::Rest(rest_source(&settings)?),
        };
        let orchestrator = Orchestrator::new(backend, cache, LoadPolicy::from(&settings));
        Ok(Self { settings, orchestrator })
    }
}

/// Settings from file and environment, with command-line overrides applied.
pub fn load_settings(global: &GlobalArgs) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(global.config.as_deref()).context("failed to load settings")?;
    if let Some(url) = &global.backend_url {
        settings.backend.url = url.clone();
    }
    if let Some(path) = &global.cache_path {
        settings.cache.path = Some(path.clone());
    }
    Ok(settings)
}

/// Cache backed by the configured SQLite file, or held in memory for this
/// run only when no path is set.
pub fn open_cache(settings: &Settings) -> anyhow::Result<CacheStore> {
    let store = match &settings.cache.path {
        Some(path) => open_sqlite(path)?,
        None => {
            info!("no cache path configured, caching in memory only");
            SqliteStore::open_in_memory()?
        }
    };
    let store: Box<dyn PersistentStore> = Box::new(store.with_quota(settings.cache.quota_bytes));
    Ok(CacheStore::new(store))
}

fn open_sqlite(path: &Path) -> anyhow::Result<SqliteStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("could not create cache directory {}: {}", parent.display(), e);
        }
    }
    SqliteStore::open(path).with_context(|| format!("failed to open cache at {}", path.display()))
}

fn rest_source(settings: &Settings) -> anyhow::Result<RestSource> {
    let backend = &settings.backend;
    let source = RestSource::new(
        &backend.url,
        backend.api_key.as_deref(),
        Duration::from_secs(backend.timeout_secs),
    )?
    .with_retry(RetryPolicy {
        max_attempts: backend.max_attempts.max(1),
        initial_backoff: Duration::from_millis(backend.retry_backoff_millis),
    });
    info!("using backend {}", backend.url);
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn flags_override_loaded_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("gwm.toml");
        std::fs::write(&config, "[backend]\nurl = \"http://file.example\"\npage_size = 250\n").unwrap();

        let global = GlobalArgs {
            config: Some(config),
            backend_url: Some("http://flag.example".to_string()),
            cache_path: Some(PathBuf::from("cache/gwm.sqlite")),
            offline: None,
        };
        let settings = load_settings(&global).unwrap();
        assert_eq!(settings.backend.url, "http://flag.example");
        assert_eq!(settings.backend.page_size, 250);
        assert_eq!(settings.cache.path, Some(PathBuf::from("cache/gwm.sqlite")));
    }

    #[test]
    fn cache_file_is_created_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.cache.path = Some(dir.path().join("nested").join("cache.sqlite"));

        let cache = open_cache(&settings).unwrap();
        cache.write("var_regions_v1:depth", serde_json::json!(["Alta Pianura"]));
        assert!(dir.path().join("nested").join("cache.sqlite").exists());
    }

    #[tokio::test]
    async fn offline_fixtures_feed_the_orchestrator() {
        let global = GlobalArgs {
            offline: Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures")),
            ..GlobalArgs::default()
        };
        let context = Context::build(&global).unwrap();
        let orchestrator = &context.orchestrator;

        let points = orchestrator
            .load_points(gwm_core::Variable::Depth, &gwm_core::Region::All)
            .await
            .unwrap();
        let mut codes: Vec<&str> = points.points.iter().map(|p| p.code.as_str()).collect();
        codes.sort();
        assert_eq!(codes, vec!["PZ001", "PZ002", "PZ003", "PZ005"]);

        let pz001 = points.stats_for("PZ001").unwrap();
        assert_eq!(pz001.count, 3);
        assert_eq!(pz001.min.as_deref(), Some("2019-03-12"));
        assert_eq!(pz001.max.as_deref(), Some("2021-02-28T09:30:00"));
        assert_eq!(points.stats_for("PZ003").unwrap().unparsed_dates, 1);
        assert_eq!(points.stats_for("PZ005").unwrap().min, None);

        let regions = orchestrator.load_regions(gwm_core::Variable::Flow).await.unwrap();
        assert_eq!(regions, vec!["Adda", "Ticino"]);
    }
}
