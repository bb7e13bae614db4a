//! `cache clear` and `cache list`.

use crate::context::Context;
use chrono::DateTime;
use gwm_cache::EntryInfo;
use log::info;
use std::io::{self, Write};

pub fn run_clear(context: &Context, prefix: Option<&str>) -> anyhow::Result<()> {
    let before = context.orchestrator.cache().entries().len();
    context.orchestrator.clear_cache(prefix);
    let after = context.orchestrator.cache().entries().len();
    info!(
        "removed {} cache entries{}",
        before.saturating_sub(after),
        prefix.map(|p| format!(" under {}", p)).unwrap_or_default()
    );
    Ok(())
}

pub fn run_list(context: &Context) -> anyhow::Result<()> {
    let cache = context.orchestrator.cache();
    let now = cache.now_millis();
    let mut out = io::stdout().lock();
    for entry in cache.entries() {
        writeln!(out, "{}", describe(&entry, now))?;
    }
    Ok(())
}

/// `key<TAB>written<TAB>age<TAB>tiers`
pub fn describe(entry: &EntryInfo, now_millis: i64) -> String {
    let (written, age) = match entry.timestamp {
        Some(ts) => (
            DateTime::from_timestamp_millis(ts)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| ts.to_string()),
            format_age(now_millis.saturating_sub(ts)),
        ),
        None => ("malformed".to_string(), "-".to_string()),
    };
    let tiers = match (entry.in_memory, entry.persisted) {
        (true, true) => "memory+disk",
        (true, false) => "memory",
        (false, true) => "disk",
        (false, false) => "-",
    };
    format!("{}\t{}\t{}\t{}", entry.key, written, age, tiers)
}

fn format_age(millis: i64) -> String {
    let secs = millis.max(0) / 1000;
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h{:02}m", s / 3600, (s % 3600) / 60),
        s => format!("{}d{:02}h", s / 86_400, (s % 86_400) / 3600),
    }
}
