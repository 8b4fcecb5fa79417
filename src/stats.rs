//! Index statistics.
//!
//! Provides a quick summary of what's indexed: one row per project
//! collection with its entry count, the embedding model it was built with,
//! and when it was last rebuilt. Used by `projrag stats`.

use anyhow::{bail, Result};

use projrag_core::index::{CollectionInfo, VectorIndex};
use projrag_core::RagError;

use crate::config::Config;
use crate::sqlite_index::SqliteIndex;

/// Run the stats command for every collection, or just `project`.
pub async fn run_stats(config: &Config, project: Option<&str>) -> Result<()> {
    let index = SqliteIndex::open(&config.index.path).await?;
    let result = collect(&index, project).await;
    index.close().await;
    let collections = result?;

    let db_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("projrag index stats");
    println!("===================");
    println!();
    println!("  Index:        {}", config.index.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!("  Collections:  {}", collections.len());
    print!("{}", render_table(&collections));
    println!();

    Ok(())
}

async fn collect(index: &dyn VectorIndex, project: Option<&str>) -> Result<Vec<CollectionInfo>> {
    match project {
        Some(name) => match index.collection(name).await? {
            Some(info) => Ok(vec![info]),
            None => bail!(RagError::CollectionNotFound(name.to_string())),
        },
        None => index.list_collections().await,
    }
}

fn render_table(collections: &[CollectionInfo]) -> String {
    if collections.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n");
    out.push_str(&format!(
        "  {:<20} {:>8}  {:<24} {:>5}  {:<10}  {}\n",
        "COLLECTION", "ENTRIES", "MODEL", "DIMS", "METRIC", "BUILT"
    ));
    out.push_str(&format!("  {}\n", "-".repeat(88)));
    for c in collections {
        out.push_str(&format!(
            "  {:<20} {:>8}  {:<24} {:>5}  {:<10}  {}\n",
            c.name,
            c.count,
            c.model,
            c.dims,
            c.metric.as_str(),
            format_ts_relative(c.created_at)
        ));
    }
    out
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
