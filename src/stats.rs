//! Catalog statistics.
//!
//! A quick summary of what's indexed: document and chunk counts, documents
//! admitted with blank fields, and a per-category breakdown. Used by
//! `refx stats` to confirm a sync picked up what it should have.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct CategoryStats {
    category: String,
    doc_count: i64,
    chunk_count: i64,
    newest: Option<String>,
    last_sync_ts: Option<i64>,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::open(config).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(&pool)
        .await?;
    let blank_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE valid = 0")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Reference Index | Catalog Stats");
    println!("===============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);
    if blank_docs > 0 {
        println!("  Blank:       {} (invalid front matter)", blank_docs);
    }

    let rows = sqlx::query(
        r#"
        SELECT
            d.category,
            COUNT(DISTINCT d.id) AS doc_count,
            COUNT(c.id) AS chunk_count,
            MAX(d.last_updated) AS newest,
            MAX(d.indexed_at) AS last_sync
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        GROUP BY d.category
        ORDER BY doc_count DESC, d.category ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let stats: Vec<CategoryStats> = rows
        .iter()
        .map(|row| CategoryStats {
            category: row.get("category"),
            doc_count: row.get("doc_count"),
            chunk_count: row.get("chunk_count"),
            newest: row.get("newest"),
            last_sync_ts: row.get("last_sync"),
        })
        .collect();

    if !stats.is_empty() {
        println!();
        println!("  By category:");
        println!(
            "  {:<28} {:>6} {:>8} {:>12}   {}",
            "CATEGORY", "DOCS", "CHUNKS", "NEWEST", "LAST SYNC"
        );
        println!("  {}", "-".repeat(76));

        for s in &stats {
            let sync_display = s
                .last_sync_ts
                .map(format_synced_at)
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<28} {:>6} {:>8} {:>12}   {}",
                s.category,
                s.doc_count,
                s.chunk_count,
                s.newest.as_deref().unwrap_or("-"),
                sync_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
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

/// Render a sync timestamp in UTC, minute precision.
fn format_synced_at(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_synced_at() {
        assert_eq!(format_synced_at(0), "1970-01-01 00:00");
        assert_eq!(format_synced_at(1_709_251_200 + 90), "2024-03-01 00:01");
    }
}
