//! Catalog sync: corpus → chunking → SQLite.
//!
//! The catalog mirrors the corpus. Records whose content hash is unchanged
//! are skipped unless a full sync is requested, and documents whose files
//! have disappeared are deleted along with their chunks.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::corpus::{self, Corpus};
use crate::db;
use crate::models::{Chunk, DocumentRecord};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub scanned: usize,
    pub upserted: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub chunks_written: usize,
}

pub async fn run_sync(config: &Config, full: bool, dry_run: bool) -> Result<()> {
    let corpus = corpus::load_corpus(config)?;

    if dry_run {
        println!("sync (dry-run)");
        println!("  documents found: {}", corpus.records.len());
        println!("  rejected: {}", corpus.rejected.len());
        let total_chunks: usize = corpus
            .records
            .iter()
            .map(|r| chunk_text("tmp", &r.body, config.chunking.max_tokens).len())
            .sum();
        println!("  estimated chunks: {}", total_chunks);
        return Ok(());
    }

    let pool = db::open(config).await?;

    let report = sync_corpus(&pool, &corpus, config.chunking.max_tokens, full).await?;

    println!("sync");
    println!("  scanned: {} documents", report.scanned);
    println!("  rejected: {}", corpus.rejected.len());
    println!("  upserted documents: {}", report.upserted);
    println!("  unchanged: {}", report.unchanged);
    println!("  removed: {}", report.removed);
    println!("  chunks written: {}", report.chunks_written);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Bring the catalog in line with `corpus`.
pub async fn sync_corpus(
    pool: &SqlitePool,
    corpus: &Corpus,
    max_tokens: usize,
    full: bool,
) -> Result<SyncReport> {
    let rows = sqlx::query("SELECT id, path, content_hash FROM documents")
        .fetch_all(pool)
        .await?;
    let existing: HashMap<String, (String, String)> = rows
        .iter()
        .map(|row| {
            (
                row.get::<String, _>("path"),
                (row.get::<String, _>("id"), row.get::<String, _>("content_hash")),
            )
        })
        .collect();

    let mut report = SyncReport {
        scanned: corpus.records.len(),
        ..Default::default()
    };

    for record in &corpus.records {
        let known = existing.get(&record.path);
        if !full {
            if let Some((_, hash)) = known {
                if hash == &record.content_hash {
                    report.unchanged += 1;
                    continue;
                }
            }
        }

        let doc_id = known
            .map(|(id, _)| id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        upsert_document(pool, &doc_id, record).await?;

        let chunks = chunk_text(&doc_id, &record.body, max_tokens);
        replace_chunks(pool, &doc_id, &chunks).await?;

        tracing::debug!(path = %record.path, chunks = chunks.len(), "synced document");
        report.upserted += 1;
        report.chunks_written += chunks.len();
    }

    let present: BTreeSet<&str> = corpus.records.iter().map(|r| r.path.as_str()).collect();
    for (path, (id, _)) in &existing {
        if !present.contains(path.as_str()) {
            delete_document(pool, id).await?;
            tracing::info!(path = %path, "removed document from catalog");
            report.removed += 1;
        }
    }

    Ok(report)
}

async fn upsert_document(pool: &SqlitePool, doc_id: &str, record: &DocumentRecord) -> Result<()> {
    let tags_json = serde_json::to_string(&record.tags)?;
    let metadata_json = serde_json::to_string(&record.extra)?;
    let last_updated = record.last_updated.map(|d| d.format("%Y-%m-%d").to_string());
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO documents (id, path, title, problem, context, category, category_key, tags_json, version, last_updated, body, metadata_json, content_hash, valid, indexed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            title = excluded.title,
            problem = excluded.problem,
            context = excluded.context,
            category = excluded.category,
            category_key = excluded.category_key,
            tags_json = excluded.tags_json,
            version = excluded.version,
            last_updated = excluded.last_updated,
            body = excluded.body,
            metadata_json = excluded.metadata_json,
            content_hash = excluded.content_hash,
            valid = excluded.valid,
            indexed_at = excluded.indexed_at
        "#,
    )
    .bind(doc_id)
    .bind(&record.path)
    .bind(&record.title)
    .bind(&record.problem)
    .bind(&record.context)
    .bind(&record.category)
    .bind(record.category_key())
    .bind(&tags_json)
    .bind(&record.version)
    .bind(&last_updated)
    .bind(&record.body)
    .bind(&metadata_json)
    .bind(&record.content_hash)
    .bind(record.valid)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

async fn replace_chunks(pool: &SqlitePool, document_id: &str, chunks: &[Chunk]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO chunks_fts (chunk_id, document_id, text) VALUES (?, ?, ?)")
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn delete_document(pool: &SqlitePool, document_id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
