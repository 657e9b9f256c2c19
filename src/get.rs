//! Document retrieval by corpus path.
//!
//! Fetches a full document and its chunks from the catalog. Used by both the
//! `refx get` CLI command and the `POST /tools/get` HTTP endpoint.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::Row;

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub path: String,
    pub title: String,
    pub problem: String,
    pub context: String,
    pub category: String,
    pub tags: Vec<String>,
    pub version: String,
    pub last_updated: Option<String>,
    pub body: String,
    pub metadata: serde_json::Value,
    pub valid: bool,
    pub chunks: Vec<ChunkResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkResponse {
    pub index: i64,
    pub text: String,
}

/// Core get function returning structured data (used by CLI and server).
pub async fn get_document(config: &Config, path: &str) -> Result<DocumentResponse> {
    let pool = db::open(config).await?;

    let doc_row = sqlx::query(
        "SELECT id, path, title, problem, context, category, tags_json, version, last_updated, body, metadata_json, valid FROM documents WHERE path = ?",
    )
    .bind(path)
    .fetch_optional(&pool)
    .await?;

    let doc_row = match doc_row {
        Some(row) => row,
        None => {
            pool.close().await;
            bail!("document not found: {}", path);
        }
    };

    let id: String = doc_row.get("id");
    let tags_json: String = doc_row.get("tags_json");
    let metadata_json: String = doc_row.get("metadata_json");

    let chunk_rows = sqlx::query(
        "SELECT chunk_index, text FROM chunks WHERE document_id = ? ORDER BY chunk_index ASC",
    )
    .bind(&id)
    .fetch_all(&pool)
    .await?;

    let chunks = chunk_rows
        .iter()
        .map(|row| ChunkResponse {
            index: row.get("chunk_index"),
            text: row.get("text"),
        })
        .collect();

    pool.close().await;

    Ok(DocumentResponse {
        path: doc_row.get("path"),
        title: doc_row.get("title"),
        problem: doc_row.get("problem"),
        context: doc_row.get("context"),
        category: doc_row.get("category"),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        version: doc_row.get("version"),
        last_updated: doc_row.get("last_updated"),
        body: doc_row.get("body"),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
        valid: doc_row.get("valid"),
        chunks,
    })
}

/// CLI entry point: calls get_document and prints to stdout.
pub async fn run_get(config: &Config, path: &str) -> Result<()> {
    let doc = get_document(config, path).await?;

    println!("--- Document ---");
    println!("path:         {}", doc.path);
    println!("title:        {}", doc.title);
    println!("category:     {}", doc.category);
    if !doc.problem.is_empty() {
        println!("problem:      {}", doc.problem);
    }
    if !doc.context.is_empty() {
        println!("context:      {}", doc.context);
    }
    if !doc.tags.is_empty() {
        println!("tags:         {}", doc.tags.join(", "));
    }
    if !doc.version.is_empty() {
        println!("version:      {}", doc.version);
    }
    if let Some(ref date) = doc.last_updated {
        println!("last_updated: {}", date);
    }
    if !doc.valid {
        println!("front matter: invalid (indexed with blank fields)");
    }
    println!("metadata:     {}", doc.metadata);
    println!();

    println!("--- Body ---");
    println!("{}", doc.body);
    println!();

    println!("--- Chunks ({}) ---", doc.chunks.len());
    for chunk in &doc.chunks {
        println!("[chunk {}]", chunk.index);
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}
