//! Catalog schema. Every statement is idempotent, so `refx init` can be run
//! any number of times and `sync` runs it implicitly.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::models::fold_case;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::open(config).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            problem TEXT NOT NULL DEFAULT '',
            context TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            category_key TEXT,
            tags_json TEXT NOT NULL DEFAULT '[]',
            version TEXT NOT NULL DEFAULT '',
            last_updated TEXT,
            body TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            content_hash TEXT NOT NULL,
            valid INTEGER NOT NULL DEFAULT 1,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(document_id, chunk_index),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE chunks_fts USING fts5(
                chunk_id UNINDEXED,
                document_id UNINDEXED,
                text
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    add_category_key(pool).await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_category_key ON documents(category_key)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_last_updated ON documents(last_updated DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Catalogs created before `category_key` existed get the column and a
/// backfill. SQLite's `lower()` only folds ASCII, so the key is computed here.
async fn add_category_key(pool: &SqlitePool) -> Result<()> {
    let has_column: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('documents') WHERE name = 'category_key'",
    )
    .fetch_one(pool)
    .await?;
    if !has_column {
        sqlx::query("ALTER TABLE documents ADD COLUMN category_key TEXT")
            .execute(pool)
            .await?;
    }

    let stale: Vec<(String, String)> =
        sqlx::query_as("SELECT id, category FROM documents WHERE category_key IS NULL")
            .fetch_all(pool)
            .await?;
    if !stale.is_empty() {
        tracing::info!(rows = stale.len(), "backfilling category_key");
    }
    for (id, category) in stale {
        sqlx::query("UPDATE documents SET category_key = ? WHERE id = ?")
            .bind(fold_case(&category))
            .bind(id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_category_key_backfilled_on_old_catalog() {
        let tmp = TempDir::new().unwrap();
        let cfg = parse_config(&format!(
            "[site]\ntitle = \"T\"\n[corpus]\nroot = \".\"\n[db]\npath = \"{}\"\n",
            tmp.path().join("old.sqlite").display()
        ))
        .unwrap();

        let pool = db::connect(&cfg).await.unwrap();
        sqlx::query(
            "CREATE TABLE documents (id TEXT PRIMARY KEY, path TEXT NOT NULL UNIQUE, \
             title TEXT NOT NULL, problem TEXT NOT NULL DEFAULT '', \
             context TEXT NOT NULL DEFAULT '', category TEXT NOT NULL, \
             tags_json TEXT NOT NULL DEFAULT '[]', version TEXT NOT NULL DEFAULT '', \
             last_updated TEXT, body TEXT NOT NULL, metadata_json TEXT NOT NULL DEFAULT '{}', \
             content_hash TEXT NOT NULL, valid INTEGER NOT NULL DEFAULT 1, \
             indexed_at INTEGER NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO documents (id, path, title, category, body, content_hash, indexed_at) \
             VALUES ('d1', 'a.md', 'A', 'ÖKONOMIE', '', 'h', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        migrate(&pool).await.unwrap();
        migrate(&pool).await.unwrap();

        let key: String = sqlx::query_scalar("SELECT category_key FROM documents WHERE id = 'd1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(key, "ökonomie");
        pool.close().await;
    }
}
