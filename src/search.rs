use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::config::Config;
use crate::db;
use crate::models::{fold_case, SearchResult};

/// Filters and limits for a catalog query.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
}

pub async fn run_search(config: &Config, params: SearchParams) -> Result<()> {
    if params.query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let results = search_catalog(config, &params).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            result.score,
            result.category.as_deref().unwrap_or("-"),
            result.title.as_deref().unwrap_or("(untitled)")
        );
        if let Some(ref problem) = result.problem {
            if !problem.is_empty() {
                println!("    problem: {}", problem);
            }
        }
        if let Some(ref date) = result.last_updated {
            println!("    updated: {}", date);
        }
        println!(
            "    excerpt: \"{}\"",
            result.snippet.replace('\n', " ").trim()
        );
        println!("    path: {}", result.path);
        println!();
    }

    Ok(())
}

/// Keyword search over the catalog, best chunk per document.
///
/// The category filter is applied in SQL before `candidate_k` is taken, so a
/// narrow category is not crowded out by matches elsewhere.
/// Ordering: score desc, then path asc.
pub async fn search_catalog(config: &Config, params: &SearchParams) -> Result<Vec<SearchResult>> {
    let Some(match_expr) = fts_query(&params.query) else {
        bail!("query must not be empty");
    };
    let final_limit = params.limit.unwrap_or(config.retrieval.final_limit);
    if final_limit < 1 {
        bail!("invalid limit: must be >= 1");
    }

    let pool = db::open(config).await?;
    let candidates = fetch_keyword_candidates(
        &pool,
        &match_expr,
        params.category.as_deref(),
        config.retrieval.candidate_k,
    )
    .await?;
    pool.close().await;

    let candidates: Vec<ChunkCandidate> = match params.tag {
        Some(ref wanted) => candidates
            .into_iter()
            .filter(|c| has_tag(&c.tags, wanted))
            .collect(),
        None => candidates,
    };

    // Best chunk per document
    let mut best: HashMap<&str, (&ChunkCandidate, f64)> = HashMap::new();
    for (cand, score) in normalize_scores(&candidates) {
        let entry = best.entry(cand.doc.path.as_str()).or_insert((cand, score));
        if score > entry.1 {
            *entry = (cand, score);
        }
    }

    let mut results: Vec<SearchResult> = best
        .into_values()
        .map(|(cand, score)| SearchResult {
            path: cand.doc.path.clone(),
            title: Some(cand.doc.title.clone()),
            category: Some(cand.doc.category.clone()),
            problem: Some(cand.doc.problem.clone()),
            last_updated: cand.doc.last_updated.clone(),
            score,
            snippet: cand.snippet.clone(),
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    results.truncate(final_limit as usize);

    Ok(results)
}

fn has_tag(tags: &[String], wanted: &str) -> bool {
    let wanted = fold_case(wanted);
    tags.iter().any(|t| fold_case(t) == wanted)
}

/// Quote each whitespace-separated term so user input never reaches the
/// FTS5 query grammar. Terms are implicitly ANDed.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

#[derive(Debug, Clone, Default)]
struct DocFields {
    path: String,
    title: String,
    category: String,
    problem: String,
    last_updated: Option<String>,
}

#[derive(Debug, Clone)]
struct ChunkCandidate {
    doc: DocFields,
    tags: Vec<String>,
    raw_score: f64,
    snippet: String,
}

async fn fetch_keyword_candidates(
    pool: &SqlitePool,
    match_expr: &str,
    category: Option<&str>,
    candidate_k: i64,
) -> Result<Vec<ChunkCandidate>> {
    let rows = sqlx::query(
        r#"
        SELECT d.path, d.title, d.category, d.problem, d.last_updated, d.tags_json,
               chunks_fts.rank AS rank,
               snippet(chunks_fts, 2, '>>>', '<<<', '...', 48) AS snippet
        FROM chunks_fts
        JOIN documents d ON d.id = chunks_fts.document_id
        WHERE chunks_fts MATCH ?1
          AND (?2 IS NULL OR d.category_key = ?2)
        ORDER BY chunks_fts.rank
        LIMIT ?3
        "#,
    )
    .bind(match_expr)
    .bind(category.map(fold_case))
    .bind(candidate_k)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            let tags_json: String = row.get("tags_json");
            ChunkCandidate {
                doc: DocFields {
                    path: row.get("path"),
                    title: row.get("title"),
                    category: row.get("category"),
                    problem: row.get("problem"),
                    last_updated: row.get("last_updated"),
                },
                tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                raw_score: -rank, // negate so higher = better
                snippet: row.get("snippet"),
            }
        })
        .collect())
}

/// Min-max normalize scores into [0, 1]. A single candidate (or all-equal
/// scores) normalizes to 1.0.
fn normalize_scores(candidates: &[ChunkCandidate]) -> Vec<(&ChunkCandidate, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    candidates
        .iter()
        .map(|c| {
            let norm = if range > 0.0 {
                (c.raw_score - min) / range
            } else {
                1.0
            };
            (c, norm)
        })
        .collect()
}
