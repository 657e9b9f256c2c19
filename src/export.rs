//! Export the corpus index as JSON.
//!
//! Produces the same document the site builder writes as `index.json`:
//! site info, the category and tag tables, and per-document metadata
//! (bodies excluded). Intended for agents that fetch the index instead of
//! crawling pages.

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::config::Config;
use crate::corpus::{self, Corpus};
use crate::index::build_index;
use crate::models::{CorpusIndex, IndexGroup};

#[derive(Serialize)]
struct ExportData<'a> {
    site: ExportSite<'a>,
    categories: &'a [IndexGroup],
    tags: &'a [IndexGroup],
    documents: Vec<ExportDocument<'a>>,
}

#[derive(Serialize)]
struct ExportSite<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    path: &'a str,
    link: String,
    title: &'a str,
    problem: &'a str,
    context: &'a str,
    category: &'a str,
    tags: &'a BTreeSet<String>,
    version: &'a str,
    last_updated: Option<String>,
    metadata: &'a BTreeMap<String, serde_json::Value>,
    content_hash: &'a str,
    valid: bool,
}

/// Serialize the corpus and its index.
pub fn export_json(config: &Config, corpus: &Corpus, index: &CorpusIndex) -> Result<String> {
    let documents = corpus
        .records
        .iter()
        .map(|r| ExportDocument {
            path: &r.path,
            link: r.html_path(),
            title: &r.title,
            problem: &r.problem,
            context: &r.context,
            category: &r.category,
            tags: &r.tags,
            version: &r.version,
            last_updated: r.last_updated.map(|d| d.format("%Y-%m-%d").to_string()),
            metadata: &r.extra,
            content_hash: &r.content_hash,
            valid: r.valid,
        })
        .collect();

    let data = ExportData {
        site: ExportSite {
            title: &config.site.title,
            description: &config.site.description,
        },
        categories: &index.categories,
        tags: &index.tags,
        documents,
    };

    let mut json = serde_json::to_string_pretty(&data)?;
    json.push('\n');
    Ok(json)
}

/// Export the index as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let corpus = corpus::load_corpus(config)?;
    let index = build_index(&corpus.records);
    let json = export_json(config, &corpus, &index)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} documents in {} categories to {}",
                corpus.records.len(),
                index.categories.len(),
                path.display()
            );
        }
        None => {
            print!("{}", json);
        }
    }

    Ok(())
}
