//! Core data models.
//!
//! A [`DocumentRecord`] is one Markdown file plus its front matter. Everything
//! downstream (index, renderer, catalog, export) consumes records.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Raw file produced by the corpus scanner before front matter is parsed.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Corpus-relative path with `/` separators.
    pub path: String,
    pub content: String,
}

/// One document of the corpus.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentRecord {
    pub path: String,
    pub title: String,
    pub problem: String,
    pub context: String,
    pub category: String,
    pub tags: BTreeSet<String>,
    pub version: String,
    pub last_updated: Option<NaiveDate>,
    /// Front-matter keys outside the known field set.
    pub extra: BTreeMap<String, serde_json::Value>,
    #[serde(skip)]
    pub body: String,
    /// Lines preceding the body in the source file (the front-matter block).
    #[serde(skip)]
    pub body_line_offset: usize,
    pub content_hash: String,
    /// False when the record was admitted with blank fields.
    pub valid: bool,
}

impl DocumentRecord {
    /// Path of the rendered HTML page, relative to the output root.
    pub fn html_path(&self) -> String {
        html_path_for(&self.path)
    }

    /// Lookup key for case-insensitive category filters.
    pub fn category_key(&self) -> String {
        fold_case(&self.category)
    }
}

/// Unicode-aware case folding for category and tag filters, so `Ökonomie`
/// matches `ökonomie` the same way `Ops` matches `ops`.
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// Map a corpus path (`notes/a.md`) to its rendered page (`notes/a.html`).
pub fn html_path_for(path: &str) -> String {
    match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => format!("{}.html", &path[..dot]),
        _ => format!("{}.html", path),
    }
}

/// A file that failed front-matter validation.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub path: String,
    pub reason: String,
}

/// One row of the index table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexRow {
    pub title: String,
    pub problem: String,
    pub path: String,
    pub link: String,
}

/// All rows under one category or tag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexGroup {
    pub name: String,
    pub rows: Vec<IndexRow>,
}

/// The derived topic table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct CorpusIndex {
    pub categories: Vec<IndexGroup>,
    pub tags: Vec<IndexGroup>,
}

/// A chunk of a document's body text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A search result returned from the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub path: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub problem: Option<String>,
    pub last_updated: Option<String>,
    pub score: f64,
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_path_for() {
        assert_eq!(html_path_for("a.md"), "a.html");
        assert_eq!(html_path_for("notes/deep/b.markdown"), "notes/deep/b.html");
        assert_eq!(html_path_for("v1.2/README"), "v1.2/README.html");
    }

    #[test]
    fn test_fold_case_is_not_ascii_only() {
        assert_eq!(fold_case("Operations"), "operations");
        assert_eq!(fold_case("ÖKONOMIE"), fold_case("ökonomie"));
        assert_eq!(fold_case("Übersicht"), "übersicht");
    }
}
