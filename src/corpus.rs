//! Turns scanned files into [`DocumentRecord`]s.
//!
//! Files with missing or malformed front matter are always reported in
//! [`Corpus::rejected`]. Under [`InvalidPolicy::Skip`] they go no further;
//! under [`InvalidPolicy::Blank`] they are also admitted with blank fields.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::config::{Config, CorpusConfig, InvalidPolicy};
use crate::connector_fs;
use crate::frontmatter::{self, FrontMatter};
use crate::models::{DocumentRecord, Rejection, SourceFile};

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Admitted records, sorted by path.
    pub records: Vec<DocumentRecord>,
    pub rejected: Vec<Rejection>,
}

impl Corpus {
    pub fn find(&self, path: &str) -> Option<&DocumentRecord> {
        self.records
            .binary_search_by(|r| r.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.records[i])
    }

    /// Paths of admitted records; each one gets a rendered page.
    pub fn admitted_paths(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.path.as_str()).collect()
    }

    /// Rejected documents that were left out entirely (no page, no row).
    pub fn skipped_paths(&self) -> BTreeSet<&str> {
        self.rejected
            .iter()
            .map(|r| r.path.as_str())
            .filter(|p| self.find(p).is_none())
            .collect()
    }
}

/// Scan the configured root and load every document.
pub fn load_corpus(config: &Config) -> Result<Corpus> {
    let files = connector_fs::scan_corpus(&config.corpus)?;
    Ok(build_corpus(files, &config.corpus))
}

/// Pure half of [`load_corpus`]: parse already-read files.
pub fn build_corpus(files: Vec<SourceFile>, corpus: &CorpusConfig) -> Corpus {
    let mut out = Corpus::default();

    for file in files {
        let hash = content_hash(&file.path, &file.content);
        let (front, body) = match frontmatter::split(&file.content) {
            Ok((yaml, body)) => (frontmatter::parse(yaml), body),
            Err(e) => (Err(e), file.content.as_str()),
        };

        match front {
            Ok(fm) => match fm.require() {
                Ok(()) => out
                    .records
                    .push(record_from(&file, fm, body, hash, true, corpus)),
                Err(e) => reject(&mut out, &file, e.to_string(), fm, body, hash, corpus),
            },
            // Nothing parsed, so a blank record starts from empty fields.
            Err(e) => reject(
                &mut out,
                &file,
                e.to_string(),
                FrontMatter::default(),
                body,
                hash,
                corpus,
            ),
        }
    }

    out.records.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

fn reject(
    out: &mut Corpus,
    file: &SourceFile,
    reason: String,
    partial: FrontMatter,
    body: &str,
    hash: String,
    corpus: &CorpusConfig,
) {
    tracing::warn!(path = %file.path, reason = %reason, "invalid front matter");
    out.rejected.push(Rejection {
        path: file.path.clone(),
        reason,
    });
    if corpus.on_invalid == InvalidPolicy::Blank {
        out.records
            .push(record_from(file, partial, body, hash, false, corpus));
    }
}

fn record_from(
    file: &SourceFile,
    fm: FrontMatter,
    body: &str,
    content_hash: String,
    valid: bool,
    corpus: &CorpusConfig,
) -> DocumentRecord {
    let title = fm
        .title
        .or_else(|| frontmatter::first_heading(body))
        .unwrap_or_else(|| file_stem(&file.path));

    DocumentRecord {
        path: file.path.clone(),
        title,
        problem: fm.problem.unwrap_or_default(),
        context: fm.context.unwrap_or_default(),
        category: fm
            .category
            .unwrap_or_else(|| corpus.default_category.clone()),
        tags: fm.tags,
        version: fm.version.unwrap_or_default(),
        last_updated: fm.last_updated,
        extra: fm.extra,
        body: body.to_string(),
        body_line_offset: file.content[..file.content.len() - body.len()]
            .matches('\n')
            .count(),
        content_hash,
        valid,
    }
}

fn file_stem(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[..dot].to_string(),
        _ => name.to_string(),
    }
}

/// SHA-256 over path and content; changes whenever either does.
pub fn content_hash(path: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn corpus_config(policy: InvalidPolicy) -> CorpusConfig {
        CorpusConfig {
            root: PathBuf::from("."),
            include_globs: vec!["**/*.md".to_string()],
            exclude_globs: vec![],
            follow_symlinks: false,
            on_invalid: policy,
            default_category: "Misc".to_string(),
        }
    }

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    fn sample() -> Vec<SourceFile> {
        vec![
            file("b.md", "---\ntitle: Beta\ncategory: Ops\n---\nbeta body"),
            file("a.md", "---\ntitle: Alpha\ncategory: Search\nproblem: p\n---\nalpha"),
            file("broken.md", "---\ntitle: [oops\n---\n# Broken Heading\n"),
            file("nocat.md", "---\ntitle: No Category\n---\ntext"),
            file("plain.md", "no front matter here"),
        ]
    }

    #[test]
    fn test_skip_policy() {
        let corpus = build_corpus(sample(), &corpus_config(InvalidPolicy::Skip));
        let paths: Vec<&str> = corpus.records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md"]);
        assert_eq!(corpus.rejected.len(), 3);
        assert!(corpus.records.iter().all(|r| r.valid));
        assert_eq!(corpus.find("a.md").unwrap().problem, "p");
        assert_eq!(corpus.find("a.md").unwrap().body_line_offset, 5);
        assert!(corpus.find("broken.md").is_none());
        assert_eq!(corpus.admitted_paths().len(), 2);
        assert_eq!(corpus.skipped_paths().len(), 3);
        assert!(corpus.skipped_paths().contains("broken.md"));
    }

    #[test]
    fn test_blank_policy() {
        let corpus = build_corpus(sample(), &corpus_config(InvalidPolicy::Blank));
        assert_eq!(corpus.records.len(), 5);
        assert_eq!(corpus.rejected.len(), 3);
        assert!(corpus.skipped_paths().is_empty());

        let broken = corpus.find("broken.md").unwrap();
        assert!(!broken.valid);
        assert_eq!(broken.title, "Broken Heading");
        assert_eq!(broken.category, "Misc");
        assert_eq!(broken.problem, "");

        let nocat = corpus.find("nocat.md").unwrap();
        assert_eq!(nocat.title, "No Category");
        assert_eq!(nocat.category, "Misc");

        let plain = corpus.find("plain.md").unwrap();
        assert_eq!(plain.title, "plain");
        assert_eq!(plain.body, "no front matter here");
    }

    #[test]
    fn test_rejection_reasons() {
        let corpus = build_corpus(sample(), &corpus_config(InvalidPolicy::Skip));
        let reason = |p: &str| {
            corpus
                .rejected
                .iter()
                .find(|r| r.path == p)
                .map(|r| r.reason.clone())
                .unwrap()
        };
        assert!(reason("broken.md").starts_with("invalid YAML"));
        assert_eq!(reason("nocat.md"), "missing required field `category`");
        assert_eq!(reason("plain.md"), "no front matter block");
    }

    #[test]
    fn test_content_hash_changes() {
        assert_eq!(content_hash("a.md", "x"), content_hash("a.md", "x"));
        assert_ne!(content_hash("a.md", "x"), content_hash("a.md", "y"));
        assert_ne!(content_hash("a.md", "x"), content_hash("b.md", "x"));
    }
}
