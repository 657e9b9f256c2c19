//! Filesystem scanner for the document store.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::models::SourceFile;

/// Directories that never hold source documents.
const BUILTIN_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/_site/**",
    "**/node_modules/**",
    "**/target/**",
];

/// Walk the corpus root and read every file matching the include globs.
/// Results are sorted by relative path.
pub fn scan_corpus(corpus: &CorpusConfig) -> Result<Vec<SourceFile>> {
    let root = &corpus.root;
    if !root.is_dir() {
        bail!("corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&corpus.include_globs)?;

    let mut excludes: Vec<String> = BUILTIN_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(corpus.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(corpus.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel_str = relative_path(root, path);

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        files.push(SourceFile {
            path: rel_str,
            content: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(root = %root.display(), files = files.len(), "scanned corpus");

    Ok(files)
}

/// Corpus-relative path with `/` separators on every platform.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
