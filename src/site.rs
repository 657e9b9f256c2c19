//! Static site build.
//!
//! The build is planned in memory first (every output path mapped to its
//! bytes), then synced to disk against the previous build's manifest:
//! unchanged files are left alone, changed files rewritten, and files the
//! previous build produced but this one does not are deleted.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::corpus::{self, Corpus};
use crate::export::export_json;
use crate::index::build_index;
use crate::links::find_broken_links;
use crate::render::{self, CATEGORIES_PAGE, HOME_PAGE, TAGS_PAGE};

pub const INDEX_JSON: &str = "index.json";
pub const MANIFEST: &str = "manifest.json";

#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Manifest {
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub files: usize,
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Every file the site consists of, keyed by output-relative path.
pub fn plan_site(config: &Config, corpus: &Corpus) -> Result<BTreeMap<String, String>> {
    let index = build_index(&corpus.records);
    let site = &config.site;

    let mut files = BTreeMap::new();
    files.insert(
        HOME_PAGE.to_string(),
        render::home_page(site, &corpus.records, &index),
    );
    files.insert(
        CATEGORIES_PAGE.to_string(),
        render::categories_page(site, &index),
    );
    files.insert(TAGS_PAGE.to_string(), render::tags_page(site, &index));
    files.insert(
        INDEX_JSON.to_string(),
        export_json(config, corpus, &index)?,
    );

    for record in &corpus.records {
        let path = record.html_path();
        if files.contains_key(&path) || path == MANIFEST {
            bail!(
                "{} renders to {}, which collides with a generated page",
                record.path,
                path
            );
        }
        files.insert(path, render::document_page(site, record));
    }

    Ok(files)
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn read_manifest(out_dir: &Path) -> Manifest {
    let path = out_dir.join(MANIFEST);
    let Ok(text) = std::fs::read_to_string(&path) else {
        return Manifest::default();
    };
    match serde_json::from_str(&text) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable build manifest");
            Manifest::default()
        }
    }
}

/// Paths from a manifest are only trusted when they stay inside the output dir.
fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

/// Bring `out_dir` in line with `files`.
pub fn write_site(out_dir: &Path, files: &BTreeMap<String, String>) -> Result<BuildReport> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir {}", out_dir.display()))?;

    let previous = read_manifest(out_dir);
    let mut report = BuildReport {
        files: files.len(),
        ..Default::default()
    };
    let mut manifest = Manifest::default();

    for (rel, content) in files {
        let target = out_dir.join(rel);
        let hash = sha256_hex(content.as_bytes());

        let unchanged = std::fs::read(&target)
            .map(|existing| sha256_hex(&existing) == hash)
            .unwrap_or(false);
        if unchanged {
            report.unchanged += 1;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, content)
                .with_context(|| format!("failed to write {}", target.display()))?;
            tracing::debug!(path = %rel, "wrote");
            report.written += 1;
        }

        manifest.files.push(ManifestEntry {
            path: rel.clone(),
            sha256: hash,
        });
    }

    for stale in previous.files {
        if files.contains_key(&stale.path) {
            continue;
        }
        if !is_safe_relative(&stale.path) {
            tracing::warn!(path = %stale.path, "refusing to remove path outside output dir");
            continue;
        }
        let target = out_dir.join(&stale.path);
        if target.is_file() {
            std::fs::remove_file(&target)
                .with_context(|| format!("failed to remove {}", target.display()))?;
            report.removed += 1;
            remove_empty_parents(out_dir, &target);
        }
    }

    let mut manifest_json = serde_json::to_string_pretty(&manifest)?;
    manifest_json.push('\n');
    let manifest_path = out_dir.join(MANIFEST);
    let manifest_unchanged = std::fs::read_to_string(&manifest_path)
        .map(|existing| existing == manifest_json)
        .unwrap_or(false);
    if !manifest_unchanged {
        std::fs::write(&manifest_path, manifest_json)?;
    }

    Ok(report)
}

fn remove_empty_parents(out_dir: &Path, file: &Path) {
    let mut dir = file.parent();
    while let Some(d) = dir {
        if d == out_dir || !d.starts_with(out_dir) {
            break;
        }
        // Fails (and stops) on the first non-empty directory.
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

/// CLI entry point for `refx build`.
pub fn run_build(config: &Config, out: Option<PathBuf>) -> Result<()> {
    let out_dir = out.unwrap_or_else(|| config.output.dir.clone());
    let corpus = corpus::load_corpus(config)?;

    let broken = find_broken_links(&corpus, &config.corpus.root);
    for b in &broken {
        tracing::warn!(source = %b.source, line = b.line, target = %b.target, "broken link");
    }

    let files = plan_site(config, &corpus)?;
    let report = write_site(&out_dir, &files)?;

    println!("build {}", out_dir.display());
    println!("  documents: {}", corpus.records.len());
    println!("  rejected: {}", corpus.rejected.len());
    println!("  broken links: {}", broken.len());
    println!("  files: {}", report.files);
    println!("  written: {}", report.written);
    println!("  unchanged: {}", report.unchanged);
    println!("  removed: {}", report.removed);
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::corpus::build_corpus;
    use crate::models::SourceFile;
    use tempfile::TempDir;

    fn config() -> Config {
        parse_config("[site]\ntitle = \"Notes\"\n[corpus]\nroot = \".\"\n").unwrap()
    }

    fn doc(path: &str, title: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: format!("---\ntitle: {}\ncategory: C\n---\n# {}\n", title, title),
        }
    }

    #[test]
    fn test_plan_contains_all_pages() {
        let cfg = config();
        let corpus = build_corpus(vec![doc("a.md", "A"), doc("sub/b.md", "B")], &cfg.corpus);
        let files = plan_site(&cfg, &corpus).unwrap();
        let paths: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec!["a.html", "categories.html", "index.html", "index.json", "sub/b.html", "tags.html"]
        );
    }

    fn hrefs(html: &str) -> Vec<&str> {
        html.split("href=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .collect()
    }

    #[test]
    fn test_links_that_pass_the_check_point_at_rendered_pages() {
        let cfg = config();
        let files = vec![
            SourceFile {
                path: "a.md".to_string(),
                content: "---\ntitle: A\ncategory: C\n---\n\
                    [b](sub/b.md#x), [b again](./sub/b.html), [top](#top), [ext](https://x.y/z.md)\n"
                    .to_string(),
            },
            SourceFile {
                path: "sub/b.md".to_string(),
                content: "---\ntitle: B\ncategory: C\n---\n## See Also\n\n- [a](../a.md)\n"
                    .to_string(),
            },
        ];
        let corpus = build_corpus(files, &cfg.corpus);
        let tmp = TempDir::new().unwrap();
        assert!(find_broken_links(&corpus, tmp.path()).is_empty());

        let site = plan_site(&cfg, &corpus).unwrap();
        // Page chrome contributes four internal links; the rest come from the body.
        for (page, expected) in [("a.html", 6), ("sub/b.html", 5)] {
            let mut internal = 0;
            for href in hrefs(&site[page]) {
                if href.starts_with('#') || href.contains("://") {
                    continue;
                }
                let path = href.split('#').next().unwrap();
                let resolved = crate::links::join_relative(page, path).unwrap();
                assert!(site.contains_key(&resolved), "{} links to missing {}", page, resolved);
                internal += 1;
            }
            assert!(internal >= expected, "{} has {} internal links", page, internal);
        }
    }

    #[test]
    fn test_collision_is_an_error() {
        let cfg = config();
        let corpus = build_corpus(vec![doc("index.md", "Home")], &cfg.corpus);
        let err = plan_site(&cfg, &corpus).unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn test_write_site_is_idempotent_and_prunes() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("site");
        let cfg = config();

        let corpus = build_corpus(vec![doc("a.md", "A"), doc("sub/b.md", "B")], &cfg.corpus);
        let files = plan_site(&cfg, &corpus).unwrap();

        let first = write_site(&out, &files).unwrap();
        assert_eq!(first.written, 6);
        let snapshot = std::fs::read(out.join("categories.html")).unwrap();

        let second = write_site(&out, &files).unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.unchanged, 6);
        assert_eq!(std::fs::read(out.join("categories.html")).unwrap(), snapshot);

        let corpus = build_corpus(vec![doc("a.md", "A")], &cfg.corpus);
        let files = plan_site(&cfg, &corpus).unwrap();
        let third = write_site(&out, &files).unwrap();
        assert_eq!(third.removed, 1);
        assert!(!out.join("sub/b.html").exists());
        assert!(!out.join("sub").exists());
        assert!(out.join("a.html").exists());
    }

    #[test]
    fn test_is_safe_relative() {
        assert!(is_safe_relative("a/b.html"));
        assert!(!is_safe_relative("../a.html"));
        assert!(!is_safe_relative("/etc/passwd"));
        assert!(!is_safe_relative("a//b"));
    }
}
