//! `refx scan`: list every document the corpus scanner picks up.
//!
//! Each scanned file gets one row with its status. Rejected files show the
//! reason their front matter was refused, and whether the `blank` policy
//! still admitted them.

use anyhow::Result;

use crate::config::{Config, InvalidPolicy};
use crate::corpus::{self, Corpus};

/// One line of scan output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRow {
    pub path: String,
    pub status: &'static str,
    pub detail: String,
}

/// Rows for every scanned file, ordered by path.
pub fn scan_rows(corpus: &Corpus, policy: InvalidPolicy) -> Vec<ScanRow> {
    let mut rows: Vec<ScanRow> = corpus
        .records
        .iter()
        .filter(|r| r.valid)
        .map(|r| ScanRow {
            path: r.path.clone(),
            status: "ok",
            detail: r.category.clone(),
        })
        .collect();

    let rejected_status = match policy {
        InvalidPolicy::Skip => "skipped",
        InvalidPolicy::Blank => "blank",
    };
    rows.extend(corpus.rejected.iter().map(|r| ScanRow {
        path: r.path.clone(),
        status: rejected_status,
        detail: r.reason.clone(),
    }));

    rows.sort_by(|a, b| a.path.cmp(&b.path));
    rows
}

pub fn run_scan(config: &Config) -> Result<()> {
    let corpus = corpus::load_corpus(config)?;
    let rows = scan_rows(&corpus, config.corpus.on_invalid);

    println!("{:<8} {:<48} CATEGORY / REASON", "STATUS", "PATH");
    for row in &rows {
        println!("{:<8} {:<48} {}", row.status, row.path, row.detail);
    }
    println!();
    println!(
        "{} documents, {} valid, {} invalid front matter",
        rows.len(),
        rows.len() - corpus.rejected.len(),
        corpus.rejected.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::corpus::build_corpus;
    use crate::models::SourceFile;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_scan_rows_report_every_file() {
        let files = vec![
            file("b.md", "---\ntitle: B\ncategory: Ops\n---\nbody\n"),
            file("a.md", "no front matter\n"),
        ];

        for (policy, status) in [("skip", "skipped"), ("blank", "blank")] {
            let config = parse_config(&format!(
                "[corpus]\nroot = \".\"\non_invalid = \"{}\"\n",
                policy
            ))
            .unwrap();
            let corpus = build_corpus(files.clone(), &config.corpus);
            let rows = scan_rows(&corpus, config.corpus.on_invalid);

            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].path, "a.md");
            assert_eq!(rows[0].status, status);
            assert_eq!(rows[0].detail, "no front matter block");
            assert_eq!(rows[1].status, "ok");
            assert_eq!(rows[1].detail, "Ops");
        }
    }
}
