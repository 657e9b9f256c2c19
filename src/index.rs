//! Index builder: groups records into the category and tag tables.
//!
//! The index is a pure function of the record set. Categories are ordered
//! case-insensitively (ties broken by the exact name) and rows within a
//! group by title case-insensitively, then by path. Every admitted record
//! lands in exactly one category group and once in each of its tag groups.

use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::corpus;
use crate::models::{CorpusIndex, DocumentRecord, IndexGroup, IndexRow};

pub fn build_index(records: &[DocumentRecord]) -> CorpusIndex {
    let mut by_category: BTreeMap<(String, String), Vec<&DocumentRecord>> = BTreeMap::new();
    let mut by_tag: BTreeMap<(String, String), Vec<&DocumentRecord>> = BTreeMap::new();

    for record in records {
        by_category
            .entry(group_key(&record.category))
            .or_default()
            .push(record);
        for tag in &record.tags {
            by_tag.entry(group_key(tag)).or_default().push(record);
        }
    }

    CorpusIndex {
        categories: into_groups(by_category),
        tags: into_groups(by_tag),
    }
}

fn group_key(name: &str) -> (String, String) {
    (name.to_lowercase(), name.to_string())
}

fn into_groups(map: BTreeMap<(String, String), Vec<&DocumentRecord>>) -> Vec<IndexGroup> {
    map.into_iter()
        .map(|((_, name), mut records)| {
            records.sort_by(|a, b| {
                a.title
                    .to_lowercase()
                    .cmp(&b.title.to_lowercase())
                    .then_with(|| a.path.cmp(&b.path))
            });
            IndexGroup {
                name,
                rows: records.into_iter().map(row_for).collect(),
            }
        })
        .collect()
}

fn row_for(record: &DocumentRecord) -> IndexRow {
    IndexRow {
        title: record.title.clone(),
        problem: record.problem.clone(),
        path: record.path.clone(),
        link: record.html_path(),
    }
}

/// Render the category table as Markdown, one section per category.
pub fn to_markdown(index: &CorpusIndex) -> String {
    let mut out = String::new();
    for group in &index.categories {
        out.push_str(&format!("## {}\n\n", group.name));
        out.push_str("| Document | Problem |\n|----------|---------|\n");
        for row in &group.rows {
            out.push_str(&format!(
                "| [{}]({}) | {} |\n",
                escape_cell(&row.title),
                row.path,
                escape_cell(&row.problem)
            ));
        }
        out.push('\n');
    }
    out
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// CLI entry point for `refx index`.
pub fn run_index(config: &Config, format: &str) -> Result<()> {
    let corpus = corpus::load_corpus(config)?;
    let index = build_index(&corpus.records);

    match format {
        "table" => {
            for group in &index.categories {
                println!("{} ({})", group.name, group.rows.len());
                for row in &group.rows {
                    println!("  {:<40} {}", row.title, row.path);
                    if !row.problem.is_empty() {
                        println!("  {:<40} {}", "", row.problem);
                    }
                }
                println!();
            }
            println!(
                "{} documents in {} categories ({} rejected)",
                corpus.records.len(),
                index.categories.len(),
                corpus.rejected.len()
            );
        }
        "markdown" => print!("{}", to_markdown(&index)),
        "json" => println!("{}", serde_json::to_string_pretty(&index)?),
        other => bail!(
            "Unknown index format: '{}'. Use table, markdown, or json.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn record(path: &str, title: &str, category: &str, tags: &[&str]) -> DocumentRecord {
        DocumentRecord {
            path: path.to_string(),
            title: title.to_string(),
            problem: format!("problem of {}", title),
            context: String::new(),
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            version: String::new(),
            last_updated: None,
            extra: BTreeMap::new(),
            body: String::new(),
            body_line_offset: 0,
            content_hash: String::new(),
            valid: true,
        }
    }

    fn sample() -> Vec<DocumentRecord> {
        vec![
            record("search/rrf.md", "Reciprocal Rank Fusion", "Search", &["sql", "ranking"]),
            record("ops/webhooks.md", "webhook queues", "ops", &["queues"]),
            record("ops/tokens.md", "Token tracking", "Ops", &["proxy", "queues"]),
            record("search/bm25.md", "BM25 basics", "Search", &["ranking"]),
            record("search/bm25-copy.md", "BM25 basics", "Search", &[]),
        ]
    }

    #[test]
    fn test_each_record_once_under_its_category() {
        let records = sample();
        let index = build_index(&records);

        for r in &records {
            let hits: Vec<&IndexGroup> = index
                .categories
                .iter()
                .filter(|g| g.rows.iter().any(|row| row.path == r.path))
                .collect();
            assert_eq!(hits.len(), 1, "{} should be in exactly one group", r.path);
            assert_eq!(hits[0].name, r.category);
            let count = hits[0].rows.iter().filter(|row| row.path == r.path).count();
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn test_category_ordering_case_insensitive() {
        let index = build_index(&sample());
        let names: Vec<&str> = index.categories.iter().map(|g| g.name.as_str()).collect();
        // "Ops" and "ops" are distinct categories, ordered by exact name on ties.
        assert_eq!(names, vec!["Ops", "ops", "Search"]);
    }

    #[test]
    fn test_row_ordering() {
        let index = build_index(&sample());
        let search = index.categories.iter().find(|g| g.name == "Search").unwrap();
        let paths: Vec<&str> = search.rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["search/bm25-copy.md", "search/bm25.md", "search/rrf.md"]
        );
        assert_eq!(search.rows[2].link, "search/rrf.html");
    }

    #[test]
    fn test_tag_groups() {
        let index = build_index(&sample());
        let tags: Vec<&str> = index.tags.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(tags, vec!["proxy", "queues", "ranking", "sql"]);
        let queues = index.tags.iter().find(|g| g.name == "queues").unwrap();
        assert_eq!(queues.rows.len(), 2);
    }

    #[test]
    fn test_removal_only_removes_that_row() {
        let records = sample();
        let before = build_index(&records);

        let remaining: Vec<DocumentRecord> = records
            .iter()
            .filter(|r| r.path != "search/rrf.md")
            .cloned()
            .collect();
        let after = build_index(&remaining);

        for group in &before.categories {
            let expected: Vec<&IndexRow> = group
                .rows
                .iter()
                .filter(|r| r.path != "search/rrf.md")
                .collect();
            let actual = after
                .categories
                .iter()
                .find(|g| g.name == group.name)
                .map(|g| g.rows.iter().collect::<Vec<_>>())
                .unwrap_or_default();
            assert_eq!(actual, expected);
        }
        assert!(!after.tags.iter().any(|g| g.name == "sql"));
    }

    #[test]
    fn test_emptied_category_disappears() {
        let records = vec![record("a.md", "A", "Solo", &[])];
        assert_eq!(build_index(&records).categories.len(), 1);
        assert!(build_index(&[]).categories.is_empty());
    }

    #[test]
    fn test_deterministic_regardless_of_input_order() {
        let records = sample();
        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(build_index(&records), build_index(&reversed));
    }

    #[test]
    fn test_markdown_table() {
        let md = to_markdown(&build_index(&[record("a.md", "A | B", "Cat", &[])]));
        assert!(md.contains("## Cat"));
        assert!(md.contains("| [A \\| B](a.md) | problem of A \\| B |"));
    }
}
