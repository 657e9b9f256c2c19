//! Cross-reference extraction and resolution.
//!
//! Every link and image destination in a document body is collected with
//! its line and the heading it appears under. Internal destinations are
//! resolved against the corpus; "See Also" sections are the main consumer
//! but every internal link is held to the same rule.

use anyhow::{bail, Result};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::Config;
use crate::corpus::{self, Corpus};
use crate::models::DocumentRecord;

/// Markdown extensions understood by both the link checker and the renderer.
pub fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub target: String,
    /// 1-based line within the body.
    pub line: usize,
    /// Text of the nearest preceding heading.
    pub section: Option<String>,
    /// Inside a "See Also" section, including its subsections.
    pub see_also: bool,
    pub image: bool,
}

fn is_see_also(heading: &str) -> bool {
    heading
        .trim()
        .trim_end_matches(':')
        .eq_ignore_ascii_case("see also")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    pub source: String,
    pub target: String,
    /// 1-based line within the source file.
    pub line: usize,
    pub see_also: bool,
    pub reason: String,
}

/// Collect all link and image destinations in a Markdown body.
pub fn extract_links(body: &str) -> Vec<LinkRef> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(body.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| match line_starts.binary_search(&offset) {
        Ok(i) => i + 1,
        Err(i) => i,
    };

    let mut links = Vec::new();
    // Open headings, outermost first.
    let mut headings: Vec<(HeadingLevel, String)> = Vec::new();
    let mut heading_buf: Option<(HeadingLevel, String)> = None;

    for (event, range) in Parser::new_ext(body, markdown_options()).into_offset_iter() {
        let is_image = matches!(event, Event::Start(Tag::Image { .. }));
        match event {
            Event::Start(Tag::Heading { level, .. }) => heading_buf = Some((level, String::new())),
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = heading_buf.take() {
                    headings.retain(|(open, _)| *open < level);
                    headings.push((level, text.trim().to_string()));
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buf)) = heading_buf.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::Start(Tag::Link { dest_url, .. }) | Event::Start(Tag::Image { dest_url, .. }) => {
                links.push(LinkRef {
                    target: dest_url.to_string(),
                    line: line_of(range.start),
                    section: headings.last().map(|(_, text)| text.clone()),
                    see_also: headings.iter().any(|(_, text)| is_see_also(text)),
                    image: is_image,
                });
            }
            _ => {}
        }
    }

    links
}

/// Path part of an internal destination, or `None` for external links,
/// `mailto:` and same-page anchors.
pub fn internal_path(target: &str) -> Option<&str> {
    let target = target.trim();
    if target.is_empty() || target.starts_with("//") || has_scheme(target) {
        return None;
    }
    let end = target.find(&['#', '?'][..]).unwrap_or(target.len());
    let path = &target[..end];
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

fn has_scheme(target: &str) -> bool {
    match target.find(':') {
        Some(colon) => {
            let scheme = &target[..colon];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        None => false,
    }
}

/// Rewrite an internal `.md` destination to its rendered `.html` page,
/// keeping any fragment or query. Other destinations are returned unchanged.
pub fn rewrite_to_html(target: &str) -> String {
    let Some(path) = internal_path(target) else {
        return target.to_string();
    };
    let rest = &target.trim()[path.len()..];
    for ext in [".md", ".markdown"] {
        if let Some(stem) = path.strip_suffix(ext) {
            return format!("{}.html{}", stem, rest);
        }
    }
    target.to_string()
}

/// Lexically join `target` onto the directory of `source`, or onto the
/// corpus root for absolute targets. Fails when the path climbs above the root.
pub fn join_relative(source: &str, target: &str) -> Result<String, String> {
    let decoded = percent_decode(target);
    let mut parts: Vec<&str> = Vec::new();

    if !decoded.starts_with('/') {
        if let Some((dir, _)) = source.rsplit_once('/') {
            parts.extend(dir.split('/').filter(|p| !p.is_empty()));
        }
    }

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err("escapes corpus root".to_string());
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if decoded.ends_with('/') && !joined.is_empty() {
        Ok(format!("{}/", joined))
    } else {
        Ok(joined)
    }
}

fn is_markdown(path: &str) -> bool {
    path.ends_with(".md") || path.ends_with(".markdown")
}

/// Source documents a normalized path may refer to. Only forms the renderer
/// turns into a real page are accepted: `x.md`, `x.markdown`, or `x.html`
/// for either.
fn candidates(path: &str) -> Vec<String> {
    match path.strip_suffix(".html") {
        Some(stem) => vec![format!("{}.md", stem), format!("{}.markdown", stem)],
        None => vec![path.to_string()],
    }
}

/// What an internal link may point at: admitted documents (each has a
/// page), documents skipped for invalid front matter, and plain files
/// under the corpus root.
pub struct LinkTargets<'a> {
    pub documents: BTreeSet<&'a str>,
    pub skipped: BTreeSet<&'a str>,
    pub root: &'a Path,
}

impl<'a> LinkTargets<'a> {
    pub fn from_corpus(corpus: &'a Corpus, root: &'a Path) -> Self {
        Self {
            documents: corpus.admitted_paths(),
            skipped: corpus.skipped_paths(),
            root,
        }
    }

    /// Check one destination found in `source`. Returns `None` when it
    /// resolves or is not internal, otherwise the reason it is broken.
    pub fn check(&self, source: &str, target: &str) -> Option<String> {
        let path = internal_path(target)?;
        let joined = match join_relative(source, path) {
            Ok(j) => j,
            Err(reason) => return Some(reason),
        };
        if joined.is_empty() || joined.ends_with('/') {
            return Some("links to a directory, not a document".to_string());
        }

        let candidates = candidates(&joined);
        if candidates.iter().any(|c| self.documents.contains(c.as_str())) {
            return None;
        }
        if candidates.iter().any(|c| self.skipped.contains(c.as_str())) {
            return Some("target has invalid front matter".to_string());
        }
        // Markdown outside the corpus (excluded or not included) never gets a page.
        if !is_markdown(&joined) && self.root.join(&joined).is_file() {
            return None;
        }
        Some("target not found".to_string())
    }
}

/// Find every broken internal link in the corpus.
pub fn find_broken_links(corpus: &Corpus, root: &Path) -> Vec<BrokenLink> {
    let targets = LinkTargets::from_corpus(corpus, root);
    corpus
        .records
        .iter()
        .flat_map(|record| broken_in_record(record, &targets))
        .collect()
}

fn broken_in_record(record: &DocumentRecord, targets: &LinkTargets<'_>) -> Vec<BrokenLink> {
    extract_links(&record.body)
        .into_iter()
        .filter_map(|link| {
            targets.check(&record.path, &link.target).map(|reason| BrokenLink {
                source: record.path.clone(),
                see_also: link.see_also,
                line: link.line + record.body_line_offset,
                target: link.target,
                reason,
            })
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// CLI entry point for `refx check`.
///
/// Broken links always fail the check; invalid front matter fails it only
/// with `strict`.
pub fn run_check(config: &Config, strict: bool) -> Result<()> {
    let corpus = corpus::load_corpus(config)?;
    let broken = find_broken_links(&corpus, &config.corpus.root);
    let link_count: usize = corpus
        .records
        .iter()
        .map(|r| {
            extract_links(&r.body)
                .iter()
                .filter(|l| internal_path(&l.target).is_some())
                .count()
        })
        .sum();

    if !corpus.rejected.is_empty() {
        println!("invalid front matter:");
        for r in &corpus.rejected {
            println!("  {}: {}", r.path, r.reason);
        }
        println!();
    }

    if !broken.is_empty() {
        println!("broken links:");
        for b in &broken {
            let marker = if b.see_also { " [see also]" } else { "" };
            println!(
                "  {}:{}: {}{} ({})",
                b.source, b.line, b.target, marker, b.reason
            );
        }
        println!();
    }

    println!(
        "checked {} documents, {} internal links: {} broken, {} invalid front matter",
        corpus.records.len(),
        link_count,
        broken.len(),
        corpus.rejected.len()
    );

    if !broken.is_empty() {
        bail!("{} broken link(s)", broken.len());
    }
    if strict && !corpus.rejected.is_empty() {
        bail!("{} document(s) with invalid front matter", corpus.rejected.len());
    }

    println!("ok");
    Ok(())
}
