//! HTML rendering for document pages, the home page and the index pages.
//!
//! Output depends only on the records and the site settings: no timestamps,
//! no environment, stable ordering everywhere. That is what makes rebuilds
//! byte-identical.

use pulldown_cmark::{html, Event, Parser, Tag};

use crate::config::SiteConfig;
use crate::links::{markdown_options, rewrite_to_html};
use crate::models::{CorpusIndex, DocumentRecord, IndexGroup};

pub const HOME_PAGE: &str = "index.html";
pub const CATEGORIES_PAGE: &str = "categories.html";
pub const TAGS_PAGE: &str = "tags.html";

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem;line-height:1.5}\
nav a{margin-right:1rem}table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ddd;padding:.4rem;text-align:left;vertical-align:top}\
pre{background:#f6f8fa;padding:.8rem;overflow-x:auto}.meta th{width:9rem}";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Anchor id for a category or tag name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut dash = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

/// Relative prefix from a page back to the output root (`a/b.html` → `../`).
pub fn root_prefix(page_path: &str) -> String {
    "../".repeat(page_path.matches('/').count())
}

/// Render Markdown to HTML, pointing internal `.md` links at `.html` pages.
pub fn render_markdown(body: &str) -> String {
    let parser = Parser::new_ext(body, markdown_options()).map(|event| match event {
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: rewrite_to_html(&dest_url).into(),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn layout(site: &SiteConfig, page_path: &str, title: &str, content: &str) -> String {
    let prefix = root_prefix(page_path);
    let full_title = if title == site.title {
        escape_html(title)
    } else {
        format!("{} | {}", escape_html(title), escape_html(&site.title))
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{full_title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
<nav><a href=\"{prefix}{HOME_PAGE}\">{site_title}</a>\
<a href=\"{prefix}{CATEGORIES_PAGE}\">Categories</a>\
<a href=\"{prefix}{TAGS_PAGE}\">Tags</a></nav>\n\
<main>\n{content}</main>\n</body>\n</html>\n",
        site_title = escape_html(&site.title),
    )
}

fn meta_row(out: &mut String, label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push_str(&format!(
        "<tr><th>{}</th><td>{}</td></tr>\n",
        label,
        escape_html(value)
    ));
}

pub fn document_page(site: &SiteConfig, record: &DocumentRecord) -> String {
    let page_path = record.html_path();
    let prefix = root_prefix(&page_path);

    let mut content = format!("<h1>{}</h1>\n", escape_html(&record.title));
    content.push_str("<table class=\"meta\">\n");
    meta_row(&mut content, "Problem", &record.problem);
    meta_row(&mut content, "Context", &record.context);
    content.push_str(&format!(
        "<tr><th>Category</th><td><a href=\"{}{}#{}\">{}</a></td></tr>\n",
        prefix,
        CATEGORIES_PAGE,
        slugify(&record.category),
        escape_html(&record.category)
    ));
    if !record.tags.is_empty() {
        let tags: Vec<String> = record
            .tags
            .iter()
            .map(|t| {
                format!(
                    "<a href=\"{}{}#{}\">{}</a>",
                    prefix,
                    TAGS_PAGE,
                    slugify(t),
                    escape_html(t)
                )
            })
            .collect();
        content.push_str(&format!("<tr><th>Tags</th><td>{}</td></tr>\n", tags.join(", ")));
    }
    meta_row(&mut content, "Version", &record.version);
    if let Some(date) = record.last_updated {
        meta_row(&mut content, "Last updated", &date.format("%Y-%m-%d").to_string());
    }
    content.push_str("</table>\n<article>\n");
    content.push_str(&render_markdown(&record.body));
    content.push_str("</article>\n");

    layout(site, &page_path, &record.title, &content)
}

/// Records ordered for the home page: newest `last_updated` first, undated
/// last, ties by path.
pub fn recent<'a>(records: &'a [DocumentRecord], limit: usize) -> Vec<&'a DocumentRecord> {
    let mut sorted: Vec<&DocumentRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        b.last_updated
            .cmp(&a.last_updated)
            .then_with(|| a.path.cmp(&b.path))
    });
    sorted.truncate(limit);
    sorted
}

pub fn home_page(site: &SiteConfig, records: &[DocumentRecord], index: &CorpusIndex) -> String {
    let mut content = format!("<h1>{}</h1>\n", escape_html(&site.title));
    if !site.description.is_empty() {
        content.push_str(&format!("<p>{}</p>\n", escape_html(&site.description)));
    }

    content.push_str("<h2>Recent documents</h2>\n<ul>\n");
    for record in recent(records, site.recent_limit) {
        let date = record
            .last_updated
            .map(|d| format!(" <small>{}</small>", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        content.push_str(&format!(
            "<li><a href=\"{}\">{}</a>{}",
            escape_html(&record.html_path()),
            escape_html(&record.title),
            date
        ));
        if !record.problem.is_empty() {
            content.push_str(&format!(" &middot; {}", escape_html(&record.problem)));
        }
        content.push_str("</li>\n");
    }
    content.push_str("</ul>\n");

    content.push_str(&format!(
        "<p>{} documents in {} categories. <a href=\"{}\">Browse the index</a>.</p>\n",
        records.len(),
        index.categories.len(),
        CATEGORIES_PAGE
    ));

    layout(site, HOME_PAGE, &site.title, &content)
}

fn group_tables(groups: &[IndexGroup]) -> String {
    let mut content = String::new();
    for group in groups {
        content.push_str(&format!(
            "<h2 id=\"{}\">{}</h2>\n<table>\n<thead><tr><th>Document</th><th>Problem</th></tr></thead>\n<tbody>\n",
            slugify(&group.name),
            escape_html(&group.name)
        ));
        for row in &group.rows {
            content.push_str(&format!(
                "<tr><td><a href=\"{}\">{}</a></td><td>{}</td></tr>\n",
                escape_html(&row.link),
                escape_html(&row.title),
                escape_html(&row.problem)
            ));
        }
        content.push_str("</tbody>\n</table>\n");
    }
    content
}

pub fn categories_page(site: &SiteConfig, index: &CorpusIndex) -> String {
    let mut content = String::from("<h1>Document Index</h1>\n");
    if index.categories.is_empty() {
        content.push_str("<p>No documents.</p>\n");
    }
    content.push_str(&group_tables(&index.categories));
    layout(site, CATEGORIES_PAGE, "Document Index", &content)
}

pub fn tags_page(site: &SiteConfig, index: &CorpusIndex) -> String {
    let mut content = String::from("<h1>Tags</h1>\n");
    if index.tags.is_empty() {
        content.push_str("<p>No tags.</p>\n");
    }
    content.push_str(&group_tables(&index.tags));
    layout(site, TAGS_PAGE, "Tags", &content)
}
