//! YAML front-matter splitting and field extraction.
//!
//! A front-matter block is the text between an opening `---` line at the very
//! start of the file and the next `---` (or `...`) line. Scalars are
//! stringified leniently so `version: 1.0` and `version: "1.0"` agree.

use chrono::NaiveDate;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Front-matter keys consumed into typed fields.
const KNOWN_KEYS: &[&str] = &[
    "title",
    "problem",
    "context",
    "category",
    "tags",
    "version",
    "last_updated",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrontMatterError {
    #[error("no front matter block")]
    Missing,

    #[error("front matter block is not terminated")]
    Unterminated,

    #[error("invalid YAML in front matter: {0}")]
    Yaml(String),

    #[error("front matter is not a mapping")]
    NotAMapping,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// Typed view of a front-matter block. Every field is optional here;
/// [`FrontMatter::require`] enforces the fields an index entry needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub problem: Option<String>,
    pub context: Option<String>,
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub version: Option<String>,
    pub last_updated: Option<NaiveDate>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FrontMatter {
    /// Fail unless `title` and `category` are present and non-empty.
    pub fn require(&self) -> Result<(), FrontMatterError> {
        if self.title.is_none() {
            return Err(FrontMatterError::MissingField("title"));
        }
        if self.category.is_none() {
            return Err(FrontMatterError::MissingField("category"));
        }
        Ok(())
    }
}

/// Split a document into its raw YAML block and its body.
pub fn split(content: &str) -> Result<(&str, &str), FrontMatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut lines = content.split_inclusive('\n');
    let first = lines.next().ok_or(FrontMatterError::Missing)?;
    if first.trim_end() != "---" {
        return Err(FrontMatterError::Missing);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = &content[yaml_start..offset];
            let body = &content[offset + line.len()..];
            return Ok((yaml, body));
        }
        offset += line.len();
    }

    Err(FrontMatterError::Unterminated)
}

/// Parse a raw YAML block into a [`FrontMatter`].
pub fn parse(yaml: &str) -> Result<FrontMatter, FrontMatterError> {
    let value: Value =
        serde_yaml::from_str(yaml).map_err(|e| FrontMatterError::Yaml(e.to_string()))?;

    let mapping = match value {
        Value::Mapping(m) => m,
        // An empty block parses as null.
        Value::Null => serde_yaml::Mapping::new(),
        _ => return Err(FrontMatterError::NotAMapping),
    };

    let get = |key: &str| mapping.get(key);

    let mut fm = FrontMatter {
        title: get("title").and_then(scalar_to_string),
        problem: get("problem").and_then(scalar_to_string),
        context: get("context").and_then(scalar_to_string),
        category: get("category").and_then(scalar_to_string),
        tags: get("tags").map(parse_tags).unwrap_or_default(),
        version: get("version").and_then(scalar_to_string),
        last_updated: None,
        extra: BTreeMap::new(),
    };

    fm.last_updated = get("last_updated")
        .or_else(|| get("date"))
        .and_then(scalar_to_string)
        .and_then(|raw| {
            let date = parse_date(&raw);
            if date.is_none() {
                tracing::debug!(value = %raw, "ignoring unparseable date in front matter");
            }
            date
        });

    for (key, value) in &mapping {
        let Some(key) = key.as_str() else {
            continue;
        };
        if KNOWN_KEYS.contains(&key) {
            continue;
        }
        let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        fm.extra.insert(key.to_string(), json);
    }

    Ok(fm)
}

/// Split and parse in one step.
pub fn extract(content: &str) -> Result<(FrontMatter, &str), FrontMatterError> {
    let (yaml, body) = split(content)?;
    Ok((parse(yaml)?, body))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Tags may be a YAML list or a single string separated by commas or
/// whitespace, the way Jekyll accepts them.
fn parse_tags(value: &Value) -> BTreeSet<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        Value::String(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

/// Accepts `YYYY-MM-DD` or any string that starts with one
/// (`2024-03-01T10:00:00Z`, `2024-03-01 10:00:00 +0000`).
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// First `# ` heading of a Markdown body, if any.
pub fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("# "))
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}
