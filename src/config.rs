//! TOML configuration.
//!
//! Only `[corpus]` is required. Every other section falls back to defaults so
//! a build-only setup can be a three-line file:
//!
//! ```toml
//! [corpus]
//! root = "./docs"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_site_title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Number of documents listed on the home page.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_site_title(),
            description: String::new(),
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_site_title() -> String {
    "Reference Index".to_string()
}
fn default_recent_limit() -> usize {
    10
}

/// What to do with a document whose front matter is missing or malformed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvalidPolicy {
    /// Leave the document out of the index.
    #[default]
    Skip,
    /// Index the document with blank fields under the default category.
    Blank,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default)]
    pub on_invalid: InvalidPolicy,
    #[serde(default = "default_category")]
    pub default_category: String,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.markdown".to_string()]
}
fn default_category() -> String {
    "Uncategorized".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./_site")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/refx.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    700
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_candidate_k")]
    pub candidate_k: i64,
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_k: default_candidate_k(),
            final_limit: default_final_limit(),
        }
    }
}

fn default_candidate_k() -> i64 {
    80
}
fn default_final_limit() -> i64 {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.corpus.include_globs.is_empty() {
        bail!("corpus.include_globs must not be empty");
    }
    for pattern in config
        .corpus
        .include_globs
        .iter()
        .chain(config.corpus.exclude_globs.iter())
    {
        globset::Glob::new(pattern)
            .with_context(|| format!("invalid glob in [corpus]: '{}'", pattern))?;
    }

    if config.corpus.default_category.trim().is_empty() {
        bail!("corpus.default_category must not be empty");
    }

    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.final_limit < 1 {
        bail!("retrieval.final_limit must be >= 1");
    }
    if config.retrieval.candidate_k < 1 {
        bail!("retrieval.candidate_k must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse_config("[corpus]\nroot = \"./docs\"\n").unwrap();
        assert_eq!(cfg.corpus.root, PathBuf::from("./docs"));
        assert_eq!(cfg.corpus.on_invalid, InvalidPolicy::Skip);
        assert_eq!(cfg.corpus.default_category, "Uncategorized");
        assert_eq!(cfg.site.recent_limit, 10);
        assert_eq!(cfg.output.dir, PathBuf::from("./_site"));
        assert_eq!(cfg.chunking.max_tokens, 700);
        assert_eq!(cfg.server.bind, "127.0.0.1:7340");
    }

    #[test]
    fn test_blank_policy() {
        let cfg = parse_config("[corpus]\nroot = \"d\"\non_invalid = \"blank\"\n").unwrap();
        assert_eq!(cfg.corpus.on_invalid, InvalidPolicy::Blank);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(parse_config("[corpus]\nroot = \"d\"\non_invalid = \"retry\"\n").is_err());
    }

    #[test]
    fn test_missing_corpus_rejected() {
        assert!(parse_config("[site]\ntitle = \"x\"\n").is_err());
    }

    #[test]
    fn test_bad_glob_rejected() {
        let err = parse_config("[corpus]\nroot = \"d\"\nexclude_globs = [\"a/[\"]\n").unwrap_err();
        assert!(format!("{:#}", err).contains("invalid glob"));
    }

    #[test]
    fn test_zero_max_tokens_rejected() {
        assert!(parse_config("[corpus]\nroot = \"d\"\n[chunking]\nmax_tokens = 0\n").is_err());
    }
}
