//! # Reference Index
//!
//! A static documentation site generator for a corpus of Markdown reference
//! documents, each carrying YAML front matter (title, problem, context,
//! category, tags, version, last updated).
//!
//! The corpus is scanned, every document's front matter is parsed into a
//! [`models::DocumentRecord`], and records are grouped into a deterministic
//! category index. From there the same records feed a static HTML site, a
//! link checker that keeps "See Also" cross-references honest, a JSON export,
//! and an SQLite keyword catalog served over HTTP for agent retrieval.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Markdown   │──▶│   Records +   │──▶│  Static site   │
//! │  + YAML     │   │  Index/Links  │   │  HTML + JSON   │
//! └─────────────┘   └──────┬───────┘   └───────────────┘
//!                          │
//!                          ▼
//!                    ┌──────────┐       ┌──────────┐
//!                    │  SQLite  │──────▶│   HTTP   │
//!                    │  FTS5    │       │  (serve) │
//!                    └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! refx scan                     # list documents and front-matter status
//! refx check                    # validate front matter and internal links
//! refx build                    # render the site into ./_site
//! refx sync && refx search "rank fusion"
//! refx serve                    # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`frontmatter`] | YAML front-matter parsing |
//! | [`connector_fs`] | Corpus file scanner |
//! | [`corpus`] | Records from scanned files |
//! | [`index`] | Category and tag index |
//! | [`links`] | Internal link extraction and checking |
//! | [`render`] | HTML rendering |
//! | [`site`] | Site build with manifest |
//! | [`export`] | JSON export |
//! | [`chunk`] | Text chunking |
//! | [`ingest`] | Catalog sync |
//! | [`search`] | Keyword search |
//! | [`get`] | Document retrieval by path |
//! | [`scan`] | Per-file scan report |
//! | [`stats`] | Catalog statistics |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing subscriber setup |

pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod corpus;
pub mod db;
pub mod export;
pub mod frontmatter;
pub mod get;
pub mod index;
pub mod ingest;
pub mod links;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod render;
pub mod scan;
pub mod search;
pub mod server;
pub mod site;
pub mod stats;
