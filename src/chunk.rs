//! Section-aware text chunker for the catalog.
//!
//! A document body is first cut at its Markdown headings, so a chunk never
//! straddles two sections, then each section is packed paragraph by
//! paragraph up to `max_tokens`. Headings inside fenced code blocks are not
//! treated as section breaks.
//!
//! Each chunk receives a SHA-256 hash of its text for staleness detection.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunks, respecting max_tokens.
/// Returns at least one chunk, with contiguous indices starting at 0.
pub fn chunk_text(document_id: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut pieces = Vec::new();

    for section in split_sections(text) {
        pack_section(&section, max_chars, &mut pieces);
    }
    if pieces.is_empty() {
        pieces.push(text.trim().to_string());
    }

    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(document_id, i as i64, piece))
        .collect()
}

/// Cut `text` before every ATX heading line that is outside a code fence.
fn split_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut fence: Option<&str> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) if trimmed.starts_with(marker) => fence = None,
            Some(_) => {}
            None if trimmed.starts_with("```") => fence = Some("```"),
            None if trimmed.starts_with("~~~") => fence = Some("~~~"),
            None if is_heading(trimmed) && !current.trim().is_empty() => {
                sections.push(std::mem::take(&mut current));
            }
            None => {}
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current);
    }
    sections
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes)
        && line[hashes..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace)
}

/// Greedily join paragraphs of one section into pieces of at most
/// `max_chars` bytes. Oversized paragraphs are hard split.
fn pack_section(section: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut buf = String::new();

    for para in section.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let joined_len = if buf.is_empty() {
            para.len()
        } else {
            buf.len() + 2 + para.len()
        };
        if joined_len > max_chars && !buf.is_empty() {
            out.push(std::mem::take(&mut buf));
        }

        if para.len() > max_chars {
            hard_split(para, max_chars, out);
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(para);
        }
    }

    if !buf.is_empty() {
        out.push(buf);
    }
}

/// Split at most every `max_chars` bytes, preferring line then word breaks,
/// never inside a UTF-8 sequence.
fn hard_split(mut remaining: &str, max_chars: usize, out: &mut Vec<String>) {
    while !remaining.is_empty() {
        let limit = floor_char_boundary(remaining, max_chars);
        let at = if limit >= remaining.len() {
            remaining.len()
        } else {
            let head = &remaining[..limit];
            match head.rfind('\n').or_else(|| head.rfind(' ')) {
                Some(pos) if pos > 0 => pos + 1,
                // A single char wider than the budget still has to make progress.
                _ if limit == 0 => remaining
                    .char_indices()
                    .nth(1)
                    .map_or(remaining.len(), |(i, _)| i),
                _ => limit,
            }
        };

        let piece = remaining[..at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[at..];
    }
}

/// Largest index `<= at` that lies on a char boundary of `s`.
fn floor_char_boundary(s: &str, at: usize) -> usize {
    let mut i = at.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let hash = format!("{:x}", Sha256::digest(text.as_bytes()));

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
