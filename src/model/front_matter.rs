//! Front-matter parsing.
//!
//! A content file carries metadata when it begins with the exact
//! three-byte sequence `---` at offset 0, followed by a YAML block closed
//! by another `---` line. Everything after the closing delimiter is the
//! raw body.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_yaml_ng::Value;
use std::{
    fs::File,
    io::Read,
    path::Path,
};

/// The front-matter delimiter, byte-exact.
pub const DELIMITER: &str = "---";

/// Parsed front-matter mapping with typed accessors for the keys the
/// engine cares about. Unknown keys are kept and surfaced to templates.
#[derive(Debug, Clone, Default)]
pub struct FrontMatter(Value);

/// A source file split into front matter and raw body.
#[derive(Debug, Clone)]
pub struct Document {
    pub front: FrontMatter,
    pub body: String,
}

impl Document {
    /// Split file content into front matter and body.
    ///
    /// Content without a leading delimiter yields empty front matter and
    /// the whole content as body.
    pub fn parse(content: &str) -> Result<Self> {
        let Some((header, body)) = split_front_matter(content) else {
            return Ok(Self {
                front: FrontMatter::default(),
                body: content.to_string(),
            });
        };

        let value: Value = if header.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml_ng::from_str(header).context("invalid front matter")?
        };

        Ok(Self {
            front: FrontMatter(value),
            body: body.to_string(),
        })
    }

    /// Read and parse a file from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content)
    }
}

/// Split content at the front-matter delimiters.
///
/// Returns `(header, body)` when content starts with a `---` line and a
/// closing `---` line exists, `None` otherwise.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix(DELIMITER)?;
    // Delimiter must occupy the whole first line
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    for (idx, line) in line_spans(rest) {
        if line.trim_end_matches('\r') == DELIMITER {
            let header = &rest[..idx];
            let body_start = idx + line.len();
            let body = rest[body_start..]
                .strip_prefix('\n')
                .unwrap_or(&rest[body_start..]);
            return Some((header, body));
        }
    }
    None
}

/// Iterate lines with their byte offsets, newline excluded.
fn line_spans(s: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    s.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        (start, raw.trim_end_matches('\n'))
    })
}

/// Check whether a file on disk begins with the front-matter delimiter.
///
/// Reads only the first three bytes; used to tell rendered pages from
/// static files without loading them.
pub fn has_front_matter(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut buf = [0u8; 3];
    file.read_exact(&mut buf).is_ok() && &buf == DELIMITER.as_bytes()
}

impl FrontMatter {
    /// String value for a key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Declared layout name, if any.
    pub fn layout(&self) -> Option<&str> {
        self.get_str("layout")
    }

    /// Publish flag; absent means published.
    pub fn published(&self) -> bool {
        self.0
            .get("published")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Date override from front matter, `YYYY-MM-DD` or
    /// `YYYY-MM-DD HH:MM:SS`.
    pub fn date(&self) -> Option<NaiveDateTime> {
        let raw = self.get_str("date")?;
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }

    /// String-or-sequence value for a key: `tags: a` and `tags: [a, b]`
    /// both work.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::String(s)) => s
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            Some(Value::Sequence(seq)) => seq
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The raw mapping, serialized for the render payload.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// Tests
// ============================================================================
