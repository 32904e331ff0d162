//! Line-oriented reader for cross-section files

use crate::types::Result;
use std::io::BufRead;

/// Sequential line reader with 1-based line numbers.
///
/// There is no seek-back: a line handed out is gone unless the caller keeps
/// it.
pub struct LineSource<R> {
    reader: R,
    line_number: usize,
    buf: String,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buf: String::with_capacity(256),
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Returns `Ok(None)` at end of file.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        let line = self.buf.trim_end_matches(|c| c == '\n' || c == '\r');
        Ok(Some(line.to_string()))
    }

    /// Number of the line most recently returned
    #[inline]
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Split a line on whitespace, keeping a double-quoted run as one token
/// (quotes included).
pub fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = line.trim_start();

    while !rest.is_empty() {
        let end = if let Some(quoted) = rest.strip_prefix('"') {
            match quoted.find('"') {
                Some(pos) => pos + 2,
                None => rest.len(),
            }
        } else {
            rest.find(char::is_whitespace).unwrap_or(rest.len())
        };
        tokens.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }

    tokens
}

/// Remove a leading and a trailing double quote, each if present
pub fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value).trim()
}

/// Extract the value token of a directive line.
///
/// With `short_prefix` the value is the second token (`-width 5mils`),
/// otherwise the third (`set CSEG 10`). Surrounding quotes are stripped.
/// Returns `None` when the line is too short.
pub fn extract_value(line: &str, short_prefix: bool) -> Option<String> {
    let index = if short_prefix { 1 } else { 2 };
    tokenize(line)
        .get(index)
        .map(|token| strip_quotes(token).to_string())
}

/// Whether an attribute line continues on the next line
#[inline]
pub fn is_continued(line: &str) -> bool {
    line.trim_end().ends_with('\\')
}
