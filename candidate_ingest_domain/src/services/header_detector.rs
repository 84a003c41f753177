// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Delimiter & Header Detector
//!
//! Determines, from the first kilobytes of an assembled source object,
//! where the header row is and which delimiter the file uses, then decodes
//! the header array. The result is persisted on the job so processing is
//! reproducible even if detection logic changes later.
//!
//! ## Algorithm
//!
//! 1. Split the prefix into at most 20 physical lines (BOM stripped,
//!    CR trimmed)
//! 2. When the caller supplies expected header names (the user's mapping
//!    values), the header row is the lowest-indexed line containing any of
//!    them as a substring; files with garbage preambles above the real
//!    header are found this way. No match falls back to line 0, flagged so
//!    the caller can warn.
//! 3. The delimiter is counted on the chosen line with double-quoted
//!    regions stripped: tab wins when tabs are at least 1.5 times the
//!    commas, otherwise comma.
//! 4. The line is tokenized with the quote-aware tokenizer; empty header
//!    positions are named `Column_{n}` (1-based) so every column stays
//!    addressable.

use serde::{Deserialize, Serialize};

use crate::services::row_parser::{tokenize_line, Delimiter};
use crate::IngestError;

/// How many lines of the prefix are scanned for the header row
pub const HEADER_SCAN_LINES: usize = 20;

/// How many bytes callers should read to cover the scan window
pub const HEADER_SCAN_BYTES: u64 = 64 * 1024;

/// Result of header detection, persisted on the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDetection {
    /// 0-based physical line index of the header row
    pub header_row_index: u64,
    pub delimiter: Delimiter,
    pub headers: Vec<String>,
    /// False when expected headers were given but none matched and the
    /// detector fell back to line 0; callers should surface a warning
    pub matched_expected_header: bool,
}

/// Detects the header row, delimiter, and header array from a prefix of
/// the source object.
///
/// `expected_headers` are the non-empty values of the user's mapping; pass
/// an empty slice when no mapping is known yet (the first-chunk-complete
/// path), which makes line 0 the header row.
pub fn detect(prefix: &[u8], expected_headers: &[&str]) -> Result<HeaderDetection, IngestError> {
    let lines = prefix_lines(prefix);
    if lines.is_empty() {
        return Err(IngestError::parse_error(
            "Source object is empty; no header row to detect",
        ));
    }

    let (header_row_index, matched) = locate_header_row(&lines, expected_headers);
    let header_line = lines
        .get(header_row_index)
        .copied()
        .unwrap_or_default();

    let delimiter = detect_delimiter(header_line);

    let mut headers = tokenize_line(header_line, delimiter);
    if headers.is_empty() {
        return Err(IngestError::parse_error(format!(
            "Header row {} is blank",
            header_row_index
        )));
    }
    for (idx, header) in headers.iter_mut().enumerate() {
        if header.is_empty() {
            *header = format!("Column_{}", idx + 1);
        }
    }

    Ok(HeaderDetection {
        header_row_index: header_row_index as u64,
        delimiter,
        headers,
        matched_expected_header: matched,
    })
}

/// Splits the prefix into at most [`HEADER_SCAN_LINES`] lines.
fn prefix_lines(prefix: &[u8]) -> Vec<&str> {
    let body = prefix.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(prefix);
    let text = std::str::from_utf8(body).unwrap_or_else(|e| {
        // Cut at the last whole UTF-8 boundary; the tail belongs to data
        // beyond the scan window
        std::str::from_utf8(&body[..e.valid_up_to()]).unwrap_or("")
    });
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .take(HEADER_SCAN_LINES)
        .collect()
}

/// Finds the lowest-indexed line containing any expected header as a
/// substring. Returns `(0, false)` when nothing matches.
fn locate_header_row(lines: &[&str], expected_headers: &[&str]) -> (usize, bool) {
    let expected: Vec<&str> = expected_headers
        .iter()
        .copied()
        .filter(|h| !h.trim().is_empty())
        .collect();
    if expected.is_empty() {
        return (0, true);
    }
    for (idx, line) in lines.iter().enumerate() {
        // A quoted occurrence also contains the raw value as a substring,
        // so one check covers both forms
        if expected.iter().any(|h| line.contains(h)) {
            return (idx, true);
        }
    }
    (0, false)
}

/// Counts tabs and commas outside double-quoted regions and applies the
/// 1.5x rule.
fn detect_delimiter(line: &str) -> Delimiter {
    let mut in_quotes = false;
    let mut tabs = 0u32;
    let mut commas = 0u32;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\t' if !in_quotes => tabs += 1,
            ',' if !in_quotes => commas += 1,
            _ => {}
        }
    }
    if tabs >= 1 && tabs as f64 >= 1.5 * commas as f64 {
        Delimiter::Tab
    } else {
        Delimiter::Comma
    }
}
