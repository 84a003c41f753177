// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Row Parser
//!
//! Streaming, quote-aware tokenizer for delimiter-separated files. This is
//! a pure push parser: the caller feeds byte slices in stream order and
//! drains parsed records between feeds, so a multi-gigabyte source is
//! processed with memory bounded by one record plus one input slice.
//!
//! ## Behavior
//!
//! - **State machine**: `Field` / `Quoted` / `QuoteInQuoted`; the last state
//!   detects the `""` escape inside quoted fields
//! - **Record boundaries**: LF and CRLF terminate a record in `Field` state;
//!   neither terminates inside `Quoted`, so embedded newlines survive
//! - **BOM**: a UTF-8 byte order mark at stream start is stripped
//! - **Emission**: fields are trimmed of surrounding ASCII whitespace,
//!   surrounding double quotes are stripped, and `""` becomes `"`
//! - **Skipping**: `skip_leading_lines` discards the first N record
//!   boundaries, which is how the orchestrator skips past the header row
//!   and previously processed rows on resume
//! - **Headers**: an optional header array is attached to every emitted
//!   record for name-based access; assignment is positional
//!
//! The parser does not enforce a fixed arity. A record's length is the
//! number of structural delimiters plus one on that row; arity enforcement
//! belongs to the orchestrator, which counts and drops mismatching rows.
//!
//! A physical line that reduces to a single empty field (a blank line) is
//! not emitted, matching the treatment of the trailing newline at EOF.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::IngestError;

/// UTF-8 byte order mark
const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Upper bound for one field; a quote that never closes otherwise buffers
/// the rest of the stream
const MAX_FIELD_BYTES: usize = 1 << 20;

/// Field delimiter of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    /// The delimiter as a raw byte
    pub fn as_byte(&self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }

    /// Stable string form used in persistence and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Delimiter::Comma => "comma",
            Delimiter::Tab => "tab",
        }
    }

    /// Parses the stable string form
    pub fn from_str_value(s: &str) -> Result<Self, IngestError> {
        match s {
            "comma" => Ok(Delimiter::Comma),
            "tab" => Ok(Delimiter::Tab),
            other => Err(IngestError::validation_error(format!(
                "Unknown delimiter: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tokenizer configuration.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub delimiter: Delimiter,
    /// Discard the first N record boundaries before emitting anything
    pub skip_leading_lines: u64,
    /// Header names assigned to fields by position
    pub headers: Option<Vec<String>>,
}

impl ParserOptions {
    /// Options with no skipping and no headers
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            delimiter,
            skip_leading_lines: 0,
            headers: None,
        }
    }

    pub fn skip_leading_lines(mut self, n: u64) -> Self {
        self.skip_leading_lines = n;
        self
    }

    pub fn headers(mut self, headers: Vec<String>) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// One parsed record: the field values in source order, with optional
/// header names attached for positional name lookup.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub values: Vec<String>,
    headers: Option<Arc<Vec<String>>>,
}

impl ParsedRecord {
    /// Number of fields in this record
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Case-insensitive lookup of a field by header name
    pub fn get(&self, name: &str) -> Option<&str> {
        let headers = self.headers.as_ref()?;
        let wanted = name.trim().to_ascii_lowercase();
        let idx = headers
            .iter()
            .position(|h| h.trim().to_ascii_lowercase() == wanted)?;
        self.values.get(idx).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Outside quotes; delimiter and newline are structural
    Field,
    /// Inside a quoted region; everything is content
    Quoted,
    /// Saw a quote inside a quoted region; the next byte decides whether it
    /// was an escape or the closing quote
    QuoteInQuoted,
}

/// Streaming quote-aware tokenizer.
pub struct RowParser {
    delimiter: u8,
    state: ParseState,
    /// Raw bytes of the field being scanned, quotes included; quote
    /// stripping and unescaping happen on emission
    field: Vec<u8>,
    record: Vec<String>,
    skip_remaining: u64,
    headers: Option<Arc<Vec<String>>>,
    /// Bytes held back at stream start until the BOM question is settled
    start_pending: Vec<u8>,
    at_stream_start: bool,
    ready: VecDeque<ParsedRecord>,
}

impl RowParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            delimiter: options.delimiter.as_byte(),
            state: ParseState::Field,
            field: Vec::new(),
            record: Vec::new(),
            skip_remaining: options.skip_leading_lines,
            headers: options.headers.map(Arc::new),
            start_pending: Vec::new(),
            at_stream_start: true,
            ready: VecDeque::new(),
        }
    }

    /// Feeds the next bytes of the stream.
    ///
    /// Parsed records queue up internally; drain them with
    /// [`next_record`](Self::next_record) before feeding large amounts
    /// more.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), IngestError> {
        if self.at_stream_start {
            self.start_pending.extend_from_slice(bytes);
            if self.start_pending.len() < BOM.len() {
                return Ok(());
            }
            self.at_stream_start = false;
            let pending = std::mem::take(&mut self.start_pending);
            let body = if pending.starts_with(&BOM) {
                &pending[BOM.len()..]
            } else {
                &pending[..]
            };
            return self.scan(body);
        }
        self.scan(bytes)
    }

    /// Signals end of stream, flushing any trailing record without a final
    /// newline.
    pub fn finish(&mut self) -> Result<(), IngestError> {
        if self.at_stream_start {
            // Stream shorter than a BOM; whatever is pending is content
            self.at_stream_start = false;
            let pending = std::mem::take(&mut self.start_pending);
            let body = if pending.starts_with(&BOM) {
                &pending[BOM.len()..]
            } else {
                &pending[..]
            };
            self.scan(body)?;
        }
        if !self.field.is_empty() || !self.record.is_empty() {
            self.end_field();
            self.end_record();
        }
        Ok(())
    }

    /// Pops the next fully parsed record, if any
    pub fn next_record(&mut self) -> Option<ParsedRecord> {
        self.ready.pop_front()
    }

    /// Number of records parsed and not yet drained
    pub fn pending_records(&self) -> usize {
        self.ready.len()
    }

    fn scan(&mut self, bytes: &[u8]) -> Result<(), IngestError> {
        for &byte in bytes {
            match self.state {
                ParseState::Field => match byte {
                    b'"' if self.field.iter().all(u8::is_ascii_whitespace) => {
                        self.field.push(byte);
                        self.state = ParseState::Quoted;
                    }
                    b'\n' => {
                        self.end_field();
                        self.end_record();
                    }
                    b if b == self.delimiter => self.end_field(),
                    _ => self.push_field_byte(byte)?,
                },
                ParseState::Quoted => {
                    if byte == b'"' {
                        self.field.push(byte);
                        self.state = ParseState::QuoteInQuoted;
                    } else {
                        self.push_field_byte(byte)?;
                    }
                }
                ParseState::QuoteInQuoted => match byte {
                    b'"' => {
                        // Escaped quote; stay quoted
                        self.field.push(byte);
                        self.state = ParseState::Quoted;
                    }
                    b'\n' => {
                        self.state = ParseState::Field;
                        self.end_field();
                        self.end_record();
                    }
                    b if b == self.delimiter => {
                        self.state = ParseState::Field;
                        self.end_field();
                    }
                    _ => {
                        // Content after a closing quote; lenient parsers
                        // keep it verbatim
                        self.push_field_byte(byte)?;
                        self.state = ParseState::Field;
                    }
                },
            }
        }
        Ok(())
    }

    fn push_field_byte(&mut self, byte: u8) -> Result<(), IngestError> {
        if self.field.len() >= MAX_FIELD_BYTES {
            return Err(IngestError::parse_error(format!(
                "Field exceeds {} bytes; unterminated quote suspected",
                MAX_FIELD_BYTES
            )));
        }
        self.field.push(byte);
        Ok(())
    }

    fn end_field(&mut self) {
        let raw = std::mem::take(&mut self.field);
        self.record.push(clean_field(&raw));
    }

    fn end_record(&mut self) {
        let values = std::mem::take(&mut self.record);
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            return;
        }
        // Blank line: single empty field, nothing to emit
        if values.len() == 1 && values[0].is_empty() {
            return;
        }
        self.ready.push_back(ParsedRecord {
            values,
            headers: self.headers.clone(),
        });
    }
}

/// Decodes one raw field: lossy UTF-8, surrounding whitespace trimmed,
/// surrounding quotes stripped, `""` unescaped.
fn clean_field(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Tokenizes a single line, outside any stream context.
///
/// Used by header detection to decode the header row with the same quoting
/// rules the data rows get.
pub fn tokenize_line(line: &str, delimiter: Delimiter) -> Vec<String> {
    let mut parser = RowParser::new(ParserOptions::new(delimiter));
    // A line has no record terminator of its own
    let fed = parser.feed(line.as_bytes()).and_then(|_| parser.finish());
    if fed.is_err() {
        return Vec::new();
    }
    parser
        .next_record()
        .map(|r| r.values)
        .unwrap_or_default()
}
