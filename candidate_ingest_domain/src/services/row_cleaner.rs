// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Row Cleaner / Validator
//!
//! Per-row normalization and the acceptance predicate. Every mapped row
//! passes through here before it is batched for insertion.
//!
//! ## Cleaning rules
//!
//! 1. `phone` keeps only `[0-9+]` and must then match `^\+?[0-9]{7,15}$`,
//!    otherwise it is dropped
//! 2. `email` must match a lenient `local@domain.tld` shape, otherwise
//!    dropped
//! 3. `linkedin_url` gets `https://` prepended when it lacks a scheme
//! 4. every text field is trimmed and internal whitespace collapses to
//!    single spaces
//! 5. salvage heuristics (optional, see below) repair rows whose columns
//!    were shifted or merged by sloppy exports
//! 6. `full_name` is clamped to 100 characters and dropped entirely below
//!    2 characters
//!
//! ## Acceptance
//!
//! A row is accepted iff at least one contact channel (`email`, `phone`,
//! `linkedin_url`) is non-empty after cleaning. Everything else is a
//! rejected row: counted and dropped, never inserted.
//!
//! ## Salvage heuristics
//!
//! The swap rules are order-sensitive and deliberately conservative; each
//! fires only when its preconditions hold. They are gated behind
//! [`CleanerConfig::salvage_enabled`] so the pipeline can run strict when
//! deterministic field placement matters (tests, reprocessing audits).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entities::Candidate;
use crate::value_objects::CandidateField;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone pattern is valid"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

static MISPLACED_SUMMARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)experience|professional|skills").expect("pattern is valid"));

static LOCATION_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)city|state|country|,").expect("pattern is valid"));

static TITLE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)engineer|developer|manager").expect("pattern is valid"));

/// Maximum kept length of `full_name`, in characters
const MAX_FULL_NAME_CHARS: usize = 100;

/// Minimum length of a plausible `full_name`, in characters
const MIN_FULL_NAME_CHARS: usize = 2;

/// Cleaner configuration.
#[derive(Debug, Clone, Copy)]
pub struct CleanerConfig {
    /// Enables the field-swap salvage heuristics
    pub salvage_enabled: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self { salvage_enabled: true }
    }
}

impl CleanerConfig {
    /// Strict mode: normalization and validation only, no salvage
    pub fn strict() -> Self {
        Self { salvage_enabled: false }
    }
}

/// Outcome of cleaning one row.
#[derive(Debug, Clone)]
pub enum CleanOutcome {
    /// The row passed the acceptance predicate
    Accepted(Candidate),
    /// No contact channel survived cleaning; the row is dropped
    Rejected,
}

impl CleanOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CleanOutcome::Accepted(_))
    }
}

/// Per-row normalization and acceptance.
#[derive(Debug, Clone, Default)]
pub struct RowCleaner {
    config: CleanerConfig,
}

impl RowCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    /// Cleans one mapped row and applies the acceptance predicate.
    pub fn clean(&self, mut candidate: Candidate) -> CleanOutcome {
        // Rule 4 first: every later rule sees whitespace-normalized text
        for field in CandidateField::ALL {
            let collapsed = collapse_whitespace(candidate.field(field));
            candidate.set_field(field, collapsed);
        }

        candidate.phone = clean_phone(&candidate.phone);
        candidate.email = clean_email(&candidate.email);
        candidate.linkedin_url = clean_linkedin_url(&candidate.linkedin_url);

        if self.config.salvage_enabled {
            apply_salvage(&mut candidate);
        }

        candidate.full_name = clean_full_name(&candidate.full_name);

        if candidate.has_contact_info() {
            CleanOutcome::Accepted(candidate)
        } else {
            CleanOutcome::Rejected
        }
    }
}

/// Trims and collapses internal whitespace runs to single spaces.
fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips everything outside `[0-9+]`, then validates the shape.
fn clean_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    if PHONE_RE.is_match(&digits) {
        digits
    } else {
        String::new()
    }
}

fn clean_email(raw: &str) -> String {
    let trimmed = raw.trim();
    if EMAIL_RE.is_match(trimmed) {
        trimmed.to_string()
    } else {
        String::new()
    }
}

/// Prepends `https://` to scheme-less profile URLs.
fn clean_linkedin_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Clamps to 100 characters and drops implausibly short names.
fn clean_full_name(raw: &str) -> String {
    if raw.chars().count() < MIN_FULL_NAME_CHARS {
        return String::new();
    }
    raw.chars().take(MAX_FULL_NAME_CHARS).collect()
}

/// Order-sensitive repair of shifted or merged columns.
fn apply_salvage(candidate: &mut Candidate) {
    // A paragraph in the name column is usually the summary
    if candidate.full_name.chars().count() > 50
        && MISPLACED_SUMMARY_RE.is_match(&candidate.full_name)
        && candidate.summary.len() < candidate.full_name.len()
    {
        std::mem::swap(&mut candidate.full_name, &mut candidate.summary);
    }

    // Location text in the title column
    if !candidate.job_title.is_empty()
        && LOCATION_TOKEN_RE.is_match(&candidate.job_title)
        && candidate.location.is_empty()
    {
        candidate.location = std::mem::take(&mut candidate.job_title);
    }

    // A title hiding in an overlong skills column
    if candidate.skills.len() > 100
        && TITLE_TOKEN_RE.is_match(&candidate.skills)
        && candidate.job_title.is_empty()
    {
        candidate.job_title = std::mem::take(&mut candidate.skills);
    }
}
