// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Field Mapping
//!
//! The canonical destination field set and the user-chosen mapping from
//! destination fields to source file headers.
//!
//! ## Overview
//!
//! A candidate record has a fixed set of fifteen destination fields. When a
//! user uploads a file they choose, per destination field, which source
//! column feeds it. That choice is captured as a `FieldMapping` and stored
//! immutably on the job, so reprocessing a job later sees exactly the
//! mapping it was created with.
//!
//! ## Resolution rules
//!
//! During processing each destination field resolves in order:
//!
//! 1. `mapping[field]` names a source header
//! 2. the named header is looked up case-insensitively among the stored
//!    headers
//! 3. absent either, the field is the empty string
//!
//! The header position lookup lives here so the orchestrator and the tests
//! share one implementation.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::IngestError;

/// The canonical destination fields of a candidate record.
///
/// The wire names (used in mappings and stored documents) are camelCase to
/// stay compatible with existing client payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CandidateField {
    #[serde(rename = "fullName")]
    FullName,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "phone")]
    Phone,
    #[serde(rename = "company")]
    Company,
    #[serde(rename = "industry")]
    Industry,
    #[serde(rename = "jobTitle")]
    JobTitle,
    #[serde(rename = "skills")]
    Skills,
    #[serde(rename = "experience")]
    Experience,
    #[serde(rename = "country")]
    Country,
    #[serde(rename = "locality")]
    Locality,
    #[serde(rename = "location")]
    Location,
    #[serde(rename = "linkedinUrl")]
    LinkedinUrl,
    #[serde(rename = "githubUrl")]
    GithubUrl,
    #[serde(rename = "birthYear")]
    BirthYear,
    #[serde(rename = "summary")]
    Summary,
}

impl CandidateField {
    /// Every destination field, in document order
    pub const ALL: [CandidateField; 15] = [
        CandidateField::FullName,
        CandidateField::Email,
        CandidateField::Phone,
        CandidateField::Company,
        CandidateField::Industry,
        CandidateField::JobTitle,
        CandidateField::Skills,
        CandidateField::Experience,
        CandidateField::Country,
        CandidateField::Locality,
        CandidateField::Location,
        CandidateField::LinkedinUrl,
        CandidateField::GithubUrl,
        CandidateField::BirthYear,
        CandidateField::Summary,
    ];

    /// Returns the wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateField::FullName => "fullName",
            CandidateField::Email => "email",
            CandidateField::Phone => "phone",
            CandidateField::Company => "company",
            CandidateField::Industry => "industry",
            CandidateField::JobTitle => "jobTitle",
            CandidateField::Skills => "skills",
            CandidateField::Experience => "experience",
            CandidateField::Country => "country",
            CandidateField::Locality => "locality",
            CandidateField::Location => "location",
            CandidateField::LinkedinUrl => "linkedinUrl",
            CandidateField::GithubUrl => "githubUrl",
            CandidateField::BirthYear => "birthYear",
            CandidateField::Summary => "summary",
        }
    }

    /// Parses a wire name into a field
    pub fn from_wire(name: &str) -> Result<Self, IngestError> {
        Self::ALL
            .iter()
            .find(|f| f.as_str() == name)
            .copied()
            .ok_or_else(|| {
                IngestError::validation_error(format!("Unknown destination field: {}", name))
            })
    }
}

impl Display for CandidateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-chosen mapping from destination fields to source header names.
///
/// Keys are always a subset of [`CandidateField::ALL`]; construction from
/// raw string pairs validates that invariant. Values are the header strings
/// exactly as the user declared them; matching against stored headers is
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct FieldMapping {
    entries: BTreeMap<CandidateField, String>,
}

impl FieldMapping {
    /// Creates an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping from raw `(destination, source header)` pairs.
    ///
    /// Unknown destination names are rejected; empty source headers are
    /// dropped (an empty value means "not mapped").
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries = BTreeMap::new();
        for (key, value) in pairs {
            let field = CandidateField::from_wire(key.as_ref())?;
            let value: String = value.into();
            if !value.trim().is_empty() {
                entries.insert(field, value);
            }
        }
        Ok(Self { entries })
    }

    /// Inserts or replaces one mapping entry
    pub fn set(&mut self, field: CandidateField, source_header: impl Into<String>) {
        self.entries.insert(field, source_header.into());
    }

    /// Returns the source header mapped to `field`, if any
    pub fn source_for(&self, field: CandidateField) -> Option<&str> {
        self.entries.get(&field).map(String::as_str)
    }

    /// Returns the non-empty mapping values, used by header detection as the
    /// expected header names
    pub fn expected_headers(&self) -> Vec<&str> {
        self.entries
            .values()
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .collect()
    }

    /// Number of mapped fields
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no field is mapped
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the position of `header` in `headers`, case-insensitively.
    pub fn position_of(headers: &[String], header: &str) -> Option<usize> {
        let wanted = header.trim().to_ascii_lowercase();
        headers
            .iter()
            .position(|h| h.trim().to_ascii_lowercase() == wanted)
    }

    /// Resolves the value of `field` from a parsed row.
    ///
    /// `headers` are the stored headers captured at mapping time; `values`
    /// is the row at matching positions. Returns the empty string when the
    /// field is unmapped, the header is absent, or the row is short.
    pub fn resolve<'a>(
        &self,
        field: CandidateField,
        headers: &[String],
        values: &'a [String],
    ) -> &'a str {
        self.source_for(field)
            .and_then(|header| Self::position_of(headers, header))
            .and_then(|idx| values.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl TryFrom<BTreeMap<String, String>> for FieldMapping {
    type Error = IngestError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::from_pairs(raw)
    }
}

impl From<FieldMapping> for BTreeMap<String, String> {
    fn from(mapping: FieldMapping) -> Self {
        mapping
            .entries
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect()
    }
}
