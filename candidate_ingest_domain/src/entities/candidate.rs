// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Candidate Record
//!
//! The destination record written to the datastore: fifteen canonical text
//! fields plus provenance. All fields are strings and the empty string
//! denotes absence, matching the documents existing clients query.
//!
//! Records are created only by the ingestion orchestrator and are never
//! mutated by the core afterwards. Uniqueness is not enforced here;
//! duplicate inserts are tolerated by the datastore contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{CandidateField, JobId, StorageKey};

/// One cleaned, accepted candidate row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub industry: String,
    pub job_title: String,
    pub skills: String,
    pub experience: String,
    pub country: String,
    pub locality: String,
    pub location: String,
    pub linkedin_url: String,
    pub github_url: String,
    pub birth_year: String,
    pub summary: String,
    /// Storage key of the assembled source object
    pub source_file: String,
    /// Job that produced this record
    pub upload_job_id: Option<JobId>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Creates an empty record with provenance stamped
    pub fn with_provenance(source: &StorageKey, job_id: JobId) -> Self {
        Self {
            source_file: source.to_string(),
            upload_job_id: Some(job_id),
            is_deleted: false,
            created_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Reads a canonical field by name
    pub fn field(&self, field: CandidateField) -> &str {
        match field {
            CandidateField::FullName => &self.full_name,
            CandidateField::Email => &self.email,
            CandidateField::Phone => &self.phone,
            CandidateField::Company => &self.company,
            CandidateField::Industry => &self.industry,
            CandidateField::JobTitle => &self.job_title,
            CandidateField::Skills => &self.skills,
            CandidateField::Experience => &self.experience,
            CandidateField::Country => &self.country,
            CandidateField::Locality => &self.locality,
            CandidateField::Location => &self.location,
            CandidateField::LinkedinUrl => &self.linkedin_url,
            CandidateField::GithubUrl => &self.github_url,
            CandidateField::BirthYear => &self.birth_year,
            CandidateField::Summary => &self.summary,
        }
    }

    /// Writes a canonical field by name
    pub fn set_field(&mut self, field: CandidateField, value: String) {
        match field {
            CandidateField::FullName => self.full_name = value,
            CandidateField::Email => self.email = value,
            CandidateField::Phone => self.phone = value,
            CandidateField::Company => self.company = value,
            CandidateField::Industry => self.industry = value,
            CandidateField::JobTitle => self.job_title = value,
            CandidateField::Skills => self.skills = value,
            CandidateField::Experience => self.experience = value,
            CandidateField::Country => self.country = value,
            CandidateField::Locality => self.locality = value,
            CandidateField::Location => self.location = value,
            CandidateField::LinkedinUrl => self.linkedin_url = value,
            CandidateField::GithubUrl => self.github_url = value,
            CandidateField::BirthYear => self.birth_year = value,
            CandidateField::Summary => self.summary = value,
        }
    }

    /// True when at least one contact channel survived cleaning
    pub fn has_contact_info(&self) -> bool {
        !self.email.is_empty() || !self.phone.is_empty() || !self.linkedin_url.is_empty()
    }
}
