// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Job
//!
//! The aggregate root of the ingestion pipeline: one `UploadJob` per
//! uploaded file, carrying the immutable processing configuration (storage
//! key, mapping, stored headers, detected delimiter and header row) and the
//! mutable processing state (lifecycle, counters, timestamps).
//!
//! ## Lifecycle
//!
//! ```text
//! MappingPending ──> Processing ──> Completed
//!                        │  ▲  └──> Failed
//!                        ▼  │
//!                      Paused
//! ```
//!
//! `Completed` and `Failed` are terminal: counters freeze and further
//! progress updates are rejected. A resume re-opens a terminal or paused
//! job by moving it back to `Paused` with `resume_from` set, after which a
//! worker pickup transitions it to `Processing` again.
//!
//! ## Invariants
//!
//! - `rows_inserted + rows_rejected <= rows_seen` at all times
//! - counters are monotonically non-decreasing
//! - `stored_headers` is never empty once the job exists (jobs are created
//!   after header detection)
//! - at most one worker holds a job in `Processing`; that exclusion is
//!   enforced by the queue's per-key concurrency, not by this entity
//!
//! All transition methods return `IngestError::InvalidState` instead of
//! silently ignoring an illegal transition, so callers cannot corrupt the
//! lifecycle by accident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::row_parser::Delimiter;
use crate::value_objects::{FieldMapping, JobId, StorageKey};
use crate::IngestError;

/// Lifecycle state of an upload job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created with mapping and headers, waiting for worker pickup
    MappingPending,
    /// Exactly one worker owns it and is streaming the source
    Processing,
    /// Cooperatively paused; re-enqueueable
    Paused,
    /// Terminal: the whole source was processed
    Completed,
    /// Terminal: a fatal error stopped the stream
    Failed,
}

impl JobState {
    /// True for states whose counters are frozen
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Stable string form used in persistence and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::MappingPending => "mapping_pending",
            JobState::Processing => "processing",
            JobState::Paused => "paused",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Parses the stable string form
    pub fn from_str_value(s: &str) -> Result<Self, IngestError> {
        match s {
            "mapping_pending" => Ok(JobState::MappingPending),
            "processing" => Ok(JobState::Processing),
            "paused" => Ok(JobState::Paused),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(IngestError::validation_error(format!(
                "Unknown job state: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persistent record of one ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: JobId,
    pub user_id: String,
    pub storage_key: StorageKey,
    pub original_name: String,
    /// Destination field to source header choices, immutable for the job's life
    pub mapping: FieldMapping,
    /// Header array captured at mapping time; processing uses these, never a
    /// re-read of the file
    pub stored_headers: Vec<String>,
    /// 0-based line index of the header row in the source object
    pub header_row_index: u64,
    /// Field delimiter detected at mapping time
    pub delimiter: Delimiter,
    pub state: JobState,
    pub rows_seen: u64,
    pub rows_inserted: u64,
    pub rows_rejected: u64,
    /// Bytes of the source consumed so far, for percent progress
    pub bytes_processed: u64,
    /// Total source size when known at creation time
    pub source_size_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Data-row index to resume from after a pause or crash
    pub resume_from: Option<u64>,
    /// Cooperative pause signal, observed between batches
    pub pause_requested: bool,
}

impl UploadJob {
    /// Creates a new job in `MappingPending`.
    ///
    /// Jobs are only created after header detection succeeded, so the
    /// stored header array must be non-empty and the mapping keys have
    /// already been validated by `FieldMapping`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        storage_key: StorageKey,
        original_name: impl Into<String>,
        mapping: FieldMapping,
        stored_headers: Vec<String>,
        header_row_index: u64,
        delimiter: Delimiter,
    ) -> Result<Self, IngestError> {
        if stored_headers.is_empty() {
            return Err(IngestError::validation_error(
                "Cannot create a job without stored headers",
            ));
        }
        Ok(Self {
            id: JobId::new(),
            user_id: user_id.into(),
            storage_key,
            original_name: original_name.into(),
            mapping,
            stored_headers,
            header_row_index,
            delimiter,
            state: JobState::MappingPending,
            rows_seen: 0,
            rows_inserted: 0,
            rows_rejected: 0,
            bytes_processed: 0,
            source_size_bytes: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            resume_from: None,
            pause_requested: false,
        })
    }

    /// True once the job reached `Completed` or `Failed`
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Percent of the source consumed, when the total size is known
    pub fn progress_percent(&self) -> Option<u8> {
        let total = self.source_size_bytes?;
        if total == 0 {
            return Some(100);
        }
        let pct = (self.bytes_processed as f64 / total as f64) * 100.0;
        Some(pct.round().min(100.0) as u8)
    }

    /// Worker pickup: transition into `Processing`.
    ///
    /// Allowed from `MappingPending` (first run) and `Paused` (resume).
    /// Re-entry from `Processing` is also accepted: a crashed worker leaves
    /// the persisted state at `Processing`, and the queue's redelivery is
    /// the only path that reaches here for such a job.
    pub fn begin_processing(&mut self) -> Result<(), IngestError> {
        match self.state {
            JobState::MappingPending | JobState::Paused | JobState::Processing => {
                self.state = JobState::Processing;
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
                Ok(())
            }
            other => Err(IngestError::invalid_state(format!(
                "Cannot begin processing job {} in {} state",
                self.id, other
            ))),
        }
    }

    /// Normal end of stream: transition into `Completed` and freeze counters
    pub fn complete(&mut self) -> Result<(), IngestError> {
        if self.state != JobState::Processing {
            return Err(IngestError::invalid_state(format!(
                "Cannot complete job {} in {} state",
                self.id, self.state
            )));
        }
        self.state = JobState::Completed;
        self.completed_at = Some(Utc::now());
        self.pause_requested = false;
        self.resume_from = None;
        Ok(())
    }

    /// Fatal error: transition into `Failed`, preserving partial counters.
    ///
    /// Allowed from any non-terminal state; the source can already be
    /// missing at pickup, before `Processing` was entered.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), IngestError> {
        if self.is_terminal() {
            return Err(IngestError::invalid_state(format!(
                "Cannot fail job {} in terminal {} state",
                self.id, self.state
            )));
        }
        self.state = JobState::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.pause_requested = false;
        Ok(())
    }

    /// Cooperative pause taken by the orchestrator between batches.
    ///
    /// Persists the resume point so a later resume skips the rows already
    /// seen.
    pub fn pause(&mut self) -> Result<(), IngestError> {
        if self.state != JobState::Processing {
            return Err(IngestError::invalid_state(format!(
                "Cannot pause job {} in {} state",
                self.id, self.state
            )));
        }
        self.state = JobState::Paused;
        self.resume_from = Some(self.rows_seen);
        self.pause_requested = false;
        Ok(())
    }

    /// Requests a cooperative pause. Idempotent; a no-op on terminal jobs.
    pub fn request_pause(&mut self) {
        if !self.is_terminal() {
            self.pause_requested = true;
        }
    }

    /// Re-opens a paused or terminal job for another processing run.
    ///
    /// Counters are preserved; `resume_from` is set to the rows already
    /// seen so processing continues where it stopped. Duplicates in the
    /// tail of the last batch are accepted by design.
    pub fn prepare_resume(&mut self) -> Result<(), IngestError> {
        match self.state {
            JobState::Paused | JobState::Completed | JobState::Failed => {
                self.state = JobState::Paused;
                self.resume_from = Some(self.rows_seen);
                self.pause_requested = false;
                self.error = None;
                self.completed_at = None;
                Ok(())
            }
            other => Err(IngestError::invalid_state(format!(
                "Cannot resume job {} in {} state",
                self.id, other
            )))
        }
    }

    /// Records progress counters.
    ///
    /// Counters must not decrease and must satisfy
    /// `inserted + rejected <= seen`; terminal jobs reject updates so
    /// frozen counters stay frozen.
    pub fn record_progress(
        &mut self,
        rows_seen: u64,
        rows_inserted: u64,
        rows_rejected: u64,
        bytes_processed: u64,
    ) -> Result<(), IngestError> {
        if self.is_terminal() {
            return Err(IngestError::invalid_state(format!(
                "Counters of job {} are frozen in {} state",
                self.id, self.state
            )));
        }
        if rows_seen < self.rows_seen
            || rows_inserted < self.rows_inserted
            || rows_rejected < self.rows_rejected
        {
            return Err(IngestError::validation_error(format!(
                "Counters of job {} must not decrease",
                self.id
            )));
        }
        if rows_inserted + rows_rejected > rows_seen {
            return Err(IngestError::validation_error(format!(
                "Counter invariant violated for job {}: {} + {} > {}",
                self.id, rows_inserted, rows_rejected, rows_seen
            )));
        }
        self.rows_seen = rows_seen;
        self.rows_inserted = rows_inserted;
        self.rows_rejected = rows_rejected;
        self.bytes_processed = self.bytes_processed.max(bytes_processed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> UploadJob {
        UploadJob::new(
            "user1",
            StorageKey::parse("uploads/user1/1_test.csv").unwrap(),
            "test.csv",
            FieldMapping::from_pairs([("email", "Email")]).unwrap(),
            vec!["Name".to_string(), "Email".to_string()],
            0,
            Delimiter::Comma,
        )
        .unwrap()
    }

    #[test]
    fn test_new_job_starts_mapping_pending() {
        let job = job();
        assert_eq!(job.state, JobState::MappingPending);
        assert_eq!(job.rows_seen, 0);
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_new_job_requires_headers() {
        let result = UploadJob::new(
            "user1",
            StorageKey::parse("uploads/user1/1_test.csv").unwrap(),
            "test.csv",
            FieldMapping::new(),
            vec![],
            0,
            Delimiter::Comma,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_normal_lifecycle() {
        let mut job = job();
        job.begin_processing().unwrap();
        assert_eq!(job.state, JobState::Processing);
        assert!(job.started_at.is_some());

        job.record_progress(10, 8, 2, 100).unwrap();
        job.complete().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert!(job.completed_at.is_some());
        assert!(job.is_terminal());
    }

    #[test]
    fn test_cannot_complete_without_processing() {
        let mut job = job();
        assert!(job.complete().is_err());
    }

    #[test]
    fn test_terminal_counters_are_frozen() {
        let mut job = job();
        job.begin_processing().unwrap();
        job.record_progress(5, 5, 0, 50).unwrap();
        job.complete().unwrap();
        assert!(job.record_progress(6, 6, 0, 60).is_err());
        assert_eq!(job.rows_seen, 5);
    }

    #[test]
    fn test_counters_must_not_decrease() {
        let mut job = job();
        job.begin_processing().unwrap();
        job.record_progress(10, 8, 2, 100).unwrap();
        assert!(job.record_progress(9, 8, 1, 100).is_err());
    }

    #[test]
    fn test_counter_invariant_enforced() {
        let mut job = job();
        job.begin_processing().unwrap();
        assert!(job.record_progress(5, 4, 2, 0).is_err());
    }

    #[test]
    fn test_pause_records_resume_point() {
        let mut job = job();
        job.begin_processing().unwrap();
        job.record_progress(3000, 2500, 500, 1024).unwrap();
        job.request_pause();
        assert!(job.pause_requested);

        job.pause().unwrap();
        assert_eq!(job.state, JobState::Paused);
        assert_eq!(job.resume_from, Some(3000));
        assert!(!job.pause_requested);
    }

    #[test]
    fn test_resume_from_paused() {
        let mut job = job();
        job.begin_processing().unwrap();
        job.record_progress(100, 90, 10, 0).unwrap();
        job.pause().unwrap();

        job.prepare_resume().unwrap();
        assert_eq!(job.state, JobState::Paused);
        job.begin_processing().unwrap();
        assert_eq!(job.state, JobState::Processing);
        // Counters survive the round trip
        assert_eq!(job.rows_inserted, 90);
    }

    #[test]
    fn test_resume_reopens_failed_job() {
        let mut job = job();
        job.begin_processing().unwrap();
        job.record_progress(50, 40, 10, 0).unwrap();
        job.fail("datastore unreachable").unwrap();

        job.prepare_resume().unwrap();
        assert_eq!(job.state, JobState::Paused);
        assert_eq!(job.resume_from, Some(50));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_resume_rejected_while_processing() {
        let mut job = job();
        job.begin_processing().unwrap();
        assert!(job.prepare_resume().is_err());
    }

    #[test]
    fn test_request_pause_noop_on_terminal() {
        let mut job = job();
        job.begin_processing().unwrap();
        job.complete().unwrap();
        job.request_pause();
        assert!(!job.pause_requested);
    }

    #[test]
    fn test_fail_before_processing_allowed() {
        // Source can already be gone at pickup
        let mut job = job();
        job.fail("Source file not found").unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("Source file not found"));
    }

    #[test]
    fn test_progress_percent() {
        let mut job = job();
        job.source_size_bytes = Some(200);
        job.begin_processing().unwrap();
        job.record_progress(1, 1, 0, 50).unwrap();
        assert_eq!(job.progress_percent(), Some(25));
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in [
            JobState::MappingPending,
            JobState::Processing,
            JobState::Paused,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(JobState::from_str_value(state.as_str()).unwrap(), state);
        }
    }
}
