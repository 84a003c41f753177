// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions, so
//! scripts and process supervisors can distinguish a configuration problem
//! (do not restart) from an I/O problem (restart may help).

use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64)
    UsageError = 64,

    /// Data format error (65): malformed input or mapping
    DataError = 65,

    /// Cannot open input (66): source object or file missing
    NoInput = 66,

    /// Internal software error (70)
    Software = 70,

    /// I/O error (74)
    IoError = 74,

    /// Configuration error (78): missing bucket, bad settings
    ConfigError = 78,
}

impl ExitCode {
    /// The raw process exit code
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps a domain error category to an exit code.
    ///
    /// Categories are the stable strings from `IngestError::category`; an
    /// unknown category is a general error.
    pub fn from_error_category(category: &str) -> Self {
        match category {
            "configuration" => ExitCode::ConfigError,
            "validation" | "parse" | "chunk" => ExitCode::DataError,
            "not-found" => ExitCode::NoInput,
            "io" | "database" | "timeout" => ExitCode::IoError,
            "internal" => ExitCode::Software,
            _ => ExitCode::Error,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}
