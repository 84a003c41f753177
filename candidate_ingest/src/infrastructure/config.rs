// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ingestion Configuration
//!
//! Runtime configuration loaded from a TOML file with environment-variable
//! overrides (`CANDIDATE_INGEST_*`). Every tunable has a default; the one
//! setting without a usable default is the storage bucket, and a missing
//! bucket is a configuration-fatal error: the process refuses to start
//! rather than scatter objects into an unnamed location.
//!
//! ## Example configuration file
//!
//! ```toml
//! # candidate_ingest.toml
//! [storage]
//! bucket = "candidate-uploads"
//! root_dir = "/var/lib/candidate_ingest/objects"
//!
//! [database]
//! url = "sqlite:candidate_ingest.db"
//!
//! [queue]
//! poll_interval_ms = 500
//! max_attempts = 3
//! initial_backoff_ms = 2000
//! lease_secs = 600
//!
//! [processing]
//! batch_size = 2000
//! progress_interval_ms = 2000
//! batch_insert_timeout_secs = 30
//! salvage_enabled = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use candidate_ingest_domain::IngestError;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "CANDIDATE_INGEST";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    pub queue: QueueSettings,
    pub processing: ProcessingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Bucket name; mandatory, startup fails when empty
    pub bucket: String,
    /// Directory root of the filesystem object store
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub lease_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub batch_size: usize,
    pub progress_interval_ms: u64,
    pub batch_insert_timeout_secs: u64,
    pub salvage_enabled: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            root_dir: PathBuf::from("object_store"),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:candidate_ingest.db?mode=rwc".to_string(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_attempts: 3,
            initial_backoff_ms: 2_000,
            lease_secs: 600,
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            batch_size: 2_000,
            progress_interval_ms: 2_000,
            batch_insert_timeout_secs: 30,
            salvage_enabled: true,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            storage: StorageSettings::default(),
            database: DatabaseSettings::default(),
            queue: QueueSettings::default(),
            processing: ProcessingSettings::default(),
        }
    }
}

impl IngestConfig {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist, then applies environment overrides and
    /// validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                IngestError::invalid_config(format!("Failed to read config {:?}: {}", path, e))
            })?;
            let parsed: IngestConfig = toml::from_str(&content).map_err(|e| {
                IngestError::invalid_config(format!("Failed to parse config {:?}: {}", path, e))
            })?;
            debug!(path = ?path, "loaded configuration file");
            parsed
        } else {
            warn!(path = ?path, "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `CANDIDATE_INGEST_*` environment overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(bucket) = std::env::var(format!("{}_BUCKET", ENV_PREFIX)) {
            self.storage.bucket = bucket;
        }
        if let Ok(root) = std::env::var(format!("{}_STORAGE_ROOT", ENV_PREFIX)) {
            self.storage.root_dir = PathBuf::from(root);
        }
        if let Ok(url) = std::env::var(format!("{}_DATABASE_URL", ENV_PREFIX)) {
            self.database.url = url;
        }
        if let Ok(raw) = std::env::var(format!("{}_BATCH_SIZE", ENV_PREFIX)) {
            match raw.parse() {
                Ok(size) => self.processing.batch_size = size,
                Err(_) => warn!(value = %raw, "ignoring non-numeric batch size override"),
            }
        }
        if let Ok(raw) = std::env::var(format!("{}_SALVAGE_ENABLED", ENV_PREFIX)) {
            match raw.parse() {
                Ok(flag) => self.processing.salvage_enabled = flag,
                Err(_) => warn!(value = %raw, "ignoring non-boolean salvage override"),
            }
        }
    }

    /// Rejects configurations the pipeline cannot safely run with.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(IngestError::invalid_config(
                "storage.bucket must be set (or CANDIDATE_INGEST_BUCKET exported)",
            ));
        }
        if self.processing.batch_size == 0 {
            return Err(IngestError::invalid_config("processing.batch_size must be positive"));
        }
        if self.queue.max_attempts == 0 {
            return Err(IngestError::invalid_config("queue.max_attempts must be positive"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue.poll_interval_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.processing.progress_interval_ms)
    }

    pub fn batch_insert_timeout(&self) -> Duration {
        Duration::from_secs(self.processing.batch_insert_timeout_secs)
    }
}
