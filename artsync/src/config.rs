//! Configuration tree of the synchronization service.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::limits::{RateLimitConfig, RetryPolicy};
use crate::model::SourceRepository;

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    Semaphore::MAX_PERMITS
}

fn default_job_size() -> usize {
    200
}

fn default_batch_size() -> usize {
    20
}

fn default_schedule() -> String {
    "0 0 * * * ?".to_string()
}

/// Mapping from source repositories to destination registry repositories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryMapping {
    /// Source repository name to destination repository id.
    #[serde(default)]
    pub mappings: HashMap<String, String>,
    /// Create destination repositories for unmapped generic-proxy sources.
    #[serde(default)]
    pub generate_generic_repositories: bool,
}

impl RepositoryMapping {
    /// Destination repository for a source repository, when configured.
    #[must_use]
    pub fn map_to_registry(&self, source: &SourceRepository) -> Option<&str> {
        self.mappings.get(source.name()).map(String::as_str)
    }
}

/// Trigger configuration of the periodic upload job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    /// Cron expression of the trigger.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Builds fetched per run.
    #[serde(default = "default_job_size")]
    pub job_size: usize,
    /// Builds processed per batch within a run.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Start with the trigger paused.
    #[serde(default)]
    pub start_paused: bool,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            job_size: default_job_size(),
            batch_size: default_batch_size(),
            start_paused: false,
        }
    }
}

/// Rate-limit and retry settings of one remote service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, used in logs.
    #[serde(default)]
    pub service_name: String,
    /// Rate-limit window of the service.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Retry policy of the service.
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Top-level configuration of the synchronization pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root of the local working directories.
    pub download_root_dir: PathBuf,
    /// Delete version working directories after publishing.
    #[serde(default = "default_true")]
    pub clean_artifacts: bool,
    /// Rewrite download URLs to the configured proxy host.
    #[serde(default)]
    pub override_proxy_url: bool,
    /// How many version units may be in flight at once.
    ///
    /// Downloads, uploads and cleanups of one version stay grouped; the
    /// limit keeps the proxy from racing far ahead of the registry and
    /// filling the disk with pending downloads.
    #[serde(default = "default_concurrency")]
    pub pipeline_concurrency_limit: usize,
    /// Log and synthesize instead of publishing and persisting.
    #[serde(default)]
    pub dry_run: bool,
    /// Source-to-destination repository mapping.
    #[serde(default)]
    pub repositories: RepositoryMapping,
    /// Trigger settings.
    #[serde(default)]
    pub cron: CronConfig,
    /// Destination registry rate-limit and retry settings.
    #[serde(default)]
    pub registry: ServiceConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            download_root_dir: PathBuf::from("artsync-work"),
            clean_artifacts: true,
            override_proxy_url: false,
            pipeline_concurrency_limit: default_concurrency(),
            dry_run: false,
            repositories: RepositoryMapping::default(),
            cron: CronConfig::default(),
            registry: ServiceConfig::default(),
        }
    }
}
