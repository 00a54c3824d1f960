//! Interfaces of the external collaborators.
//!
//! The pipeline never talks HTTP or runs publisher tools itself; it drives
//! these traits. Implementations live outside this crate (REST clients,
//! SDK wrappers, subprocess runners) and are mocked in tests.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, PersistError};
use crate::model::{Asset, Ecosystem, ResultSet, SourceRepository, VersionUnit};
use crate::pipeline::{BuildReport, RunReport};

/// Reference to one upstream build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRef {
    /// Upstream build id.
    pub id: String,
    /// When the build finished; drives the discovery cursor.
    pub end_time: DateTime<Utc>,
}

/// Raw artifact row as returned by the build-record service, already
/// policy-filtered upstream (allowed repository types, deny patterns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Upstream record id.
    pub id: String,
    /// Ecosystem coordinate string.
    pub identifier: String,
    /// Filename as recorded upstream.
    pub filename: String,
    /// Path the file was deployed under on the proxy.
    pub deploy_path: String,
    /// Public download URL.
    pub public_url: String,
    /// File size in bytes.
    pub size: u64,
    /// MD5 digest, hex-encoded.
    pub md5: String,
    /// SHA-1 digest, hex-encoded.
    pub sha1: String,
    /// SHA-256 digest, hex-encoded.
    pub sha256: String,
    /// Ecosystem of the target repository.
    pub ecosystem: Ecosystem,
    /// Repository the file was served from.
    pub source_repository: SourceRepository,
    /// Build that produced the artifact, when known.
    pub origin_build_id: Option<String>,
}

/// One row of the proxy tracking report: an upload or download recorded
/// while the build ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntry {
    /// Path of the transfer below the store root.
    pub path: String,
    /// Name of the proxy store the transfer hit.
    pub store_key_name: String,
    /// Package type of the store.
    pub ecosystem: Ecosystem,
    /// Remote origin of the content, when proxied.
    pub origin_url: Option<String>,
    /// Local URL of the content on the proxy.
    pub local_url: Option<String>,
    /// SHA-256 digest of the content, hex-encoded.
    pub sha256: Option<String>,
}

/// Per-file result of downloading one version unit.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    /// Filenames that arrived intact.
    pub downloaded: Vec<String>,
    /// Transport failures, in occurrence order.
    pub failures: Vec<FetchError>,
}

impl DownloadReport {
    /// True when any file failed to download.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Build-record service: which builds exist and what they produced.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BuildSource: Send + Sync {
    /// Builds finished after `since`, oldest first, at most `limit`.
    async fn list_builds(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BuildRef>, FetchError>;

    /// Built and dependency artifacts of one build.
    async fn list_artifacts(&self, build_id: &str) -> Result<Vec<ArtifactRecord>, FetchError>;
}

/// Binary-repository proxy: tracking reports and content downloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackingSource: Send + Sync {
    /// Uploads and downloads recorded for one build.
    async fn tracking_report(&self, build_id: &str) -> Result<Vec<TrackedEntry>, FetchError>;

    /// Downloads every asset of the unit into `dest`.
    ///
    /// Implementations verify each file with
    /// [`crate::checksum::verify_file`] and report a mismatch as a
    /// corrupted-content failure instead of a downloaded file.
    async fn download_version(&self, unit: &VersionUnit, dest: &Path) -> DownloadReport;
}

/// Destination registry publisher.
///
/// `publish` must be idempotent-safe at unit granularity for
/// connection-level failures; the pipeline retries it on transient
/// outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes one version unit from `local_dir`, reporting one outcome
    /// per asset.
    async fn publish(
        &self,
        unit: &VersionUnit,
        local_dir: &Path,
        repo_url: &str,
        repo_id: &str,
    ) -> ResultSet;

    /// Endpoint URL of a destination repository for the given ecosystem.
    async fn repository_endpoint(
        &self,
        repository: &str,
        ecosystem: Ecosystem,
    ) -> Result<String, FetchError>;

    /// Filenames the destination holds for the asset's package version.
    async fn list_version_assets(
        &self,
        repository: &str,
        asset: &Asset,
    ) -> Result<Vec<String>, FetchError>;
}

/// Durable store of run and outcome records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persists one batch of results with its build and run bookkeeping.
    ///
    /// The dedup cache is only updated after this returns `Ok`.
    async fn persist(
        &self,
        results: &[ResultSet],
        builds: &[BuildReport],
        run: &RunReport,
    ) -> Result<(), PersistError>;

    /// Discovery cursor of the last finished run, when any.
    async fn last_processed_cursor(&self) -> Result<Option<DateTime<Utc>>, PersistError>;
}
