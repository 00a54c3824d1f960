//! End-to-end orchestration of one synchronization run.
//!
//! Discovery, cache filtering and grouping produce ordered project units;
//! every project walks its versions strictly in order with fail-fast
//! skipping, while different projects run concurrently under one global
//! permit budget. Each version acquires a permit, downloads, publishes
//! through the rate-limited executor, and its aggregated outcomes flow to
//! the durable store before the dedup cache learns about them.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::cache::ProcessedCache;
use crate::collector::ArtifactCollector;
use crate::config::SyncConfig;
use crate::error::{ErrorKind, FetchError, LineBuffer, PersistError};
use crate::grouper;
use crate::limits::{LimitError, RateLimiter, ThrottledExecutor};
use crate::model::{
    AssetUpload, ProjectUnit, ResultSet, UnitError, UploadError, VersionUnit,
};
use crate::remote::{BuildRef, BuildSource, Publisher, ResultSink, TrackingSource};

use super::cancellation::CancellationToken;
use super::summary::{advance_cursor, RunReport, RunSummary};

/// Failure that aborts a whole run.
///
/// Per-artifact failures never surface here; they become classified
/// outcomes. These are the run-level faults: discovery unavailable,
/// inconsistent upstream data, or the durable store rejecting results.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncRunError {
    /// Listing candidate builds failed.
    #[error("build discovery failed: {0}")]
    Discovery(#[from] FetchError),

    /// Grouping hit inconsistent upstream data.
    #[error("grouping failed: {0}")]
    Grouping(#[from] UnitError),

    /// The durable store rejected a batch of results.
    #[error("persisting results failed: {0}")]
    Persist(#[from] PersistError),
}

/// Orchestrates discovery, grouping, bounded publishing and persistence.
pub struct SyncCoordinator {
    cache: Arc<ProcessedCache>,
    builds: Arc<dyn BuildSource>,
    tracking: Arc<dyn TrackingSource>,
    publisher: Arc<dyn Publisher>,
    sink: Arc<dyn ResultSink>,
    collector: ArtifactCollector,
    executor: ThrottledExecutor,
    permits: Arc<Semaphore>,
    config: SyncConfig,
}

impl SyncCoordinator {
    /// Wires a coordinator over its collaborators.
    #[must_use]
    pub fn new(
        cache: Arc<ProcessedCache>,
        builds: Arc<dyn BuildSource>,
        tracking: Arc<dyn TrackingSource>,
        publisher: Arc<dyn Publisher>,
        sink: Arc<dyn ResultSink>,
        config: SyncConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.registry.rate_limit.clone()));
        let executor = ThrottledExecutor::new(limiter, config.registry.retry.clone());
        let permits = Arc::new(Semaphore::new(
            config
                .pipeline_concurrency_limit
                .min(Semaphore::MAX_PERMITS),
        ));
        let collector = ArtifactCollector::new(Arc::clone(&builds), Arc::clone(&tracking));
        Self {
            cache,
            builds,
            tracking,
            publisher,
            sink,
            collector,
            executor,
            permits,
            config,
        }
    }

    /// Runs one synchronization pass over builds finished after `since`.
    ///
    /// Builds are fetched once and processed in batches; each batch runs
    /// discovery concurrently, publishes its project units, and hands its
    /// results to the durable store before the next batch starts.
    pub async fn process_builds(
        &self,
        since: DateTime<Utc>,
        limit: usize,
        batch_size: usize,
        token: &CancellationToken,
    ) -> Result<RunReport, SyncRunError> {
        let builds = self.builds.list_builds(since, limit).await?;
        info!(count = builds.len(), %since, "starting synchronization run");

        let summary = RunSummary::new();
        let batch_size = batch_size.max(1);
        for (index, batch) in builds.chunks(batch_size).enumerate() {
            if token.is_cancelled() {
                warn!(
                    reason = %token.reason().unwrap_or_default(),
                    "run cancelled, not scheduling further batches"
                );
                break;
            }
            let ids: Vec<&str> = batch.iter().map(|b| b.id.as_str()).collect();
            info!(batch = index, builds = ?ids, "processing batch");
            self.upload_builds(batch, &summary, token).await?;
        }

        let cursor = advance_cursor(None, &summary.build_reports());
        let report = summary.report(Some(Utc::now()), cursor);
        info!(
            run = %report.run_id,
            successes = report.successes,
            errors = report.errors,
            cached = report.cached,
            filtered = report.filtered,
            total = report.total,
            "run finished"
        );
        Ok(report)
    }

    /// Discovers, publishes and persists one batch of builds.
    async fn upload_builds(
        &self,
        batch: &[BuildRef],
        summary: &RunSummary,
        token: &CancellationToken,
    ) -> Result<(), SyncRunError> {
        let collected = join_all(batch.iter().map(|build| self.analyze_build(build, summary)));

        // assets must be unique across the whole batch
        let mut seen = HashSet::new();
        let mut assets = Vec::new();
        for asset in collected.await.into_iter().flatten() {
            if seen.insert(asset.identifier().to_string()) {
                assets.push(asset);
            }
        }

        let projects = grouper::group(assets)?;
        info!(projects = projects.len(), "grouped batch into projects");

        let done = AtomicUsize::new(0);
        let total = projects.len();
        let results: Vec<ResultSet> = join_all(projects.iter().map(|project| async {
            let sets = self.upload_project(project, token).await;
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % 100 == 0 {
                info!(finished, remaining = total - finished, "projects uploaded");
            }
            sets
        }))
        .await
        .into_iter()
        .flatten()
        .collect();

        for set in &results {
            for success in set.successes() {
                if let Some(stats) = summary.stats_for(success.asset.processing_build_id()) {
                    stats.inc_successes(1);
                }
            }
            for err in set.errors() {
                if let Some(stats) = summary.stats_for(err.asset.processing_build_id()) {
                    stats.inc_errors(1);
                }
            }
        }

        if self.config.dry_run {
            info!("dry run, skipping persistence");
            return Ok(());
        }

        let builds = summary.build_reports();
        let run = summary.report(None, advance_cursor(None, &builds));
        self.sink.persist(&results, &builds, &run).await?;

        // the cache learns a success only after it is durable; a crash
        // before this point re-uploads, it never loses an artifact
        for set in &results {
            for success in set.successes() {
                self.cache.commit_processed(success.asset.identifier());
            }
        }
        Ok(())
    }

    /// Collects one build's assets and filters already-processed ones.
    async fn analyze_build(
        &self,
        build: &BuildRef,
        summary: &RunSummary,
    ) -> Vec<crate::model::Asset> {
        let stats = summary.register_build(&build.id, Some(build.end_time));
        match self.collector.collect(&build.id).await {
            Ok(collection) => {
                stats.inc_total(collection.assets.len() as u64 + collection.filtered);
                stats.inc_filtered(collection.filtered);
                let mut kept = Vec::with_capacity(collection.assets.len());
                for asset in collection.assets {
                    if self.cache.should_process(asset.identifier()) {
                        kept.push(asset);
                    } else {
                        stats.inc_cached();
                    }
                }
                kept
            }
            Err(err) => {
                error!(build = %build.id, %err, "asset collection failed, skipping build");
                Vec::new()
            }
        }
    }

    /// Publishes the versions of one project strictly in order.
    ///
    /// A critical failure of one version skips every later version of the
    /// project: later versions are assumed to depend on earlier ones being
    /// complete at the destination. Cancellation skips the same way.
    async fn upload_project(
        &self,
        project: &ProjectUnit,
        token: &CancellationToken,
    ) -> Vec<ResultSet> {
        let project_dir = project.project_dir(&self.config.download_root_dir);
        let mut results = Vec::with_capacity(project.versions().len());
        let mut abort = false;

        for version in project.versions() {
            if abort || token.is_cancelled() {
                results.push(error_set(version, &ErrorKind::Skipped));
                continue;
            }

            let version_root = version.version_dir(&project_dir);
            let set = self.publish_version(version, &version_root).await;
            if set.have_critical_errors() {
                error!(
                    version = version.version_identifier(),
                    "critical failure, skipping remaining versions of the project"
                );
                abort = true;
            }
            results.push(set);
        }

        let successes: usize = results.iter().map(|set| set.successes().len()).sum();
        let errors: usize = results.iter().map(|set| set.errors().len()).sum();
        info!(project = %project, successes, errors, "project finished");
        if errors > 0 {
            let mut histogram = std::collections::BTreeMap::new();
            for err in results.iter().flat_map(ResultSet::errors) {
                *histogram.entry(err.kind.name()).or_insert(0_usize) += 1;
            }
            warn!(project = project.project_identifier(), errors = ?histogram, "project errors");
        }
        results
    }

    /// Publishes one version unit under the pipeline permit.
    async fn publish_version(&self, version: &VersionUnit, version_root: &Path) -> ResultSet {
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return error_set(
                    version,
                    &ErrorKind::UncaughtException {
                        message: "pipeline permits closed".to_string(),
                    },
                )
            }
        };

        let Some(repository) = self
            .config
            .repositories
            .map_to_registry(version.source_repository())
        else {
            return error_set(
                version,
                &ErrorKind::MissingRepositoryMapping {
                    repository: version.source_repository().name().to_string(),
                },
            );
        };
        let repository = repository.to_string();

        let repo_url = match self
            .publisher
            .repository_endpoint(&repository, version.ecosystem())
            .await
        {
            Ok(url) => url,
            Err(err) => return error_set(version, &err.classify()),
        };

        if let Err(err) = tokio::fs::create_dir_all(version_root).await {
            return error_set(
                version,
                &ErrorKind::UncaughtException {
                    message: format!("creating {}: {err}", version_root.display()),
                },
            );
        }

        let download = self.tracking.download_version(version, version_root).await;
        let set = if download.has_failures() {
            warn!(
                version = version.version_identifier(),
                failures = download.failures.len(),
                "download failed, unit not publishable"
            );
            ResultSet::from_failed_download(version.assets(), &download.downloaded, &download.failures)
        } else {
            let mut set = self
                .run_publish(version, version_root, &repo_url, &repository)
                .await
                .invalidate_on_critical_failure();
            self.verify_completeness(version, &mut set, &repo_url, &repository)
                .await;
            set
        };

        if self.config.clean_artifacts {
            if let Err(err) = tokio::fs::remove_dir_all(version_root).await {
                warn!(dir = %version_root.display(), %err, "working directory not removed");
            }
        }

        set
    }

    /// Drives the publisher through the rate-limited executor.
    async fn run_publish(
        &self,
        version: &VersionUnit,
        version_root: &Path,
        repo_url: &str,
        repository: &str,
    ) -> ResultSet {
        if self.config.dry_run {
            info!(
                version = version.version_identifier(),
                assets = %version.pretty_print(),
                "dry run, would publish"
            );
            let mut set = ResultSet::new();
            for asset in version.assets() {
                set.add_success(AssetUpload {
                    asset: asset.clone(),
                    deployed_url: format!("{repo_url}?"),
                    repository: repository.to_string(),
                    uploaded_at: Utc::now(),
                });
            }
            return set;
        }

        info!(
            version = version.version_identifier(),
            assets = version.assets().len(),
            "publishing"
        );

        // one permit per asset plus a fixed overhead for metadata calls
        let cost = u32::try_from(version.assets().len()).unwrap_or(u32::MAX).saturating_add(4);

        let publisher = Arc::clone(&self.publisher);
        let executor = self.executor.clone();
        let url = repo_url.to_string();
        let repo = repository.to_string();
        let outcome = self
            .executor
            .submit(
                cost,
                move || {
                    let publisher = Arc::clone(&publisher);
                    let executor = executor.clone();
                    let url = url.clone();
                    let repo = repo.clone();
                    async move {
                        let set = publisher.publish(version, version_root, &url, &repo).await;
                        if throttled(&set) {
                            warn!(version = version.version_identifier(), "registry throttled the upload");
                            executor.drain_window();
                        }
                        set
                    }
                },
                should_retry,
            )
            .await;

        match outcome {
            Ok(set) => set,
            Err(LimitError::AcquireTimeout) => error_set(version, &ErrorKind::RateLimitTimeout),
            Err(err @ LimitError::CostExceedsWindow { .. }) => error_set(
                version,
                &ErrorKind::UncaughtException {
                    message: err.to_string(),
                },
            ),
        }
    }

    /// Fills outcomes for assets the publisher never reported on, checking
    /// the destination listing before declaring an upload missing.
    async fn verify_completeness(
        &self,
        version: &VersionUnit,
        set: &mut ResultSet,
        repo_url: &str,
        repository: &str,
    ) {
        if version.assets().iter().all(|asset| set.contains(asset)) {
            return;
        }

        let listing = match self
            .publisher
            .list_version_assets(repository, &version.assets()[0])
            .await
        {
            Ok(listing) => listing,
            Err(err) => {
                error!(%err, "destination listing failed, treating unreported assets as missing");
                Vec::new()
            }
        };
        set.verify_completeness(
            version.assets(),
            &listing,
            repo_url,
            repository,
            &LineBuffer::default(),
        );
    }
}

/// True when the result shows the registry throttled the call.
fn throttled(set: &ResultSet) -> bool {
    set.errors()
        .iter()
        .any(|err| matches!(err.kind, ErrorKind::RateLimitExceeded))
}

/// Retry predicate of publish calls: throttling and broken connections are
/// worth another attempt, everything else surfaces.
fn should_retry(set: &ResultSet) -> bool {
    let retry = set.errors().iter().any(|err| {
        matches!(
            err.kind,
            ErrorKind::RateLimitExceeded | ErrorKind::ConnectionError { .. }
        )
    });
    if retry {
        warn!("retrying publish after transient registry failure");
    }
    retry
}

/// Result set assigning the same error kind to every asset of the unit.
fn error_set(version: &VersionUnit, kind: &ErrorKind) -> ResultSet {
    let mut set = ResultSet::new();
    for asset in version.assets() {
        set.add_error(UploadError::new(asset.clone(), kind.clone()));
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Asset, Checksums, Ecosystem, SourceRepository};

    fn maven_asset(identifier: &str) -> Asset {
        Asset::builder(Ecosystem::Maven, identifier)
            .with_filename("file.jar")
            .with_checksums(Checksums::default())
            .with_source_repository(SourceRepository {
                ecosystem: Ecosystem::Maven,
                identifier: "indy-maven".to_string(),
                repository_path: "/maven/build-1".to_string(),
            })
            .with_processing_build_id("B-1")
            .build()
            .expect("valid identifier")
    }

    #[test]
    fn test_error_set_covers_every_asset() {
        let unit = VersionUnit::new(vec![
            maven_asset("org.acme:app:jar:1.0"),
            maven_asset("org.acme:app:pom:1.0"),
        ])
        .expect("unit");
        let set = error_set(&unit, &ErrorKind::Skipped);
        assert_eq!(set.errors().len(), 2);
        assert!(set
            .errors()
            .iter()
            .all(|err| matches!(err.kind, ErrorKind::Skipped)));
    }

    #[test]
    fn test_retry_predicate_matches_transient_kinds() {
        let unit = VersionUnit::new(vec![maven_asset("org.acme:app:jar:1.0")]).expect("unit");
        assert!(should_retry(&error_set(&unit, &ErrorKind::RateLimitExceeded)));
        assert!(should_retry(&error_set(
            &unit,
            &ErrorKind::ConnectionError {
                message: "reset".to_string()
            }
        )));
        assert!(!should_retry(&error_set(&unit, &ErrorKind::QuotaExceeded)));
        assert!(!should_retry(&ResultSet::new()));
    }

    #[test]
    fn test_throttled_predicate() {
        let unit = VersionUnit::new(vec![maven_asset("org.acme:app:jar:1.0")]).expect("unit");
        assert!(throttled(&error_set(&unit, &ErrorKind::RateLimitExceeded)));
        assert!(!throttled(&error_set(&unit, &ErrorKind::Timeout)));
    }
}
