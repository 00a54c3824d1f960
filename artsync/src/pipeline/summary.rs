//! Per-run and per-build bookkeeping.
//!
//! Counters accumulate incrementally as outcomes land because builds finish
//! concurrently; nothing is recomputed from scratch. The run report also
//! carries the discovery cursor for the next run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Live counters of one build within a run.
#[derive(Debug, Default)]
pub struct BuildStats {
    build_id: String,
    timestamp: Option<DateTime<Utc>>,
    total: AtomicU64,
    filtered: AtomicU64,
    cached: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
}

impl BuildStats {
    /// Creates counters for one build.
    #[must_use]
    pub fn new(build_id: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            build_id: build_id.into(),
            timestamp,
            ..Self::default()
        }
    }

    /// Build id the counters belong to.
    #[must_use]
    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// End time of the build, when known.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Adds discovered artifacts.
    pub fn inc_total(&self, amount: u64) {
        self.total.fetch_add(amount, Ordering::Relaxed);
    }

    /// Counts artifacts denied by policy filters.
    pub fn inc_filtered(&self, amount: u64) {
        self.filtered.fetch_add(amount, Ordering::Relaxed);
    }

    /// Counts an artifact skipped as already processed.
    pub fn inc_cached(&self) {
        self.cached.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts successful outcomes.
    pub fn inc_successes(&self, amount: u64) {
        self.successes.fetch_add(amount, Ordering::Relaxed);
    }

    /// Counts failed outcomes.
    pub fn inc_errors(&self, amount: u64) {
        self.errors.fetch_add(amount, Ordering::Relaxed);
    }

    /// Immutable snapshot of the counters.
    #[must_use]
    pub fn report(&self) -> BuildReport {
        BuildReport {
            build_id: self.build_id.clone(),
            timestamp: self.timestamp,
            total: self.total.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one build's counters, persisted with the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Build id.
    pub build_id: String,
    /// End time of the build, when known.
    pub timestamp: Option<DateTime<Utc>>,
    /// Artifacts discovered.
    pub total: u64,
    /// Artifacts denied by policy filters.
    pub filtered: u64,
    /// Artifacts skipped as already processed.
    pub cached: u64,
    /// Successful outcomes.
    pub successes: u64,
    /// Failed outcomes.
    pub errors: u64,
}

/// Snapshot of one run, persisted as the job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run id.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished, once it has.
    pub finished_at: Option<DateTime<Utc>>,
    /// Discovery cursor for the next run.
    pub last_processed: Option<DateTime<Utc>>,
    /// Aggregated artifact count.
    pub total: u64,
    /// Aggregated filtered count.
    pub filtered: u64,
    /// Aggregated cached count.
    pub cached: u64,
    /// Aggregated success count.
    pub successes: u64,
    /// Aggregated error count.
    pub errors: u64,
    /// Per-build snapshots.
    pub builds: Vec<BuildReport>,
}

/// Accumulator of one run's statistics across concurrent builds.
#[derive(Debug)]
pub struct RunSummary {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    builds: DashMap<String, Arc<BuildStats>>,
}

impl RunSummary {
    /// Starts a new run record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            builds: DashMap::new(),
        }
    }

    /// Run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Registers a build, returning its counters.
    pub fn register_build(
        &self,
        build_id: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Arc<BuildStats> {
        self.builds
            .entry(build_id.to_string())
            .or_insert_with(|| Arc::new(BuildStats::new(build_id, timestamp)))
            .clone()
    }

    /// Counters of a registered build.
    #[must_use]
    pub fn stats_for(&self, build_id: &str) -> Option<Arc<BuildStats>> {
        self.builds.get(build_id).map(|entry| entry.clone())
    }

    /// Snapshots every build, ordered by build id for determinism.
    #[must_use]
    pub fn build_reports(&self) -> Vec<BuildReport> {
        let mut reports: Vec<BuildReport> = self
            .builds
            .iter()
            .map(|entry| entry.value().report())
            .collect();
        reports.sort_by(|a, b| a.build_id.cmp(&b.build_id));
        reports
    }

    /// Final run snapshot.
    #[must_use]
    pub fn report(
        &self,
        finished_at: Option<DateTime<Utc>>,
        last_processed: Option<DateTime<Utc>>,
    ) -> RunReport {
        let builds = self.build_reports();
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at,
            last_processed,
            total: builds.iter().map(|b| b.total).sum(),
            filtered: builds.iter().map(|b| b.filtered).sum(),
            cached: builds.iter().map(|b| b.cached).sum(),
            successes: builds.iter().map(|b| b.successes).sum(),
            errors: builds.iter().map(|b| b.errors).sum(),
            builds,
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Advances the discovery cursor to the newest end time among builds that
/// produced at least one success (builds with nothing but errors would be
/// lost to the next run otherwise). The cursor never regresses: the
/// previous value stays when it is newer.
#[must_use]
pub fn advance_cursor(
    previous: Option<DateTime<Utc>>,
    builds: &[BuildReport],
) -> Option<DateTime<Utc>> {
    builds
        .iter()
        .filter(|build| !(build.successes == 0 && build.errors != 0))
        .filter_map(|build| build.timestamp)
        .chain(previous)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).single().expect("valid time")
    }

    fn report(build_id: &str, hour: u32, successes: u64, errors: u64) -> BuildReport {
        BuildReport {
            build_id: build_id.to_string(),
            timestamp: Some(ts(hour)),
            total: successes + errors,
            filtered: 0,
            cached: 0,
            successes,
            errors,
        }
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = BuildStats::new("B-1", Some(ts(9)));
        stats.inc_total(5);
        stats.inc_cached();
        stats.inc_successes(3);
        stats.inc_errors(1);

        let snapshot = stats.report();
        assert_eq!(snapshot.total, 5);
        assert_eq!(snapshot.cached, 1);
        assert_eq!(snapshot.successes, 3);
        assert_eq!(snapshot.errors, 1);
    }

    #[test]
    fn test_run_report_aggregates_builds() {
        let summary = RunSummary::new();
        summary.register_build("B-1", Some(ts(9))).inc_successes(2);
        summary.register_build("B-2", Some(ts(10))).inc_errors(1);
        // registering again returns the same counters
        summary.register_build("B-1", Some(ts(9))).inc_successes(1);

        let report = summary.report(Some(ts(11)), None);
        assert_eq!(report.successes, 3);
        assert_eq!(report.errors, 1);
        assert_eq!(report.builds.len(), 2);
        assert_eq!(report.builds[0].build_id, "B-1");
    }

    #[test]
    fn test_cursor_advances_to_latest_successful_build() {
        let cursor = advance_cursor(
            None,
            &[
                report("B-1", 9, 3, 0),
                report("B-2", 11, 1, 2),
                report("B-3", 12, 0, 4),
            ],
        );
        // B-3 failed outright and must stay visible to the next run
        assert_eq!(cursor, Some(ts(11)));
    }

    #[test]
    fn test_cursor_never_regresses() {
        let cursor = advance_cursor(Some(ts(15)), &[report("B-1", 9, 3, 0)]);
        assert_eq!(cursor, Some(ts(15)));
    }

    #[test]
    fn test_cursor_counts_fully_cached_builds() {
        // zero successes with zero errors means everything was cached or
        // filtered; the build is done and may advance the cursor
        let cursor = advance_cursor(None, &[report("B-1", 9, 0, 0)]);
        assert_eq!(cursor, Some(ts(9)));
    }
}
