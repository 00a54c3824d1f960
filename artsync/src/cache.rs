//! Presence cache of already-mirrored artifact identifiers.
//!
//! Rebuilt from persisted history at startup and consulted before any
//! artifact is scheduled: an identifier that is already durably recorded as
//! successful is never uploaded again. The cache moves through an explicit
//! `Uninitialized -> Loading -> Ready` lifecycle and the scheduler must not
//! trigger a run before it reports ready, otherwise a half-loaded cache
//! would let duplicates through.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use async_trait::async_trait;
use dashmap::DashSet;
use tracing::info;

use crate::error::PersistError;

/// Lifecycle state of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No load attempted yet.
    Uninitialized,
    /// Bulk load from history in progress; reads are safe but incomplete.
    Loading,
    /// Fully loaded; the scheduler gate may open.
    Ready,
}

impl CacheState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Loading,
            2 => Self::Ready,
            _ => Self::Uninitialized,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Loading => 1,
            Self::Ready => 2,
        }
    }
}

/// Readiness probe payload of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Probe name.
    pub name: &'static str,
    /// Whether the cache finished loading.
    pub up: bool,
    /// Identifiers loaded from history.
    pub processed_items: u64,
}

/// Source of previously-successful identifiers, backed by the durable
/// result store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuccessHistory: Send + Sync {
    /// Number of successful identifiers on record.
    async fn count_successful(&self) -> Result<u64, PersistError>;

    /// One page of successful identifiers, zero-indexed.
    async fn successful_identifiers(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<String>, PersistError>;
}

/// Concurrent presence set of processed identifiers.
#[derive(Debug, Default)]
pub struct ProcessedCache {
    entries: DashSet<String>,
    state: AtomicU8,
    loaded: AtomicU64,
}

impl ProcessedCache {
    /// Creates an empty, uninitialized cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-loads the cache from persisted history.
    ///
    /// The page size shrinks as the total grows to bound the cost of a
    /// single query: everything in one page below 50k rows, a tenth of the
    /// count below 100k, a twentieth above. Concurrent readers are safe
    /// while the load runs; the cache only reports ready once the full
    /// history has been ingested. A failed load returns the cache to
    /// uninitialized.
    pub async fn initialize(&self, history: &dyn SuccessHistory) -> Result<(), PersistError> {
        self.state
            .store(CacheState::Loading.as_u8(), Ordering::SeqCst);

        let count = match history.count_successful().await {
            Ok(count) => count,
            Err(err) => {
                self.state
                    .store(CacheState::Uninitialized.as_u8(), Ordering::SeqCst);
                return Err(err);
            }
        };

        if count == 0 {
            info!("no identifiers found in history");
            self.loaded.store(0, Ordering::SeqCst);
            self.state.store(CacheState::Ready.as_u8(), Ordering::SeqCst);
            return Ok(());
        }

        let page_size = Self::page_size(count);
        info!(count, page_size, "loading processed identifiers");

        let mut page = 0;
        let mut ingested: u64 = 0;
        loop {
            let identifiers = match history.successful_identifiers(page, page_size).await {
                Ok(identifiers) => identifiers,
                Err(err) => {
                    self.state
                        .store(CacheState::Uninitialized.as_u8(), Ordering::SeqCst);
                    return Err(err);
                }
            };
            let fetched = identifiers.len();
            for identifier in identifiers {
                self.entries.insert(identifier);
            }
            ingested += fetched as u64;
            if fetched < page_size || ingested >= count {
                break;
            }
            page += 1;
        }

        self.loaded.store(ingested, Ordering::SeqCst);
        self.state.store(CacheState::Ready.as_u8(), Ordering::SeqCst);
        info!(ingested, "processed identifier cache ready");
        Ok(())
    }

    /// Page size for a bulk load of `count` rows.
    #[must_use]
    pub fn page_size(count: u64) -> usize {
        let size = if count < 50_000 {
            count
        } else if count < 100_000 {
            count / 10
        } else {
            count / 20
        };
        usize::try_from(size).unwrap_or(usize::MAX).max(1)
    }

    /// True when the identifier has no durable success on record yet.
    #[must_use]
    pub fn should_process(&self, identifier: &str) -> bool {
        !self.entries.contains(identifier)
    }

    /// Records a durably persisted success.
    ///
    /// Must only be called after the result store accepted the outcome;
    /// marking earlier would lose the artifact on a crash between upload
    /// and persistence.
    pub fn commit_processed(&self, identifier: &str) {
        self.entries.insert(identifier.to_string());
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CacheState {
        CacheState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True once the bulk load completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == CacheState::Ready
    }

    /// Number of identifiers currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no identifier is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Readiness probe payload.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        HealthReport {
            name: "cache initialization",
            up: self.is_ready(),
            processed_items: self.loaded.load(Ordering::SeqCst),
        }
    }
}
