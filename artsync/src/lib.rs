//! # Artsync
//!
//! Mirrors build-produced artifacts (Maven, npm, generic-proxy packages)
//! from a build-record service and a binary-repository proxy into a cloud
//! artifact registry, with durable at-most-once delivery per artifact
//! across process restarts.
//!
//! The crate is the synchronization pipeline itself:
//!
//! - **Discovery**: merge upstream artifact rows with proxy tracking
//!   entries into uniquely-identified assets
//! - **Dedup**: a presence cache rebuilt from persisted history gates
//!   every artifact before it is scheduled
//! - **Grouping**: assets partition into version units and version-ordered
//!   project units
//! - **Publishing**: versions of one project run strictly in order with
//!   fail-fast skipping; different projects run concurrently under one
//!   permit budget, through a rate-limited retrying executor
//! - **Aggregation**: exactly one classified outcome per artifact, with a
//!   closed error taxonomy driving retry and escalation policy
//!
//! The upstream clients, the registry publisher and the durable store stay
//! behind the traits in [`remote`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use artsync::prelude::*;
//!
//! let cache = Arc::new(ProcessedCache::new());
//! cache.initialize(history.as_ref()).await?;
//!
//! let coordinator = Arc::new(SyncCoordinator::new(
//!     cache.clone(), builds, tracking, publisher, sink.clone(), config.clone(),
//! ));
//! let scheduler = SyncScheduler::new(coordinator, cache, sink, config.cron);
//! scheduler.try_trigger(&CancellationToken::new()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod checksum;
pub mod collector;
pub mod config;
pub mod error;
pub mod grouper;
pub mod limits;
pub mod model;
pub mod pipeline;
pub mod remote;
pub mod telemetry;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheState, ProcessedCache, SuccessHistory};
    pub use crate::collector::ArtifactCollector;
    pub use crate::config::{CronConfig, RepositoryMapping, ServiceConfig, SyncConfig};
    pub use crate::error::{Category, ErrorKind, FetchError, PersistError};
    pub use crate::grouper::{group, group_by_project, group_by_version};
    pub use crate::limits::{RateLimitConfig, RateLimiter, RetryPolicy, ThrottledExecutor};
    pub use crate::model::{
        Asset, AssetUpload, Coordinate, Ecosystem, Outcome, ProjectUnit, ResultSet,
        SourceRepository, UploadError, VersionUnit,
    };
    pub use crate::pipeline::{
        CancellationToken, RunReport, SyncCoordinator, SyncRunError, SyncScheduler,
        TriggerOutcome,
    };
    pub use crate::remote::{
        ArtifactRecord, BuildRef, BuildSource, DownloadReport, Publisher, ResultSink,
        TrackedEntry, TrackingSource,
    };
}
