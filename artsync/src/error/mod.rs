//! Error taxonomy for the synchronization pipeline.
//!
//! Every failure observed while mirroring artifacts resolves to exactly one
//! [`ErrorKind`], and every kind maps to exactly one recovery [`Category`].
//! Transport-level failures of the upstream services are modelled separately
//! as [`FetchError`] and classified into kinds before they reach the result
//! aggregation layer.

mod classify;
mod fetch;
mod kinds;

pub use classify::{
    classify_http_status, LineBuffer, MavenLogClassifier, MavenLogEvent, NpmLogClassifier,
    NpmLogEvent, LOG_CONTEXT_LINES,
};
pub use fetch::{FetchError, PersistError};
pub use kinds::{Category, ErrorKind};
