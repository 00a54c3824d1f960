//! Per-unit outcome aggregation.
//!
//! A [`ResultSet`] accumulates exactly one terminal outcome per asset.
//! Successes and errors are disjoint by construction: duplicate additions
//! are resolved deterministically (an existing success wins over a late
//! error, a late success retracts an earlier error) and logged rather than
//! silently merged.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{ErrorKind, FetchError, LineBuffer};

use super::asset::Asset;

/// Record of one successfully mirrored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetUpload {
    /// The uploaded asset.
    pub asset: Asset,
    /// URL the artifact resolved to at the destination.
    pub deployed_url: String,
    /// Destination repository id.
    pub repository: String,
    /// When the upload finished.
    pub uploaded_at: DateTime<Utc>,
}

/// Record of one failed artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadError {
    /// The failed asset.
    pub asset: Asset,
    /// Terminal kind of the failure.
    pub kind: ErrorKind,
}

impl UploadError {
    /// Creates an error record.
    #[must_use]
    pub fn new(asset: Asset, kind: ErrorKind) -> Self {
        Self { asset, kind }
    }

    /// Recovery category of the failure.
    #[must_use]
    pub fn category(&self) -> crate::error::Category {
        self.kind.category()
    }
}

/// Terminal outcome of one asset within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// The asset was mirrored and is durable at the destination.
    Success(AssetUpload),
    /// The asset failed with a classified kind.
    Error(UploadError),
}

impl Outcome {
    /// Asset the outcome belongs to.
    #[must_use]
    pub fn asset(&self) -> &Asset {
        match self {
            Self::Success(upload) => &upload.asset,
            Self::Error(error) => &error.asset,
        }
    }
}

/// Accumulator of per-asset outcomes for one version unit.
#[derive(Debug, Default, Clone)]
pub struct ResultSet {
    seen: HashSet<String>,
    successes: Vec<AssetUpload>,
    errors: Vec<UploadError>,
}

impl ResultSet {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a success.
    ///
    /// A duplicate success is ignored. A success for an asset that already
    /// has an error retracts the error: the late success supersedes it.
    /// Returns whether the success was recorded.
    pub fn add_success(&mut self, success: AssetUpload) -> bool {
        let identifier = success.asset.identifier().to_string();

        if !self.seen.insert(identifier.clone()) {
            warn!(asset = %identifier, "asset added to results twice");

            let Some(pos) = self
                .errors
                .iter()
                .position(|err| err.asset.identifier() == identifier)
            else {
                warn!(asset = %identifier, "duplicate success, ignoring");
                return false;
            };

            let removed = self.errors.remove(pos);
            warn!(
                asset = %identifier,
                retracted = removed.kind.name(),
                "late success retracts earlier error"
            );
        }

        self.successes.push(success);
        true
    }

    /// Records an error.
    ///
    /// An error for an asset that already has a success is ignored (the
    /// success wins); a duplicate error is ignored. Returns whether the
    /// error was recorded.
    pub fn add_error(&mut self, error: UploadError) -> bool {
        let identifier = error.asset.identifier().to_string();

        if !self.seen.insert(identifier.clone()) {
            warn!(asset = %identifier, "asset added to results twice");

            if self
                .successes
                .iter()
                .any(|suc| suc.asset.identifier() == identifier)
            {
                warn!(asset = %identifier, kind = error.kind.name(), "success exists, ignoring error");
                return false;
            }
            warn!(asset = %identifier, kind = error.kind.name(), "duplicate error, ignoring");
            return false;
        }

        self.errors.push(error);
        true
    }

    /// Recorded successes.
    #[must_use]
    pub fn successes(&self) -> &[AssetUpload] {
        &self.successes
    }

    /// Recorded errors.
    #[must_use]
    pub fn errors(&self) -> &[UploadError] {
        &self.errors
    }

    /// True when the given asset already has an outcome.
    #[must_use]
    pub fn contains(&self, asset: &Asset) -> bool {
        self.seen.contains(asset.identifier())
    }

    /// True when any error was recorded.
    #[must_use]
    pub fn have_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True when at least one error is not of the ignorable category.
    #[must_use]
    pub fn have_critical_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|err| err.category() != crate::error::Category::Ignore)
    }

    /// Number of recorded outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.successes.len() + self.errors.len()
    }

    /// True when no outcome was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.errors.is_empty()
    }

    /// Iterates over all outcomes.
    pub fn outcomes(&self) -> impl Iterator<Item = Outcome> + '_ {
        self.successes
            .iter()
            .cloned()
            .map(Outcome::Success)
            .chain(self.errors.iter().cloned().map(Outcome::Error))
    }

    /// Converts every success into an invalidation error when the set holds
    /// a critical error.
    ///
    /// A partially published version unit is not usable: a consumer
    /// resolving it would see an incomplete package. The retracted upload
    /// keeps its destination URL and timestamp for the escalation record.
    #[must_use]
    pub fn invalidate_on_critical_failure(self) -> Self {
        if !self.have_critical_errors() {
            return self;
        }

        let mut invalidated = Self::new();
        for success in self.successes {
            invalidated.add_error(UploadError::new(
                success.asset,
                ErrorKind::Invalidated {
                    deployed_url: Some(success.deployed_url),
                    repository: Some(success.repository),
                    uploaded_at: Some(success.uploaded_at),
                },
            ));
        }
        for err in self.errors {
            invalidated.add_error(err);
        }
        invalidated
    }

    /// Builds the result set of a version unit whose download phase failed.
    ///
    /// Files that did download cleanly are recorded as invalidated (the unit
    /// cannot be published without the rest), and each download failure is
    /// attributed to one of the remaining assets. The attribution is a
    /// heuristic: when a failure cannot be matched to any remaining asset it
    /// is logged and dropped, never panicking the unit.
    #[must_use]
    pub fn from_failed_download(
        assets: &[Asset],
        downloaded: &[String],
        failures: &[FetchError],
    ) -> Self {
        let mut results = Self::new();
        let mut remaining: Vec<&Asset> = assets.iter().collect();

        for filename in downloaded {
            if let Some(pos) = remaining.iter().position(|a| a.filename() == *filename) {
                let matched = remaining.remove(pos);
                results.add_error(UploadError::new(
                    matched.clone(),
                    ErrorKind::Invalidated {
                        deployed_url: None,
                        repository: None,
                        uploaded_at: None,
                    },
                ));
            }
        }

        for failure in failures {
            if remaining.is_empty() {
                error!(%failure, "download failure with no remaining asset to attribute it to");
                continue;
            }
            let scapegoat = remaining.remove(0);
            results.add_error(UploadError::new(scapegoat.clone(), failure.classify()));
        }

        results
    }

    /// Fills in outcomes for assets the publisher never reported on.
    ///
    /// `present_at_destination` lists the file names the destination
    /// registry holds for the package version (one listing per unit, fetched
    /// by the caller); an unreported asset found there becomes a synthesized
    /// success, anything else a missing-upload escalation carrying the
    /// captured output context.
    pub fn verify_completeness(
        &mut self,
        assets: &[Asset],
        present_at_destination: &[String],
        repo_url: &str,
        repository: &str,
        context: &LineBuffer,
    ) {
        for asset in assets {
            if self.contains(asset) {
                continue;
            }
            warn!(
                asset = asset.identifier(),
                "asset has no outcome, falling back to destination listing"
            );

            let present = match asset.ecosystem() {
                // npm version units upload a single tarball named package.tgz
                crate::model::Ecosystem::Npm => present_at_destination
                    .iter()
                    .any(|name| name == "package.tgz"),
                _ => present_at_destination
                    .iter()
                    .any(|name| name == asset.filename()),
            };

            if present {
                self.add_success(AssetUpload {
                    asset: asset.clone(),
                    deployed_url: asset.deploy_url_from(repo_url),
                    repository: repository.to_string(),
                    uploaded_at: Utc::now(),
                });
            } else {
                self.add_error(UploadError::new(
                    asset.clone(),
                    ErrorKind::MissingUpload {
                        lines: context.joined(),
                    },
                ));
            }
        }
    }
}
