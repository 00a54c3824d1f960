//! Publishable units: one package version, and one project across versions.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use thiserror::Error;

use super::asset::{Asset, Coordinate, Ecosystem, SourceRepository};

/// Invariant violation while assembling a unit.
///
/// These indicate inconsistent upstream data and abort grouping; they are
/// not per-artifact outcomes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnitError {
    /// A unit must hold at least one asset.
    #[error("version unit has no assets")]
    Empty,

    /// All assets of a version unit must share one source repository.
    #[error("assets of {version} differ in source repositories")]
    MixedSourceRepositories {
        /// Version key of the offending unit.
        version: String,
    },

    /// All assets of a version unit must share one package-version key.
    #[error("asset {asset} does not match version {version}")]
    MixedVersions {
        /// Identifier of the offending asset.
        asset: String,
        /// Version key of the unit.
        version: String,
    },

    /// All version units of a project must share one package key.
    #[error("version {version} does not match project {project}")]
    MixedProjects {
        /// Version key of the offending unit.
        version: String,
        /// Package key of the project.
        project: String,
    },
}

/// All assets of one package at one version, published as a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionUnit {
    assets: Vec<Asset>,
    version_key: String,
}

impl VersionUnit {
    /// Assembles a version unit, validating that every asset agrees on the
    /// package-version key and the source repository.
    pub fn new(assets: Vec<Asset>) -> Result<Self, UnitError> {
        let first = assets.first().ok_or(UnitError::Empty)?;
        let version_key = first.package_version_key();
        let source = first.source_repository().clone();

        for asset in &assets {
            if asset.package_version_key() != version_key {
                return Err(UnitError::MixedVersions {
                    asset: asset.identifier().to_string(),
                    version: version_key,
                });
            }
            if *asset.source_repository() != source {
                return Err(UnitError::MixedSourceRepositories {
                    version: version_key,
                });
            }
        }

        Ok(Self {
            assets,
            version_key,
        })
    }

    /// Assets of the unit, in discovery order.
    #[must_use]
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Package-version key identifying the unit.
    #[must_use]
    pub fn version_identifier(&self) -> &str {
        &self.version_key
    }

    /// Version string, when the ecosystem has one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.assets[0].coordinate().version()
    }

    /// Ecosystem of the unit.
    #[must_use]
    pub fn ecosystem(&self) -> Ecosystem {
        self.assets[0].ecosystem()
    }

    /// Source repository shared by every asset of the unit.
    #[must_use]
    pub fn source_repository(&self) -> &SourceRepository {
        self.assets[0].source_repository()
    }

    /// Key grouping this unit into its project.
    #[must_use]
    pub fn package_key(&self) -> String {
        self.assets[0].package_key()
    }

    /// Working directory of this version below the project directory.
    ///
    /// Maven and npm use the version string. Generic units have no version,
    /// so the version key is hashed to keep the directory unique per unit.
    #[must_use]
    pub fn version_dir(&self, project_dir: &Path) -> PathBuf {
        match self.version() {
            Some(version) => project_dir.join(version),
            None => {
                let digest = Md5::digest(self.version_key.as_bytes());
                project_dir.join(hex::encode(digest))
            }
        }
    }

    /// Compact rendering of the unit for logs.
    #[must_use]
    pub fn pretty_print(&self) -> String {
        let files = self
            .assets
            .iter()
            .map(|asset| match asset.coordinate() {
                Coordinate::Maven(maven) => match &maven.classifier {
                    Some(classifier) => format!("{}:{classifier}", maven.file_type),
                    None => maven.file_type.clone(),
                },
                _ => asset.filename().to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} [{files}]", self.version_key)
    }
}

/// All version units of one package, ordered ascending by version.
#[derive(Debug, Clone)]
pub struct ProjectUnit {
    versions: Vec<VersionUnit>,
    package_key: String,
}

impl ProjectUnit {
    /// Assembles a project unit from already-ordered version units,
    /// validating that every unit shares the package key.
    pub fn new(versions: Vec<VersionUnit>) -> Result<Self, UnitError> {
        let first = versions.first().ok_or(UnitError::Empty)?;
        let package_key = first.package_key();

        for version in &versions {
            if version.package_key() != package_key {
                return Err(UnitError::MixedProjects {
                    version: version.version_identifier().to_string(),
                    project: package_key,
                });
            }
        }

        Ok(Self {
            versions,
            package_key,
        })
    }

    /// Version units in publish order.
    #[must_use]
    pub fn versions(&self) -> &[VersionUnit] {
        &self.versions
    }

    /// Package key identifying the project.
    #[must_use]
    pub fn project_identifier(&self) -> &str {
        &self.package_key
    }

    /// Ecosystem of the project.
    #[must_use]
    pub fn ecosystem(&self) -> Ecosystem {
        self.versions[0].ecosystem()
    }

    /// Root working directory of the project below the download root.
    ///
    /// Maven splits the group id into path segments; npm uses the package
    /// name; generic content shares one flat directory.
    #[must_use]
    pub fn project_dir(&self, root: &Path) -> PathBuf {
        let first = &self.versions[0].assets()[0];
        let mut dir = root.join(first.ecosystem().dir_prefix());
        match first.coordinate() {
            Coordinate::Maven(maven) => {
                for part in maven.group_id.split('.') {
                    dir = dir.join(part);
                }
                dir.join(&maven.artifact_id)
            }
            Coordinate::Npm(npm) => dir.join(&npm.name),
            Coordinate::Generic => dir,
        }
    }
}

impl std::fmt::Display for ProjectUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} versions: {}", self.package_key, self.versions.len())
    }
}
