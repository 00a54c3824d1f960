//! Domain model of the synchronization pipeline.
//!
//! An [`Asset`] is one uploadable file discovered from a build. Assets group
//! into a [`VersionUnit`] (one package at one version) and version units
//! group into a [`ProjectUnit`] (one package across versions, ordered).
//! Outcomes of publishing a unit accumulate in a [`ResultSet`].

mod asset;
mod results;
mod units;

pub(crate) use asset::is_uncommon_type;
pub use asset::{
    Asset, AssetBuilder, Checksums, Coordinate, CoordinateError, Ecosystem, Label,
    MavenCoordinate, NpmCoordinate, SourceRepository,
};
pub use results::{AssetUpload, Outcome, ResultSet, UploadError};
pub use units::{ProjectUnit, UnitError, VersionUnit};
