//! Discovery: merging build-record rows with proxy tracking entries into
//! assets.
//!
//! The build-record service and the proxy disagree in small, well-known
//! ways. The proxy knows the real path a file lives under, so its filename
//! wins; identifiers recorded with known upstream quirks are repaired from
//! the deploy path; tracking entries without an ecosystem coordinate fall
//! back to a `url|sha256` identifier.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, warn};

use crate::error::FetchError;
use crate::model::{
    Asset, Checksums, Coordinate, Ecosystem, MavenCoordinate, NpmCoordinate,
};
use crate::remote::{ArtifactRecord, BuildSource, TrackedEntry, TrackingSource};

/// Extension appended when a proxy path has none, so coordinate parsing
/// still succeeds instead of producing duplicate identifiers.
const SUBSTITUTE_EXTENSION: &str = ".empty";

/// File types that keep their multi-segment extension intact.
const COMPOUND_EXTENSIONS: &[&str] = &["tar.gz", "tar.bz2", "xml.gz"];

/// Assets of one build plus the count of rows dropped on the way.
#[derive(Debug, Default)]
pub struct Collection {
    /// Converted assets.
    pub assets: Vec<Asset>,
    /// Rows dropped as unpublishable (mislabeled or malformed).
    pub filtered: u64,
}

/// Merges upstream artifact rows and proxy tracking entries into assets.
pub struct ArtifactCollector {
    builds: Arc<dyn BuildSource>,
    tracking: Arc<dyn TrackingSource>,
}

impl ArtifactCollector {
    /// Creates a collector over the two discovery services.
    #[must_use]
    pub fn new(builds: Arc<dyn BuildSource>, tracking: Arc<dyn TrackingSource>) -> Self {
        Self { builds, tracking }
    }

    /// Collects the assets of one build.
    ///
    /// A malformed artifact row is logged and counted rather than failing
    /// the whole build; transport failures of either service surface.
    pub async fn collect(&self, build_id: &str) -> Result<Collection, FetchError> {
        let records = self.builds.list_artifacts(build_id).await?;
        let report = self.tracking.tracking_report(build_id).await?;

        let tracked = index_tracking_report(report);
        let mut collection = Collection {
            assets: Vec::with_capacity(records.len()),
            filtered: 0,
        };

        for record in records {
            let record = repair_identifier(record);

            // generic-proxy content occasionally surfaces under a maven or
            // npm repository; it cannot be published there
            if (record.identifier.starts_with("http://")
                || record.identifier.starts_with("https://"))
                && record.identifier.contains('|')
                && record.ecosystem != Ecosystem::Generic
            {
                error!(
                    id = %record.id,
                    identifier = %record.identifier,
                    "generic-proxy artifact recorded under a package ecosystem, skipping"
                );
                collection.filtered += 1;
                continue;
            }

            let entry = tracked.get(&record.identifier);
            match build_asset(&record, entry, build_id) {
                Ok(asset) => collection.assets.push(asset),
                Err(err) => {
                    error!(
                        id = %record.id,
                        identifier = %record.identifier,
                        %err,
                        "artifact row not convertible, skipping"
                    );
                    collection.filtered += 1;
                }
            }
        }

        Ok(collection)
    }
}

/// Builds one asset from an upstream row and its optional tracking entry.
fn build_asset(
    record: &ArtifactRecord,
    entry: Option<&TrackedEntry>,
    processing_build_id: &str,
) -> Result<Asset, crate::model::CoordinateError> {
    // the proxy path is where the file actually lives; prefer its filename
    let filename = entry
        .map(|e| tail_segment(&e.path).to_string())
        .unwrap_or_else(|| record.filename.clone());

    if !record.public_url.contains(&filename) {
        warn!(
            url = %record.public_url,
            file = %filename,
            "public URL does not contain the deployed filename"
        );
    }

    let mut builder = Asset::builder(record.ecosystem, record.identifier.clone())
        .with_artifact_id(record.id.clone())
        .with_filename(filename)
        .with_size(record.size)
        .with_checksums(Checksums {
            md5: record.md5.clone(),
            sha1: record.sha1.clone(),
            sha256: record.sha256.clone(),
        })
        .with_download_uri(record.public_url.clone())
        .with_source_repository(record.source_repository.clone())
        .with_processing_build_id(processing_build_id);
    if let Some(origin) = &record.origin_build_id {
        builder = builder.with_origin_build_id(origin.clone());
    }

    let asset = builder.build()?;

    // identifiers of unusual maven types are frequently recorded wrong;
    // the deploy path is authoritative when it parses to something better
    if let Coordinate::Maven(maven) = asset.coordinate() {
        if maven.file_type != "jar"
            && maven.file_type != "pom"
            && !crate::model::is_uncommon_type(&maven.file_type)
        {
            if let Some(better) = reparsed_identifier(maven, &record.deploy_path) {
                warn!(
                    recorded = %record.identifier,
                    reparsed = %better,
                    "identifier mismatch, using deploy-path coordinate"
                );
                let mut rebuilt = Asset::builder(Ecosystem::Maven, better)
                    .with_artifact_id(asset.artifact_id())
                    .with_filename(asset.filename())
                    .with_size(asset.size())
                    .with_checksums(asset.checksums().clone())
                    .with_download_uri(asset.download_uri())
                    .with_source_repository(asset.source_repository().clone())
                    .with_processing_build_id(processing_build_id);
                if let Some(origin) = asset.origin_build_id() {
                    rebuilt = rebuilt.with_origin_build_id(origin);
                }
                return rebuilt.build();
            }
        }
    }

    Ok(asset)
}

/// Deploy-path coordinate when it differs from the recorded one and its
/// version looks real (artifacts without file types parse to versions
/// without a single digit).
fn reparsed_identifier(recorded: &MavenCoordinate, deploy_path: &str) -> Option<String> {
    let parsed = parse_maven_path(deploy_path)?;
    let identifier = parsed.to_identifier();
    if identifier != recorded.to_identifier() && parsed.version.chars().any(|c| c.is_ascii_digit())
    {
        Some(identifier)
    } else {
        None
    }
}

/// Repairs identifiers hit by the upstream quirk where a `.json` artifact
/// identifier ends in a stray digit; the deploy path has the real
/// coordinate.
fn repair_identifier(record: ArtifactRecord) -> ArtifactRecord {
    let ends_in_digit = record
        .identifier
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_digit());
    if record.ecosystem == Ecosystem::Maven
        && record.identifier.contains(".json")
        && ends_in_digit
    {
        if let Some(parsed) = parse_maven_path(&record.deploy_path) {
            let identifier = parsed.to_identifier();
            return ArtifactRecord {
                identifier,
                ..record
            };
        }
    }
    record
}

/// Indexes tracking entries by computed identifier, resolving duplicate
/// rows in favor of the `build-` store.
fn index_tracking_report(report: Vec<TrackedEntry>) -> HashMap<String, TrackedEntry> {
    let mut index: HashMap<String, TrackedEntry> = HashMap::new();
    for entry in report {
        let identifier = compute_identifier(&entry);
        if let Some(previous) = index.insert(identifier.clone(), entry) {
            if previous.store_key_name.contains("build-") {
                index.insert(identifier, previous);
            } else if previous.store_key_name.contains("pnc-builds") {
                // superseded duplicate from the aggregate store
            } else {
                warn!(
                    store = %previous.store_key_name,
                    path = %previous.path,
                    "unknown duplicate in tracking report"
                );
            }
        }
    }
    index
}

/// Computes the identifier of one tracking entry.
///
/// Package-specific paths produce ecosystem coordinates; everything else,
/// generic downloads included, falls back to `url|sha256`.
#[must_use]
pub fn compute_identifier(entry: &TrackedEntry) -> String {
    let coordinate = match entry.ecosystem {
        Ecosystem::Maven => parse_maven_path(&entry.path)
            .or_else(|| {
                // paths without a file extension parse once one is added;
                // without this they produce duplicate generic identifiers
                parse_maven_path(&format!("{}{SUBSTITUTE_EXTENSION}", entry.path))
            })
            .map(|maven| maven.to_identifier()),
        Ecosystem::Npm => {
            parse_npm_path(&entry.path).map(|npm| format!("{}:{}", npm.name, npm.version))
        }
        Ecosystem::Generic => None,
    };

    coordinate.unwrap_or_else(|| {
        generic_identifier(
            entry.origin_url.as_deref(),
            entry.local_url.as_deref(),
            entry.sha256.as_deref().unwrap_or_default(),
        )
    })
}

/// Fallback identifier for content without an ecosystem coordinate.
#[must_use]
pub fn generic_identifier(origin_url: Option<&str>, local_url: Option<&str>, sha256: &str) -> String {
    // hosted content has no origin; the local URL identifies it
    let url = origin_url.or(local_url).unwrap_or_default();
    format!("{url}|{sha256}")
}

/// Last path segment.
fn tail_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parses a maven repository path
/// `/group/parts/artifact/version/artifact-version[-classifier].ext` into a
/// coordinate.
#[must_use]
pub fn parse_maven_path(path: &str) -> Option<MavenCoordinate> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 4 {
        return None;
    }
    let filename = segments[segments.len() - 1];
    let version = segments[segments.len() - 2];
    let artifact_id = segments[segments.len() - 3];
    let group_id = segments[..segments.len() - 3].join(".");

    let stem = format!("{artifact_id}-{version}");
    let rest = filename.strip_prefix(stem.as_str())?;

    let (classifier, file_type) = if let Some(rest) = rest.strip_prefix('-') {
        // classifier present: "-classifier.ext"
        let (classifier, ext) = rest.split_once('.')?;
        (Some(classifier), compound_extension(rest, ext))
    } else if let Some(ext) = rest.strip_prefix('.') {
        (None, compound_extension(rest, ext))
    } else {
        return None;
    };

    if file_type.is_empty() {
        return None;
    }

    Some(MavenCoordinate {
        group_id,
        artifact_id: artifact_id.to_string(),
        file_type: file_type.to_string(),
        version: version.to_string(),
        classifier: classifier.map(str::to_string),
    })
}

/// Keeps known compound extensions together (`tar.gz` instead of `gz`).
fn compound_extension<'a>(rest: &'a str, single: &'a str) -> &'a str {
    for compound in COMPOUND_EXTENSIONS {
        if rest.ends_with(compound) {
            return compound;
        }
    }
    single.rsplit('.').next().unwrap_or(single)
}

/// Parses an npm tarball path `{name}/-/{file}-{version}.tgz`, scoped names
/// included.
#[must_use]
pub fn parse_npm_path(path: &str) -> Option<NpmCoordinate> {
    let trimmed = path.trim_start_matches('/');
    let (name, file) = trimmed.split_once("/-/")?;
    let stem = file.strip_suffix(".tgz")?;

    let unscoped = name.rsplit('/').next().unwrap_or(name);
    let version = stem.strip_prefix(unscoped)?.strip_prefix('-')?;
    if version.is_empty() {
        return None;
    }

    Some(NpmCoordinate {
        name: name.to_string(),
        version: version.to_string(),
    })
}
