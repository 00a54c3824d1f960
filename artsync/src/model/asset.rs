//! Assets and their ecosystem-specific coordinates.
//!
//! One `Asset` is built per discovered remote artifact record and is
//! immutable afterwards. Identity is the coordinate identifier string alone;
//! everything else is payload. Ecosystem differences live in the parsed
//! [`Coordinate`], selected by the [`Ecosystem`] discriminator rather than
//! by subtyping.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Package ecosystem an asset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ecosystem {
    /// Maven-style `group:artifact:type:version[:classifier]` coordinates.
    Maven,
    /// npm `name:version` coordinates, optionally scoped.
    Npm,
    /// Content fetched through the generic proxy, identified by URL+digest.
    Generic,
}

impl Ecosystem {
    /// Directory prefix used for local working directories.
    #[must_use]
    pub fn dir_prefix(self) -> &'static str {
        match self {
            Self::Maven => "mvn",
            Self::Npm => "npm",
            Self::Generic => "gp",
        }
    }
}

/// Descriptor of the source repository an asset was served from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRepository {
    /// Ecosystem of the repository.
    pub ecosystem: Ecosystem,
    /// Opaque repository identifier from the upstream service.
    pub identifier: String,
    /// Repository path on the proxy, e.g. `/api/content/maven/hosted/build-1234`.
    pub repository_path: String,
}

impl SourceRepository {
    /// Short repository name: the last segment of the repository path.
    #[must_use]
    pub fn name(&self) -> &str {
        self.repository_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository_path)
    }
}

/// File checksums as recorded by the upstream service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    /// MD5 digest, hex-encoded.
    pub md5: String,
    /// SHA-1 digest, hex-encoded.
    pub sha1: String,
    /// SHA-256 digest, hex-encoded.
    pub sha256: String,
}

/// Role of a Maven file within its version unit, derived from type and
/// classifier. Drives how a publisher arranges the deploy invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    /// The main POM.
    TopPom,
    /// The main, unclassified jar.
    TopJar,
    /// `-sources` jar.
    Sources,
    /// `-javadoc` jar.
    Javadoc,
    /// Any other classified jar.
    Jar,
    /// Everything else (archives, descriptors, signatures, ...).
    Other,
}

/// File types that are known but carry no special role.
const UNCOMMON_TYPES: &[&str] = &[
    "exe",
    "xsd",
    "xjb",
    "yml",
    "properties",
    "json",
    "zip",
    "tar.gz",
    "ear",
    "war",
    "txt",
    "tar.bz2",
    "xml",
    "signature",
    "kar",
    "empty",
    "html",
    "pdf",
    "cfg",
    "rar",
    "xml.gz",
    "yaml",
    "wsdl",
    "jdocbook-style",
    "js",
    "key",
    "so",
    "target",
];

/// Returns true for a file type with no dedicated deploy role.
#[must_use]
pub(crate) fn is_uncommon_type(file_type: &str) -> bool {
    UNCOMMON_TYPES.contains(&file_type)
}

/// A coordinate identifier that could not be parsed for its ecosystem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinateError {
    /// Maven identifiers need 4 or 5 colon-separated segments.
    #[error("malformed maven identifier: {identifier}")]
    MalformedMaven {
        /// The offending identifier.
        identifier: String,
    },
    /// npm identifiers need a `name:version` shape.
    #[error("malformed npm identifier: {identifier}")]
    MalformedNpm {
        /// The offending identifier.
        identifier: String,
    },
}

/// Parsed Maven coordinate `group:artifact:type:version[:classifier]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenCoordinate {
    /// Group id.
    pub group_id: String,
    /// Artifact id.
    pub artifact_id: String,
    /// File type (`jar`, `pom`, ...).
    pub file_type: String,
    /// Version string.
    pub version: String,
    /// Optional classifier (`sources`, `javadoc`, ...).
    pub classifier: Option<String>,
}

impl MavenCoordinate {
    /// Parses a Maven identifier string.
    pub fn parse(identifier: &str) -> Result<Self, CoordinateError> {
        let parts: Vec<&str> = identifier.split(':').collect();
        match parts.as_slice() {
            [group, artifact, file_type, version] => Ok(Self {
                group_id: (*group).to_string(),
                artifact_id: (*artifact).to_string(),
                file_type: (*file_type).to_string(),
                version: (*version).to_string(),
                classifier: None,
            }),
            [group, artifact, file_type, version, classifier] => Ok(Self {
                group_id: (*group).to_string(),
                artifact_id: (*artifact).to_string(),
                file_type: (*file_type).to_string(),
                version: (*version).to_string(),
                classifier: Some((*classifier).to_string()),
            }),
            _ => Err(CoordinateError::MalformedMaven {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// Deploy role of the file this coordinate describes.
    #[must_use]
    pub fn label(&self) -> Label {
        match self.file_type.as_str() {
            "pom" => Label::TopPom,
            "jar" => match self.classifier.as_deref() {
                Some("sources") => Label::Sources,
                Some("javadoc") => Label::Javadoc,
                None => Label::TopJar,
                Some(_) => Label::Jar,
            },
            other if is_uncommon_type(other) => Label::Other,
            other => {
                tracing::error!(
                    file_type = other,
                    group = %self.group_id,
                    artifact = %self.artifact_id,
                    "unexpected maven file type, treating as plain attachment"
                );
                Label::Other
            }
        }
    }

    /// Renders the identifier back to its canonical string.
    #[must_use]
    pub fn to_identifier(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}:{}:{}:{}:{classifier}",
                self.group_id, self.artifact_id, self.file_type, self.version
            ),
            None => format!(
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.file_type, self.version
            ),
        }
    }
}

/// Parsed npm coordinate `name:version`, where `name` may be `@scope/pkg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpmCoordinate {
    /// Package name, including scope when present.
    pub name: String,
    /// Version string.
    pub version: String,
}

impl NpmCoordinate {
    /// Parses an npm identifier string.
    pub fn parse(identifier: &str) -> Result<Self, CoordinateError> {
        // scoped names contain no ':', so splitting on the last ':' is safe
        let (name, version) =
            identifier
                .rsplit_once(':')
                .ok_or_else(|| CoordinateError::MalformedNpm {
                    identifier: identifier.to_string(),
                })?;
        if name.is_empty() || version.is_empty() {
            return Err(CoordinateError::MalformedNpm {
                identifier: identifier.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// Scope without the leading `@`, when the package is scoped.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        let (scope, _) = self.name.split_once('/')?;
        Some(scope.strip_prefix('@').unwrap_or(scope))
    }

    /// Package name without its scope.
    #[must_use]
    pub fn unscoped_name(&self) -> &str {
        match self.name.split_once('/') {
            Some((_, name)) => name,
            None => &self.name,
        }
    }
}

/// Ecosystem-specific parsed form of an asset identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coordinate {
    /// Maven coordinate.
    Maven(MavenCoordinate),
    /// npm coordinate.
    Npm(NpmCoordinate),
    /// Generic-proxy content; the identifier itself is the coordinate.
    Generic,
}

impl Coordinate {
    /// Parses an identifier according to the ecosystem discriminator.
    pub fn parse(ecosystem: Ecosystem, identifier: &str) -> Result<Self, CoordinateError> {
        match ecosystem {
            Ecosystem::Maven => MavenCoordinate::parse(identifier).map(Self::Maven),
            Ecosystem::Npm => NpmCoordinate::parse(identifier).map(Self::Npm),
            Ecosystem::Generic => Ok(Self::Generic),
        }
    }

    /// Version string, when the ecosystem has one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Maven(maven) => Some(&maven.version),
            Self::Npm(npm) => Some(&npm.version),
            Self::Generic => None,
        }
    }
}

/// One uploadable file produced by or consumed during a build.
///
/// Equality and hashing use the identifier alone; two discoveries of the
/// same coordinate are the same asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    identifier: String,
    artifact_id: String,
    ecosystem: Ecosystem,
    filename: String,
    size: u64,
    checksums: Checksums,
    download_uri: String,
    source_repository: SourceRepository,
    origin_build_id: Option<String>,
    processing_build_id: String,
    coordinate: Coordinate,
}

impl Asset {
    /// Starts building an asset for the given ecosystem and identifier.
    #[must_use]
    pub fn builder(ecosystem: Ecosystem, identifier: impl Into<String>) -> AssetBuilder {
        AssetBuilder::new(ecosystem, identifier)
    }

    /// Unique logical key of the asset.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Upstream record id of the artifact.
    #[must_use]
    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    /// Ecosystem discriminator.
    #[must_use]
    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    /// Filename of the uploadable file.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// File size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Recorded checksums.
    #[must_use]
    pub fn checksums(&self) -> &Checksums {
        &self.checksums
    }

    /// Location to download the file from.
    #[must_use]
    pub fn download_uri(&self) -> &str {
        &self.download_uri
    }

    /// Repository the file was served from.
    #[must_use]
    pub fn source_repository(&self) -> &SourceRepository {
        &self.source_repository
    }

    /// Build that produced the artifact, when known.
    #[must_use]
    pub fn origin_build_id(&self) -> Option<&str> {
        self.origin_build_id.as_deref()
    }

    /// Build whose processing run discovered this asset.
    #[must_use]
    pub fn processing_build_id(&self) -> &str {
        &self.processing_build_id
    }

    /// Parsed coordinate.
    #[must_use]
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    /// Deploy role for Maven assets.
    #[must_use]
    pub fn label(&self) -> Option<Label> {
        match &self.coordinate {
            Coordinate::Maven(maven) => Some(maven.label()),
            _ => None,
        }
    }

    /// Key grouping assets of one package version together.
    #[must_use]
    pub fn package_version_key(&self) -> String {
        match &self.coordinate {
            Coordinate::Maven(maven) => format!(
                "{}:{}:{}",
                maven.group_id, maven.artifact_id, maven.version
            ),
            Coordinate::Npm(npm) => format!("{}:{}", npm.name, npm.version),
            Coordinate::Generic => format!(
                "{}:{}",
                self.identifier, self.source_repository.repository_path
            ),
        }
    }

    /// Key grouping package versions of one project together.
    #[must_use]
    pub fn package_key(&self) -> String {
        match &self.coordinate {
            Coordinate::Maven(maven) => format!("{}:{}", maven.group_id, maven.artifact_id),
            Coordinate::Npm(npm) => npm.name.clone(),
            Coordinate::Generic => self.identifier.clone(),
        }
    }

    /// Destination URL this asset resolves to under the given registry
    /// repository URL, derived from the download URI path.
    #[must_use]
    pub fn deploy_url_from(&self, registry_url: &str) -> String {
        let path = self
            .download_uri
            .split_once("://")
            .map_or(self.download_uri.as_str(), |(_, rest)| {
                rest.find('/').map_or("", |idx| &rest[idx..])
            });
        let anchor = match &self.coordinate {
            Coordinate::Maven(maven) => Some(maven.artifact_id.as_str()),
            Coordinate::Npm(npm) => Some(npm.name.as_str()),
            Coordinate::Generic => None,
        };
        match anchor.and_then(|a| path.find(a).map(|idx| &path[idx..])) {
            Some(suffix) => format!("{registry_url}{suffix}"),
            None => format!("{registry_url}/{}", self.filename),
        }
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Asset {}

impl Hash for Asset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.package_version_key())
    }
}

/// Builder for [`Asset`]; `build` parses the coordinate and fails on a
/// malformed identifier.
#[derive(Debug)]
pub struct AssetBuilder {
    identifier: String,
    artifact_id: String,
    ecosystem: Ecosystem,
    filename: String,
    size: u64,
    checksums: Checksums,
    download_uri: String,
    source_repository: Option<SourceRepository>,
    origin_build_id: Option<String>,
    processing_build_id: String,
}

impl AssetBuilder {
    fn new(ecosystem: Ecosystem, identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            artifact_id: String::new(),
            ecosystem,
            filename: String::new(),
            size: 0,
            checksums: Checksums::default(),
            download_uri: String::new(),
            source_repository: None,
            origin_build_id: None,
            processing_build_id: String::new(),
        }
    }

    /// Sets the upstream record id.
    #[must_use]
    pub fn with_artifact_id(mut self, id: impl Into<String>) -> Self {
        self.artifact_id = id.into();
        self
    }

    /// Sets the filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Sets the file size.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sets the checksums.
    #[must_use]
    pub fn with_checksums(mut self, checksums: Checksums) -> Self {
        self.checksums = checksums;
        self
    }

    /// Sets the download location.
    #[must_use]
    pub fn with_download_uri(mut self, uri: impl Into<String>) -> Self {
        self.download_uri = uri.into();
        self
    }

    /// Sets the source repository descriptor.
    #[must_use]
    pub fn with_source_repository(mut self, repository: SourceRepository) -> Self {
        self.source_repository = Some(repository);
        self
    }

    /// Sets the build that produced the artifact.
    #[must_use]
    pub fn with_origin_build_id(mut self, id: impl Into<String>) -> Self {
        self.origin_build_id = Some(id.into());
        self
    }

    /// Sets the build this asset is being processed for.
    #[must_use]
    pub fn with_processing_build_id(mut self, id: impl Into<String>) -> Self {
        self.processing_build_id = id.into();
        self
    }

    /// Replaces the identifier, re-parsed at build time.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Parses the coordinate and finishes the asset.
    pub fn build(self) -> Result<Asset, CoordinateError> {
        let coordinate = Coordinate::parse(self.ecosystem, &self.identifier)?;
        let source_repository = self.source_repository.unwrap_or(SourceRepository {
            ecosystem: self.ecosystem,
            identifier: String::new(),
            repository_path: String::new(),
        });
        Ok(Asset {
            identifier: self.identifier,
            artifact_id: self.artifact_id,
            ecosystem: self.ecosystem,
            filename: self.filename,
            size: self.size,
            checksums: self.checksums,
            download_uri: self.download_uri,
            source_repository,
            origin_build_id: self.origin_build_id,
            processing_build_id: self.processing_build_id,
            coordinate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn repo(path: &str) -> SourceRepository {
        SourceRepository {
            ecosystem: Ecosystem::Maven,
            identifier: "indy-maven".to_string(),
            repository_path: path.to_string(),
        }
    }

    #[test]
    fn test_maven_coordinate_four_segments() {
        let coord = MavenCoordinate::parse("org.acme:app:jar:1.0").expect("parses");
        assert_eq!(coord.group_id, "org.acme");
        assert_eq!(coord.artifact_id, "app");
        assert_eq!(coord.file_type, "jar");
        assert_eq!(coord.version, "1.0");
        assert_eq!(coord.classifier, None);
        assert_eq!(coord.label(), Label::TopJar);
    }

    #[test]
    fn test_maven_coordinate_five_segments() {
        let coord = MavenCoordinate::parse("org.acme:app:jar:1.0:sources").expect("parses");
        assert_eq!(coord.classifier.as_deref(), Some("sources"));
        assert_eq!(coord.label(), Label::Sources);
    }

    #[test]
    fn test_maven_coordinate_rejects_other_shapes() {
        assert!(MavenCoordinate::parse("org.acme:app").is_err());
        assert!(MavenCoordinate::parse("org.acme:app:jar:1.0:c:extra").is_err());
    }

    #[test]
    fn test_maven_labels() {
        let pom = MavenCoordinate::parse("g:a:pom:1").expect("parses");
        assert_eq!(pom.label(), Label::TopPom);
        let javadoc = MavenCoordinate::parse("g:a:jar:1:javadoc").expect("parses");
        assert_eq!(javadoc.label(), Label::Javadoc);
        let classified = MavenCoordinate::parse("g:a:jar:1:tests").expect("parses");
        assert_eq!(classified.label(), Label::Jar);
        let archive = MavenCoordinate::parse("g:a:tar.gz:1").expect("parses");
        assert_eq!(archive.label(), Label::Other);
        let unknown = MavenCoordinate::parse("g:a:weird:1").expect("parses");
        assert_eq!(unknown.label(), Label::Other);
    }

    #[test]
    fn test_npm_coordinate_scoped() {
        let coord = NpmCoordinate::parse("@acme/app:1.2.3").expect("parses");
        assert_eq!(coord.name, "@acme/app");
        assert_eq!(coord.version, "1.2.3");
        assert_eq!(coord.scope(), Some("acme"));
        assert_eq!(coord.unscoped_name(), "app");
    }

    #[test]
    fn test_npm_coordinate_unscoped() {
        let coord = NpmCoordinate::parse("app:1.2.3").expect("parses");
        assert_eq!(coord.scope(), None);
        assert_eq!(coord.unscoped_name(), "app");
    }

    #[test]
    fn test_asset_identity_is_identifier_only() {
        let a = Asset::builder(Ecosystem::Maven, "org.acme:app:jar:1.0")
            .with_filename("app-1.0.jar")
            .with_source_repository(repo("/api/content/maven/hosted/build-1"))
            .build()
            .expect("builds");
        let b = Asset::builder(Ecosystem::Maven, "org.acme:app:jar:1.0")
            .with_filename("renamed.jar")
            .with_size(10)
            .with_source_repository(repo("/api/content/maven/hosted/build-2"))
            .build()
            .expect("builds");
        assert_eq!(a, b);
        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_package_keys_maven() {
        let asset = Asset::builder(Ecosystem::Maven, "org.acme:app:jar:1.0:sources")
            .build()
            .expect("builds");
        assert_eq!(asset.package_version_key(), "org.acme:app:1.0");
        assert_eq!(asset.package_key(), "org.acme:app");
    }

    #[test]
    fn test_package_keys_generic_include_repository_path() {
        let asset = Asset::builder(Ecosystem::Generic, "https://upstream/x.bin|abc123")
            .with_source_repository(SourceRepository {
                ecosystem: Ecosystem::Generic,
                identifier: "indy-gp".to_string(),
                repository_path: "/api/content/generic/hosted/r-1".to_string(),
            })
            .build()
            .expect("builds");
        assert_eq!(
            asset.package_version_key(),
            "https://upstream/x.bin|abc123:/api/content/generic/hosted/r-1"
        );
        assert_eq!(asset.package_key(), "https://upstream/x.bin|abc123");
    }

    #[test]
    fn test_deploy_url_anchors_on_artifact_id() {
        let asset = Asset::builder(Ecosystem::Maven, "org.acme:app:jar:1.0")
            .with_filename("app-1.0.jar")
            .with_download_uri("https://proxy/api/content/maven/org/acme/app/1.0/app-1.0.jar")
            .build()
            .expect("builds");
        assert_eq!(
            asset.deploy_url_from("https://registry/maven/released/"),
            "https://registry/maven/released/app/1.0/app-1.0.jar"
        );
    }

    #[test]
    fn test_source_repository_name() {
        let repo = repo("/api/content/maven/hosted/build-1234");
        assert_eq!(repo.name(), "build-1234");
    }
}
