//! Pure grouping of discovered assets into publishable units.
//!
//! No I/O: assets partition by package-version key into [`VersionUnit`]s,
//! version units partition by package key into [`ProjectUnit`]s, and a
//! project's versions are ordered ascending by the ecosystem comparator.
//! Identical input always yields identical partitions and ordering.

use std::collections::BTreeMap;

use crate::model::{Asset, ProjectUnit, UnitError, VersionUnit};
use crate::version;

/// Partitions assets into version units keyed by package-version.
///
/// Assets keep their discovery order inside each unit. A construction
/// failure signals inconsistent upstream data and aborts the grouping.
pub fn group_by_version(assets: Vec<Asset>) -> Result<Vec<VersionUnit>, UnitError> {
    let mut groups: BTreeMap<String, Vec<Asset>> = BTreeMap::new();
    for asset in assets {
        groups
            .entry(asset.package_version_key())
            .or_default()
            .push(asset);
    }

    groups.into_values().map(VersionUnit::new).collect()
}

/// Partitions version units into project units ordered by version.
///
/// The sort is stable, so versions the comparator considers equal keep
/// their discovery order. Generic units carry no version and stay in
/// discovery order.
pub fn group_by_project(units: Vec<VersionUnit>) -> Result<Vec<ProjectUnit>, UnitError> {
    let mut groups: BTreeMap<String, Vec<VersionUnit>> = BTreeMap::new();
    for unit in units {
        groups.entry(unit.package_key()).or_default().push(unit);
    }

    groups
        .into_values()
        .map(|mut versions| {
            versions.sort_by(|a, b| match (a.version(), b.version()) {
                (Some(left), Some(right)) => version::compare(left, right),
                _ => std::cmp::Ordering::Equal,
            });
            ProjectUnit::new(versions)
        })
        .collect()
}

/// Full grouping: assets to ordered project units.
pub fn group(assets: Vec<Asset>) -> Result<Vec<ProjectUnit>, UnitError> {
    group_by_project(group_by_version(assets)?)
}
