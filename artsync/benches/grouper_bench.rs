//! Benchmarks for asset grouping and version ordering.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use artsync::grouper;
use artsync::model::{Asset, Ecosystem, SourceRepository};

fn synthetic_assets(projects: usize, versions: usize) -> Vec<Asset> {
    let repo = SourceRepository {
        ecosystem: Ecosystem::Maven,
        identifier: "indy-maven".to_string(),
        repository_path: "/api/content/maven/hosted/build-1".to_string(),
    };
    let mut assets = Vec::with_capacity(projects * versions * 2);
    for p in 0..projects {
        for v in 0..versions {
            for file_type in ["jar", "pom"] {
                let identifier = format!("org.acme:app-{p}:{file_type}:1.{v}.0");
                let asset = Asset::builder(Ecosystem::Maven, identifier)
                    .with_filename(format!("app-{p}-1.{v}.0.{file_type}"))
                    .with_source_repository(repo.clone())
                    .build()
                    .expect("valid identifier");
                assets.push(asset);
            }
        }
    }
    assets
}

fn grouper_benchmark(c: &mut Criterion) {
    let assets = synthetic_assets(200, 10);
    c.bench_function("group_4000_assets", |b| {
        b.iter(|| {
            let grouped = grouper::group(black_box(assets.clone())).expect("grouping");
            black_box(grouped)
        })
    });

    c.bench_function("version_compare", |b| {
        b.iter(|| {
            black_box(artsync::version::compare(
                black_box("1.0.0.redhat-00001"),
                black_box("1.0.0.redhat-00002"),
            ))
        })
    });
}

criterion_group!(benches, grouper_benchmark);
criterion_main!(benches);
