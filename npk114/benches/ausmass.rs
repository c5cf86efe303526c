//! Benchmarks für die Ausmassberechnung

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use npk114::access::AccessPlanner;
use npk114::types::{BuildingGeometry, Footprint, WidthClass};

/// Regelmässiges n-Eck mit gegebenem Umkreisradius
fn regular_polygon(n: usize, radius: f64) -> Footprint {
    let pairs: Vec<[f64; 2]> = (0..n)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            [radius * angle.cos(), radius * angle.sin()]
        })
        .collect();
    Footprint::from_pairs(&pairs).expect("regular polygon is valid")
}

fn bench_geruest_ausmass(c: &mut Criterion) {
    let mut group = c.benchmark_group("geruest_ausmass");
    for n in [4usize, 8, 16, 64, 256] {
        let footprint = regular_polygon(n, 20.0);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &footprint, |b, fp| {
            b.iter(|| {
                let ausmass = npk114::geruest_ausmass(black_box(fp), 8.0, WidthClass::W09);
                black_box(ausmass)
            })
        });
    }
    group.finish();
}

fn bench_geometry_derivation(c: &mut Criterion) {
    let footprint = regular_polygon(64, 30.0);
    c.bench_function("building_geometry_64", |b| {
        b.iter(|| {
            let geom = BuildingGeometry::from_footprint(black_box(footprint.clone()));
            black_box(geom)
        })
    });
}

fn bench_access_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_planning");
    let planner = AccessPlanner::default();
    for n in [4usize, 16, 64] {
        // Radius 40 m: Umfang weit über der 50-m-Fluchtwegregel
        let geometry = BuildingGeometry::from_footprint(regular_polygon(n, 40.0));
        group.bench_with_input(BenchmarkId::from_parameter(n), &geometry, |b, geom| {
            b.iter(|| {
                let plan = planner.plan(black_box(&geom.facades));
                black_box(plan)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_geruest_ausmass,
    bench_geometry_derivation,
    bench_access_planning
);
criterion_main!(benches);
