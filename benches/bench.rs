use cloudval::{
    aggregate::SpatialAggregator,
    classify::classify_pairs,
    fields::CloudMask,
    grid::{CellIndex, LatLonGrid, TargetGrid},
    Geolocation,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array1;

const NUM_PIXELS: usize = 1_000_000;
const CHUNK_SIZE: usize = 100_000;

/// Pseudo-random but reproducible pixel positions spread over the globe.
fn get_geolocation() -> Geolocation {
    let lon = Array1::from_shape_fn(NUM_PIXELS, |i| ((i * 7919) % 36_000) as f64 / 100.0 - 180.0);
    let lat = Array1::from_shape_fn(NUM_PIXELS, |i| ((i * 104_729) % 18_000) as f64 / 100.0 - 90.0);
    Geolocation { lon, lat }
}

fn get_masks() -> (Array1<Option<CloudMask>>, Array1<Option<CloudMask>>) {
    let code = |i: usize, modulus: usize| match i % modulus {
        0 => None,
        1 | 2 => Some(CloudMask::Clear),
        _ => Some(CloudMask::Cloudy),
    };
    (
        Array1::from_shape_fn(NUM_PIXELS, |i| code(i, 7)),
        Array1::from_shape_fn(NUM_PIXELS, |i| code(i, 5)),
    )
}

fn get_index() -> CellIndex {
    LatLonGrid::new(0.5).unwrap().index(&get_geolocation()).unwrap()
}

fn bench_index_latlon_grid(crt: &mut Criterion) {
    let grid = LatLonGrid::new(0.5).unwrap();
    let geo = get_geolocation();
    crt.bench_function(
        format!("index - {} pixels onto 0.5° grid", NUM_PIXELS).as_str(),
        |bch| bch.iter(|| grid.index(black_box(&geo)).unwrap()),
    );
}

fn bench_contingency(crt: &mut Criterion) {
    let index = get_index();
    let (reference, test) = get_masks();
    let outcomes = classify_pairs(reference.view(), test.view()).unwrap();
    let aggregator = SpatialAggregator::new(&index, CHUNK_SIZE).unwrap();
    crt.bench_function(
        format!("contingency - {} pixels", NUM_PIXELS).as_str(),
        |bch| bch.iter(|| aggregator.contingency(black_box(outcomes.view())).unwrap()),
    );
}

fn bench_average(crt: &mut Criterion) {
    let index = get_index();
    let values = Array1::from_shape_fn(NUM_PIXELS, |i| {
        if i % 3 == 0 {
            None
        } else {
            Some((i % 12_000) as f64)
        }
    });
    let aggregator = SpatialAggregator::new(&index, CHUNK_SIZE).unwrap();
    crt.bench_function(format!("average - {} pixels", NUM_PIXELS).as_str(), |bch| {
        bch.iter(|| aggregator.average(black_box(values.view())).unwrap())
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets =
        bench_index_latlon_grid,
        bench_contingency,
        bench_average,
);
criterion_main!(benches);
