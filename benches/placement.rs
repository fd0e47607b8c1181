use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use tilemark::config::PlacementConfig;
use tilemark::placement::Placement;
use tilemark::scenario::{Scenario, parse_scenario};

/// A dense grid of point labels over one tile; neighbors overlap so the
/// collision index does real rejection work.
fn dense_grid_source(symbols: usize) -> String {
    let side = (symbols as f32).sqrt().ceil() as usize;
    let step = 8192.0 / side as f32;
    let mut out = String::from(
        "{ view: { width: 1024, height: 768, zoom: 0 },\n  layers: [{ name: \"poi\", tiles: [{ z: 0, x: 0, y: 0, symbols: [\n",
    );
    let mut id = 1u32;
    'outer: for row in 0..side {
        for col in 0..side {
            if id as usize > symbols {
                break 'outer;
            }
            let x = (col as f32 + 0.5) * step;
            let y = (row as f32 + 0.5) * step;
            out.push_str(&format!(
                "    {{ id: {id}, anchor: [{x:.0}, {y:.0}], text: {{ width: 90, height: 18 }} }},\n"
            ));
            id += 1;
        }
    }
    out.push_str("  ]}]}]}\n");
    out
}

fn place_pass(scenario: &mut Scenario, previous: &Placement, now_ms: u64) -> Placement {
    let proj_matrix = scenario.view.projection_matrix();
    let mut placement = Placement::new(scenario.view, scenario.mode, &PlacementConfig::default());
    for layer in &mut scenario.layers {
        placement.place_layer(layer, &proj_matrix);
    }
    placement.commit(previous, Duration::from_millis(now_ms));
    placement
}

fn bench_place_layer(c: &mut Criterion) {
    let mut group = c.benchmark_group("place_layer");
    for &size in &[100usize, 500, 2000] {
        let source = dense_grid_source(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            let mut scenario = parse_scenario(source).unwrap();
            let proj_matrix = scenario.view.projection_matrix();
            b.iter(|| {
                let mut placement = Placement::new(
                    scenario.view,
                    scenario.mode,
                    &PlacementConfig::default(),
                );
                for layer in &mut scenario.layers {
                    placement.place_layer(layer, &proj_matrix);
                }
                black_box(placement.placements.len())
            });
        });
    }
    group.finish();
}

fn bench_full_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_frame");
    for &size in &[100usize, 500, 2000] {
        let source = dense_grid_source(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            let mut scenario = parse_scenario(source).unwrap();
            let initial = Placement::new(
                scenario.view,
                scenario.mode,
                &PlacementConfig::default(),
            );
            let previous = place_pass(&mut scenario, &initial, 0);
            b.iter(|| {
                let placement = {
                    let mut placement = place_pass(&mut scenario, &previous, 100);
                    for layer in &mut scenario.layers {
                        placement.update_layer_opacities(layer);
                    }
                    placement
                };
                black_box(placement.opacities.len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_place_layer, bench_full_frame);
criterion_main!(benches);
