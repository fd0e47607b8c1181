use std::path::Path;
use std::time::Duration;

use tilemark::bucket::OpacityVertex;
use tilemark::config::PlacementConfig;
use tilemark::placement::Placement;
use tilemark::scenario::{Scenario, parse_scenario};

fn fixture(name: &str) -> Scenario {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let source = std::fs::read_to_string(&path).expect("fixture read failed");
    parse_scenario(&source).expect("fixture parse failed")
}

fn new_placement(scenario: &Scenario) -> Placement {
    Placement::new(scenario.view, scenario.mode, &PlacementConfig::default())
}

/// One full frame: place every layer, commit against `previous`, rebuild
/// bucket opacities.
fn run_frame(scenario: &mut Scenario, previous: &Placement, now_ms: u64) -> (Placement, bool) {
    let proj_matrix = scenario.view.projection_matrix();
    let mut placement = new_placement(scenario);
    for layer in &mut scenario.layers {
        placement.place_layer(layer, &proj_matrix);
    }
    let changed = placement.commit(previous, Duration::from_millis(now_ms));
    for layer in &mut scenario.layers {
        placement.update_layer_opacities(layer);
    }
    (placement, changed)
}

#[test]
fn earlier_symbol_wins_overlap() {
    let mut scenario = fixture("overlap_pair.json5");
    let base = new_placement(&scenario);
    let (placement, changed) = run_frame(&mut scenario, &base, 0);

    assert!(changed);
    assert!(placement.placements[&1].text);
    assert!(!placement.placements[&2].text);
}

#[test]
fn swapping_iteration_order_swaps_the_winner() {
    let mut scenario = fixture("overlap_pair.json5");
    let bucket = scenario.layers[0].render_tiles[0]
        .bucket
        .as_symbol_mut()
        .unwrap();
    bucket.symbol_instances.swap(0, 1);

    let base = new_placement(&scenario);
    let (placement, _) = run_frame(&mut scenario, &base, 0);

    assert!(!placement.placements[&1].text);
    assert!(placement.placements[&2].text);
}

#[test]
fn opacity_stays_in_bounds_for_any_increment() {
    let mut scenario = fixture("overlap_pair.json5");
    let base = new_placement(&scenario);
    let (first, _) = run_frame(&mut scenario, &base, 0);
    // A huge time delta produces an increment far above 1.
    let (second, _) = run_frame(&mut scenario, &first, 100_000);

    for joint in second.opacities.values() {
        assert!((0.0..=1.0).contains(&joint.text.opacity));
        assert!((0.0..=1.0).contains(&joint.icon.opacity));
    }
    assert_eq!(second.opacities[&1].text.opacity, 1.0);
}

#[test]
fn placed_offscreen_symbol_starts_opaque() {
    // Anchored 30px left of the viewport: inside the padded collision grid,
    // outside the visible screen.
    let mut scenario = parse_scenario(
        r#"{
            view: { width: 512, height: 512, zoom: 0 },
            layers: [{ name: "poi", tiles: [{ z: 0, x: 0, y: 0, symbols: [
                { id: 5, anchor: [-480, 4096], text: { width: 40, height: 16 } },
            ]}]}],
        }"#,
    )
    .unwrap();
    let base = new_placement(&scenario);
    let (placement, _) = run_frame(&mut scenario, &base, 0);

    let joint = &placement.placements[&5];
    assert!(joint.text);
    assert!(joint.offscreen);
    assert_eq!(placement.opacities[&5].text.opacity, 1.0);
}

#[test]
fn onscreen_symbol_fades_in_monotonically() {
    let mut scenario = parse_scenario(
        r#"{
            view: { width: 512, height: 512, zoom: 0 },
            layers: [{ name: "poi", tiles: [{ z: 0, x: 0, y: 0, symbols: [
                { id: 3, anchor: [4096, 4096], text: { width: 40, height: 16 } },
            ]}]}],
        }"#,
    )
    .unwrap();

    let mut previous = new_placement(&scenario);
    let mut last_opacity = -1.0_f32;
    for frame in 0..5u64 {
        let (placement, _) = run_frame(&mut scenario, &previous, frame * 100);
        let opacity = placement.opacities[&3].text.opacity;
        if frame == 0 {
            assert_eq!(opacity, 0.0);
        }
        if last_opacity < 1.0 {
            assert!(opacity > last_opacity, "frame {frame}: {opacity} vs {last_opacity}");
        }
        last_opacity = opacity;
        previous = placement;
    }
    // 300ms of continuous placement reaches full opacity.
    assert_eq!(last_opacity, 1.0);
}

#[test]
fn vanished_symbol_fades_out_and_is_dropped() {
    let mut scenario = fixture("overlap_pair.json5");
    let base = new_placement(&scenario);
    let mut previous = run_frame(&mut scenario, &base, 0).0;
    // Fade fully in.
    previous = run_frame(&mut scenario, &previous, 400).0;
    assert_eq!(previous.opacities[&1].text.opacity, 1.0);

    // Tile evicted: the symbols stop being candidates entirely.
    scenario.layers[0].render_tiles[0].renderable = false;

    let (removal, changed) = run_frame(&mut scenario, &previous, 500);
    assert!(changed);
    assert!(removal.placements.is_empty());
    // Direction follows the previous placed flag, so the first commit after
    // removal holds; the fade-down starts on the next one.
    assert!(!removal.opacities[&1].text.placed);
    previous = removal;

    let mut steps = 0;
    while previous.opacities.contains_key(&1) {
        let (next, _) = run_frame(&mut scenario, &previous, 600 + steps * 100);
        let faded = next.opacities.get(&1).map(|j| j.text.opacity);
        if let Some(opacity) = faded {
            assert!(opacity < 1.0);
        }
        previous = next;
        steps += 1;
        assert!(steps < 10, "symbol never dropped from the fade map");
    }
    // Dropped ids render fully hidden.
    assert!(previous.get_opacity(1).is_hidden());
}

#[test]
fn duplicate_cross_tile_id_gets_one_decision() {
    let mut scenario = fixture("crosstile_dup.json5");
    let base = new_placement(&scenario);
    let (placement, _) = run_frame(&mut scenario, &base, 0);

    assert_eq!(placement.placements.len(), 2);
    // First tile's copy won and was placed at the uncontested center.
    assert!(placement.placements[&42].text);
    // The losing copy never entered the index, so id 7 is unobstructed.
    assert!(placement.placements[&7].text);
}

#[test]
fn duplicate_tile_copy_renders_hidden() {
    let mut scenario = fixture("crosstile_dup.json5");
    let base = new_placement(&scenario);
    run_frame(&mut scenario, &base, 0);

    let first = scenario.layers[0].render_tiles[0].bucket.as_symbol().unwrap();
    assert!(first.text.opacity_vertices.iter().all(OpacityVertex::placed));

    let second = scenario.layers[0].render_tiles[1].bucket.as_symbol().unwrap();
    // id 42's duplicate run (8 quads) is forced hidden; id 7's follows it.
    let dup_vertices = &second.text.opacity_vertices[..8 * 4];
    assert!(dup_vertices.iter().all(|v| !v.placed()));
    assert!(second.text.opacity_vertices[8 * 4..].iter().all(OpacityVertex::placed));
    // Hidden flags land on the duplicate's placed symbol too.
    assert!(second.text.placed_symbols[0].hidden);
    assert!(!second.text.placed_symbols[1].hidden);
}

#[test]
fn excluded_tile_never_consumes_collision_space() {
    let mut scenario = fixture("exclude_tile.json5");
    let base = new_placement(&scenario);
    let (placement, _) = run_frame(&mut scenario, &base, 0);

    let excluded = &placement.placements[&1];
    assert!(!excluded.text && !excluded.icon && !excluded.offscreen);
    // Same spot, yet unobstructed.
    assert!(placement.placements[&2].text);
}

#[test]
fn commit_reports_changes_only_on_flips() {
    let mut scenario = fixture("overlap_pair.json5");
    let base = new_placement(&scenario);

    let (first, changed) = run_frame(&mut scenario, &base, 0);
    assert!(changed);

    let (second, changed) = run_frame(&mut scenario, &first, 100);
    assert!(!changed, "identical decisions must not report a change");

    scenario.layers[0].render_tiles[0].renderable = false;
    let (third, changed) = run_frame(&mut scenario, &second, 200);
    assert!(changed, "losing a placed symbol is a change");

    // Still fading out, but nothing flipped again.
    let (_, changed) = run_frame(&mut scenario, &third, 300);
    assert!(!changed);
}

#[test]
fn never_placed_symbol_is_not_a_change() {
    // Far beyond the padded grid: tested, rejected, and of no consequence.
    let mut scenario = parse_scenario(
        r#"{
            view: { width: 512, height: 512, zoom: 0 },
            layers: [{ name: "poi", tiles: [{ z: 0, x: 0, y: 0, symbols: [
                { id: 9, anchor: [-20000, 4096], text: { width: 40, height: 16 } },
            ]}]}],
        }"#,
    )
    .unwrap();
    let base = new_placement(&scenario);
    let (placement, changed) = run_frame(&mut scenario, &base, 0);

    assert!(!placement.placements[&9].text);
    assert!(!changed);
}

#[test]
fn ignore_placement_inserts_without_blocking() {
    let mut scenario = parse_scenario(
        r#"{
            view: { width: 512, height: 512, zoom: 0 },
            layers: [{
                name: "poi",
                layout: { "text-ignore-placement": true },
                tiles: [{ z: 0, x: 0, y: 0, symbols: [
                    { id: 1, anchor: [4000, 4096], text: { width: 80, height: 16 } },
                    { id: 2, anchor: [4160, 4096], text: { width: 80, height: 16 } },
                ]}],
            }],
        }"#,
    )
    .unwrap();
    let base = new_placement(&scenario);
    let (placement, _) = run_frame(&mut scenario, &base, 0);

    assert!(placement.placements[&1].text);
    assert!(placement.placements[&2].text);
}

#[test]
fn text_and_icon_stand_or_fall_together_by_default() {
    // id 21's text is clear but its icon overlaps id 20's label.
    let source = |icon_optional: bool| {
        format!(
            r#"{{
                view: {{ width: 512, height: 512, zoom: 0 }},
                layers: [{{
                    name: "poi",
                    layout: {{ "icon-optional": {icon_optional} }},
                    tiles: [{{ z: 0, x: 0, y: 0, symbols: [
                        {{ id: 20, anchor: [4096, 4096],
                           text: {{ width: 100, height: 100 }},
                           icon: {{ width: 4, height: 4 }} }},
                        {{ id: 21, anchor: [5216, 4096],
                           text: {{ width: 20, height: 16 }},
                           icon: {{ width: 120, height: 40 }} }},
                    ]}}],
                }}],
            }}"#
        )
    };

    let mut strict = parse_scenario(&source(false)).unwrap();
    let base = new_placement(&strict);
    let (placement, _) = run_frame(&mut strict, &base, 0);
    let joint = &placement.placements[&21];
    assert!(!joint.text && !joint.icon);

    let mut relaxed = parse_scenario(&source(true)).unwrap();
    let base = new_placement(&relaxed);
    let (placement, _) = run_frame(&mut relaxed, &base, 0);
    let joint = &placement.placements[&21];
    assert!(joint.text && !joint.icon);
}

#[test]
fn along_line_label_places_circles() {
    let mut scenario = fixture("along_line.json5");
    let base = new_placement(&scenario);
    let (placement, _) = run_frame(&mut scenario, &base, 0);

    assert!(placement.placements[&11].text);

    let bucket = scenario.layers[0].render_tiles[0].bucket.as_symbol().unwrap();
    let feature = &bucket.symbol_instances[0].text_collision_feature;
    assert!(feature.along_line);
    assert!(feature.boxes.iter().any(|b| b.used));
    assert!(feature.boxes.iter().any(|b| !b.used));

    // Along-line debug geometry goes to the circle stream, 4 per circle.
    assert_eq!(
        bucket.collision_circle.dynamic_vertices.len(),
        feature.boxes.len() * 4
    );
    assert!(bucket.collision_box.dynamic_vertices.is_empty());
}

#[test]
fn vertex_runs_match_quad_counts() {
    let mut scenario = fixture("crosstile_dup.json5");
    let base = new_placement(&scenario);
    run_frame(&mut scenario, &base, 0);

    for tile in &scenario.layers[0].render_tiles {
        let bucket = tile.bucket.as_symbol().unwrap();
        let expected_text: usize = bucket
            .symbol_instances
            .iter()
            .filter(|s| s.has_text)
            .map(|s| (s.horizontal_glyph_quads + s.vertical_glyph_quads) * 4)
            .sum();
        assert_eq!(bucket.text.opacity_vertices.len(), expected_text);

        let expected_boxes: usize = bucket
            .symbol_instances
            .iter()
            .map(|s| {
                (s.text_collision_feature.boxes.len() + s.icon_collision_feature.boxes.len()) * 4
            })
            .sum();
        assert_eq!(bucket.collision_box.dynamic_vertices.len(), expected_boxes);
    }
}
