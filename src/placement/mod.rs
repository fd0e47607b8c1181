pub mod opacity;

use crate::bucket::{Alignment, CollisionVertex, OpacityVertex, SymbolBucket, SymbolLayer};
use crate::collision::CollisionIndex;
use crate::config::PlacementConfig;
use crate::projection::label_plane_matrix;
use crate::tile::{EXTENT, TILE_SIZE};
use crate::transform::TransformState;
use glam::Mat4;
use opacity::{AnimationMode, FADE_DURATION, JointOpacityState, JointPlacement};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// One frame's placement pass and its committed result.
///
/// A fresh instance is built from the current view each candidate frame; its
/// `placements` map fills during the collision pass, and `commit` merges the
/// previous frame's fade states into `opacities`. The previous instance is
/// read-only throughout and retires once the new one is committed.
pub struct Placement {
    collision_index: CollisionIndex,
    state: TransformState,
    mode: AnimationMode,
    show_collision_boxes: bool,
    /// Raw decisions keyed by cross-tile id, rebuilt every place pass.
    pub placements: HashMap<u32, JointPlacement>,
    /// Committed fade states, carried forward as the next previous state.
    pub opacities: HashMap<u32, JointOpacityState>,
    commit_time: Duration,
    recent_until: Duration,
    stale: bool,
}

impl Placement {
    pub fn new(state: TransformState, mode: AnimationMode, config: &PlacementConfig) -> Self {
        Self {
            collision_index: CollisionIndex::new(&state, config),
            state,
            mode,
            show_collision_boxes: config.show_collision_boxes,
            placements: HashMap::new(),
            opacities: HashMap::new(),
            commit_time: Duration::ZERO,
            recent_until: Duration::ZERO,
            stale: false,
        }
    }

    pub fn collision_index(&self) -> &CollisionIndex {
        &self.collision_index
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    /// Runs the collision pass over one layer's render tiles, in tile-list
    /// order. Acceptance is greedy and order-dependent: earlier symbols win
    /// ties, and a cross-tile id is decided by the first tile that carries it.
    pub fn place_layer(&mut self, layer: &mut SymbolLayer, proj_matrix: &Mat4) {
        let mut seen_cross_tile_ids = HashSet::new();

        for render_tile in &mut layer.render_tiles {
            if !render_tile.renderable {
                continue;
            }
            let exclude_from_placement = render_tile.exclude_from_placement;
            let tile_id = render_tile.id;
            let Some(bucket) = render_tile.bucket.as_symbol_mut() else {
                continue;
            };

            let pixels_to_tile_units = tile_id.pixels_to_tile_units(1.0, self.state.zoom);
            let scale = 2f32.powf(self.state.zoom - tile_id.overscaled_z as f32);
            let pixel_ratio = EXTENT / (TILE_SIZE * tile_id.overscale_factor());

            let pos_matrix = *proj_matrix * self.state.matrix_for(&tile_id);
            let text_label_plane_matrix = label_plane_matrix(
                &pos_matrix,
                bucket.layout.text_pitch_alignment == Alignment::Map,
                bucket.layout.text_rotation_alignment == Alignment::Map,
                &self.state,
                pixels_to_tile_units,
            );
            let icon_label_plane_matrix = label_plane_matrix(
                &pos_matrix,
                bucket.layout.icon_pitch_alignment == Alignment::Map,
                bucket.layout.icon_rotation_alignment == Alignment::Map,
                &self.state,
                pixels_to_tile_units,
            );

            self.place_layer_bucket(
                bucket,
                &pos_matrix,
                &text_label_plane_matrix,
                &icon_label_plane_matrix,
                scale,
                pixel_ratio,
                &mut seen_cross_tile_ids,
                exclude_from_placement,
            );
        }

        log::debug!(
            "placed layer {}: {} decisions across {} tiles",
            layer.name,
            seen_cross_tile_ids.len(),
            layer.render_tiles.len()
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn place_layer_bucket(
        &mut self,
        bucket: &mut SymbolBucket,
        pos_matrix: &Mat4,
        text_label_plane_matrix: &Mat4,
        icon_label_plane_matrix: &Mat4,
        scale: f32,
        pixel_ratio: f32,
        seen_cross_tile_ids: &mut HashSet<u32>,
        exclude_from_placement: bool,
    ) {
        let partially_evaluated_text_size =
            bucket.text_size_binder.evaluate_for_zoom(self.state.zoom);
        let partially_evaluated_icon_size =
            bucket.icon_size_binder.evaluate_for_zoom(self.state.zoom);

        let icon_without_text = !bucket.has_text_data() || bucket.layout.text_optional;
        let text_without_icon = !bucket.has_icon_data() || bucket.layout.icon_optional;

        let SymbolBucket {
            ref layout,
            ref mut symbol_instances,
            ref text,
            ref icon,
            ref text_size_binder,
            ref icon_size_binder,
            ..
        } = *bucket;

        for symbol_instance in symbol_instances.iter_mut() {
            debug_assert!(symbol_instance.cross_tile_id != 0);
            if !seen_cross_tile_ids.insert(symbol_instance.cross_tile_id) {
                continue;
            }

            if exclude_from_placement {
                // Tiles kept only for fade smoothness must not consume
                // collision space.
                self.placements.insert(
                    symbol_instance.cross_tile_id,
                    JointPlacement::new(false, false, false),
                );
                continue;
            }

            let mut place_text = false;
            let mut place_icon = false;
            let mut offscreen = true;

            if let Some(placed_index) = symbol_instance.placed_text_index {
                let placed_symbol = &text.placed_symbols[placed_index];
                let font_size = text_size_binder
                    .evaluate_size_for_feature(&partially_evaluated_text_size, placed_symbol);

                let (placed, feature_offscreen) = self.collision_index.place_feature(
                    &mut symbol_instance.text_collision_feature,
                    pos_matrix,
                    text_label_plane_matrix,
                    pixel_ratio,
                    placed_symbol,
                    scale,
                    font_size,
                    layout.text_allow_overlap,
                    layout.text_pitch_alignment == Alignment::Map,
                    self.show_collision_boxes,
                );
                place_text = placed;
                offscreen &= feature_offscreen;
            }

            if let Some(placed_index) = symbol_instance.placed_icon_index {
                let placed_symbol = &icon.placed_symbols[placed_index];
                let font_size = icon_size_binder
                    .evaluate_size_for_feature(&partially_evaluated_icon_size, placed_symbol);

                let (placed, feature_offscreen) = self.collision_index.place_feature(
                    &mut symbol_instance.icon_collision_feature,
                    pos_matrix,
                    icon_label_plane_matrix,
                    pixel_ratio,
                    placed_symbol,
                    scale,
                    font_size,
                    layout.icon_allow_overlap,
                    layout.icon_pitch_alignment == Alignment::Map,
                    self.show_collision_boxes,
                );
                place_icon = placed;
                offscreen &= feature_offscreen;
            }

            // Combine the two sides according to which may stand alone.
            if !icon_without_text && !text_without_icon {
                place_text = place_text && place_icon;
                place_icon = place_text;
            } else if !text_without_icon {
                place_text = place_text && place_icon;
            } else if !icon_without_text {
                place_icon = place_text && place_icon;
            }

            if place_text {
                self.collision_index.insert_feature(
                    &symbol_instance.text_collision_feature,
                    layout.text_ignore_placement,
                );
            }
            if place_icon {
                self.collision_index.insert_feature(
                    &symbol_instance.icon_collision_feature,
                    layout.icon_ignore_placement,
                );
            }

            self.placements.insert(
                symbol_instance.cross_tile_id,
                JointPlacement::new(place_text, place_icon, offscreen),
            );
        }
    }

    /// Merges this frame's decisions with the previous frame's fade states.
    /// Returns whether any symbol's placed flag flipped.
    pub fn commit(&mut self, previous: &Placement, now: Duration) -> bool {
        self.commit_time = now;

        let mut placement_changed = false;

        let increment = match self.mode {
            AnimationMode::Continuous => {
                now.saturating_sub(previous.commit_time).as_secs_f32()
                    / FADE_DURATION.as_secs_f32()
            }
            AnimationMode::Instant => 1.0,
        };

        // Symbols decided this frame: advance existing fades, start fresh
        // ones.
        for (&cross_tile_id, joint_placement) in &self.placements {
            if let Some(prev_opacity) = previous.opacities.get(&cross_tile_id) {
                self.opacities.insert(
                    cross_tile_id,
                    JointOpacityState::advance(
                        prev_opacity,
                        increment,
                        joint_placement.text,
                        joint_placement.icon,
                    ),
                );
                placement_changed = placement_changed
                    || joint_placement.icon != prev_opacity.icon.placed
                    || joint_placement.text != prev_opacity.text.placed;
            } else {
                self.opacities
                    .insert(cross_tile_id, JointOpacityState::initial(joint_placement));
                placement_changed =
                    placement_changed || joint_placement.icon || joint_placement.text;
            }
        }

        // Symbols no longer decided keep fading out until fully hidden, then
        // drop from the fade map.
        for (&cross_tile_id, prev_opacity) in &previous.opacities {
            if self.opacities.contains_key(&cross_tile_id) {
                continue;
            }
            let joint_opacity = JointOpacityState::advance(prev_opacity, increment, false, false);
            if !joint_opacity.is_hidden() {
                self.opacities.insert(cross_tile_id, joint_opacity);
                placement_changed = placement_changed
                    || prev_opacity.icon.placed
                    || prev_opacity.text.placed;
            }
        }

        log::debug!(
            "commit at {:?}: {} opacities, changed={}",
            now,
            self.opacities.len(),
            placement_changed
        );

        placement_changed
    }

    /// Rebuilds every bucket's fade and collision-debug vertex runs from the
    /// committed opacities. Duplicate tile copies of a cross-tile id render
    /// fully hidden so only one tile's geometry is drawn.
    pub fn update_layer_opacities(&self, layer: &mut SymbolLayer) {
        let mut seen_cross_tile_ids = HashSet::new();
        for render_tile in &mut layer.render_tiles {
            if !render_tile.renderable {
                continue;
            }
            if let Some(bucket) = render_tile.bucket.as_symbol_mut() {
                self.update_bucket_opacities(bucket, &mut seen_cross_tile_ids);
            }
        }
    }

    fn update_bucket_opacities(&self, bucket: &mut SymbolBucket, seen_cross_tile_ids: &mut HashSet<u32>) {
        let SymbolBucket {
            ref symbol_instances,
            ref mut text,
            ref mut icon,
            ref mut collision_box,
            ref mut collision_circle,
            ..
        } = *bucket;

        text.opacity_vertices.clear();
        icon.opacity_vertices.clear();
        collision_box.dynamic_vertices.clear();
        collision_circle.dynamic_vertices.clear();

        for symbol_instance in symbol_instances {
            let opacity_state = if seen_cross_tile_ids.insert(symbol_instance.cross_tile_id) {
                self.get_opacity(symbol_instance.cross_tile_id)
            } else {
                JointOpacityState::hidden()
            };

            if symbol_instance.has_text {
                let opacity_vertex =
                    OpacityVertex::new(opacity_state.text.placed, opacity_state.text.opacity);
                let vertex_count =
                    (symbol_instance.horizontal_glyph_quads + symbol_instance.vertical_glyph_quads)
                        * 4;
                text.opacity_vertices
                    .extend(std::iter::repeat_n(opacity_vertex, vertex_count));

                if let Some(placed_index) = symbol_instance.placed_text_index {
                    text.placed_symbols[placed_index].hidden = opacity_state.is_hidden();
                }
                if let Some(placed_index) = symbol_instance.placed_vertical_text_index {
                    text.placed_symbols[placed_index].hidden = opacity_state.is_hidden();
                }
            }

            if symbol_instance.has_icon {
                let opacity_vertex =
                    OpacityVertex::new(opacity_state.icon.placed, opacity_state.icon.opacity);
                if symbol_instance.has_icon_quad {
                    icon.opacity_vertices
                        .extend(std::iter::repeat_n(opacity_vertex, 4));
                }
                if let Some(placed_index) = symbol_instance.placed_icon_index {
                    icon.placed_symbols[placed_index].hidden = opacity_state.is_hidden();
                }
            }

            // Along-line features emit into the circle debug stream, point
            // features into the box stream.
            let mut emit_debug = |feature: &crate::collision::CollisionFeature, placed: bool| {
                for feature_box in &feature.boxes {
                    if feature.along_line {
                        let vertex = CollisionVertex {
                            placed,
                            not_used: !feature_box.used,
                        };
                        collision_circle
                            .dynamic_vertices
                            .extend(std::iter::repeat_n(vertex, 4));
                    } else {
                        let vertex = CollisionVertex {
                            placed,
                            not_used: false,
                        };
                        collision_box
                            .dynamic_vertices
                            .extend(std::iter::repeat_n(vertex, 4));
                    }
                }
            };
            emit_debug(
                &symbol_instance.text_collision_feature,
                opacity_state.text.placed,
            );
            emit_debug(
                &symbol_instance.icon_collision_feature,
                opacity_state.icon.placed,
            );
        }

        bucket.update_opacity();
        bucket.sort_features(self.state.angle());
    }

    /// Committed fade state for one cross-tile id; fully hidden when the id
    /// was garbage-collected from the fade map.
    pub fn get_opacity(&self, cross_tile_id: u32) -> JointOpacityState {
        self.opacities
            .get(&cross_tile_id)
            .copied()
            .unwrap_or_else(JointOpacityState::hidden)
    }

    /// Fraction of the fade window elapsed since the last commit.
    pub fn symbol_fade_change(&self, now: Duration) -> f32 {
        match self.mode {
            AnimationMode::Continuous => {
                now.saturating_sub(self.commit_time).as_secs_f32() / FADE_DURATION.as_secs_f32()
            }
            AnimationMode::Instant => 1.0,
        }
    }

    pub fn has_transitions(&self, now: Duration) -> bool {
        self.symbol_fade_change(now) < 1.0 || self.stale
    }

    /// Whether a full collision pass can still be skipped. Only meaningful
    /// in continuous mode.
    pub fn still_recent(&self, now: Duration) -> bool {
        self.mode == AnimationMode::Continuous && self.recent_until > now
    }

    pub fn set_recent(&mut self, now: Duration) {
        self.stale = false;
        if self.mode == AnimationMode::Continuous {
            // Only in continuous mode; "now" is undefined in instant mode.
            self.recent_until = now + FADE_DURATION;
        }
    }

    pub fn set_stale(&mut self) {
        self.stale = true;
    }
}
