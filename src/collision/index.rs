use crate::bucket::{ONE_EM, PlacedSymbol};
use crate::collision::feature::CollisionFeature;
use crate::collision::grid::CollisionGrid;
use crate::config::PlacementConfig;
use crate::projection::project;
use crate::transform::TransformState;
use glam::{Mat4, Vec2};

/// Spatial accept/reject structure for the current frame. Holds everything
/// accepted so far in two grids: the primary grid drives rejections, the
/// ignored grid records ignore-placement features without letting them block
/// later candidates.
#[derive(Debug, Clone)]
pub struct CollisionIndex {
    grid: CollisionGrid,
    ignored_grid: CollisionGrid,
    viewport_padding: f32,
    /// Viewport bounds in padded screen coordinates.
    screen_right_boundary: f32,
    screen_bottom_boundary: f32,
    /// The grid extends one padding width past the viewport on every side;
    /// geometry entirely outside it can never collide and is not insertable.
    grid_right_boundary: f32,
    grid_bottom_boundary: f32,
    camera_to_center_distance: f32,
}

impl CollisionIndex {
    pub fn new(state: &TransformState, config: &PlacementConfig) -> Self {
        let padding = config.viewport_padding;
        Self {
            grid: CollisionGrid::new(config.grid_cell_size),
            ignored_grid: CollisionGrid::new(config.grid_cell_size),
            viewport_padding: padding,
            screen_right_boundary: state.width + padding,
            screen_bottom_boundary: state.height + padding,
            grid_right_boundary: state.width + 2.0 * padding,
            grid_bottom_boundary: state.height + 2.0 * padding,
            camera_to_center_distance: state.camera_to_center_distance(),
        }
    }

    /// Projects `feature` into screen space and tests it against the
    /// viewport and everything accepted so far. Returns `(placed, offscreen)`;
    /// `offscreen` holds only when every tested primitive is fully outside
    /// the viewport. `allow_overlap` skips the overlap test but never the
    /// viewport test.
    #[allow(clippy::too_many_arguments)]
    pub fn place_feature(
        &self,
        feature: &mut CollisionFeature,
        pos_matrix: &Mat4,
        label_plane_matrix: &Mat4,
        pixel_ratio: f32,
        placed_symbol: &PlacedSymbol,
        scale: f32,
        font_size: f32,
        allow_overlap: bool,
        pitch_with_map: bool,
        debug_circles: bool,
    ) -> (bool, bool) {
        if !feature.along_line {
            self.place_point_feature(feature, pos_matrix, pixel_ratio, allow_overlap)
        } else {
            self.place_line_feature(
                feature,
                pos_matrix,
                label_plane_matrix,
                pixel_ratio,
                placed_symbol,
                scale,
                font_size,
                allow_overlap,
                pitch_with_map,
                debug_circles,
            )
        }
    }

    fn place_point_feature(
        &self,
        feature: &mut CollisionFeature,
        pos_matrix: &Mat4,
        pixel_ratio: f32,
        allow_overlap: bool,
    ) -> (bool, bool) {
        let mut placed = true;
        let mut offscreen = true;

        for collision_box in &mut feature.boxes {
            let (point, perspective_ratio) =
                self.project_and_get_perspective_ratio(pos_matrix, collision_box.anchor);
            let tile_to_viewport = perspective_ratio / pixel_ratio;
            collision_box.px1 = collision_box.x1 * tile_to_viewport + point.x;
            collision_box.py1 = collision_box.y1 * tile_to_viewport + point.y;
            collision_box.px2 = collision_box.x2 * tile_to_viewport + point.x;
            collision_box.py2 = collision_box.y2 * tile_to_viewport + point.y;

            offscreen &= self.is_offscreen(
                collision_box.px1,
                collision_box.py1,
                collision_box.px2,
                collision_box.py2,
            );

            let screen_box = [
                collision_box.px1,
                collision_box.py1,
                collision_box.px2,
                collision_box.py2,
            ];
            if !self.is_inside_grid(
                collision_box.px1,
                collision_box.py1,
                collision_box.px2,
                collision_box.py2,
            ) || (!allow_overlap && self.grid.hit_test_box(&screen_box))
            {
                placed = false;
            }
        }

        (placed, offscreen)
    }

    #[allow(clippy::too_many_arguments)]
    fn place_line_feature(
        &self,
        feature: &mut CollisionFeature,
        pos_matrix: &Mat4,
        label_plane_matrix: &Mat4,
        pixel_ratio: f32,
        placed_symbol: &PlacedSymbol,
        scale: f32,
        font_size: f32,
        allow_overlap: bool,
        pitch_with_map: bool,
        debug_circles: bool,
    ) -> (bool, bool) {
        // Pitched map-plane labels shrink with distance while viewport
        // labels grow, so the font size is adjusted by the anchor's
        // perspective ratio before the fit. `scale` magnifies text rendered
        // from an overscaled tile mid zoom transition.
        let (_, anchor_ratio) =
            self.project_and_get_perspective_ratio(pos_matrix, placed_symbol.anchor);
        let label_plane_font_size = if pitch_with_map {
            font_size / anchor_ratio
        } else {
            font_size * anchor_ratio
        };
        let needed = placed_symbol.half_label_length * (label_plane_font_size / ONE_EM) * scale;

        // The label must fit its line at the current projection before any
        // of its circles are worth testing.
        let Some((backward_extent, forward_extent)) =
            fit_label_to_line(placed_symbol, label_plane_matrix, needed)
        else {
            for collision_box in &mut feature.boxes {
                collision_box.used = false;
            }
            return (false, true);
        };

        let mut collision_detected = false;
        let mut in_grid = false;
        let mut offscreen = true;
        let mut previous_placed: Option<(f32, f32, f32)> = None;

        for collision_box in &mut feature.boxes {
            let distance = collision_box.signed_distance_from_anchor;
            if distance < -backward_extent || distance > forward_extent {
                // Pruned by the fitted extent; does not occupy space.
                collision_box.used = false;
                continue;
            }
            collision_box.used = true;

            let (point, perspective_ratio) =
                self.project_and_get_perspective_ratio(pos_matrix, collision_box.anchor);
            let tile_radius = (collision_box.x2 - collision_box.x1) / 2.0;
            let radius = tile_radius * perspective_ratio / pixel_ratio;
            collision_box.px = point.x;
            collision_box.py = point.y;
            collision_box.radius = radius;

            offscreen &= self.is_offscreen(
                point.x - radius,
                point.y - radius,
                point.x + radius,
                point.y + radius,
            );
            in_grid |= self.is_inside_grid(
                point.x - radius,
                point.y - radius,
                point.x + radius,
                point.y + radius,
            );

            // Near-duplicate circles after a clean predecessor add no new
            // information; skip their hit test but keep them used.
            if let Some((prev_x, prev_y, prev_radius)) = previous_placed {
                let dx = point.x - prev_x;
                let dy = point.y - prev_y;
                if !collision_detected && dx * dx + dy * dy < prev_radius * prev_radius {
                    continue;
                }
            }

            if !allow_overlap && self.grid.hit_test_circle(&[point.x, point.y, radius]) {
                if !debug_circles {
                    return (false, false);
                }
                // Keep scanning so every circle's used flag is computed for
                // the debug overlay.
                collision_detected = true;
            }
            previous_placed = Some((point.x, point.y, radius));
        }

        (!collision_detected && in_grid, offscreen)
    }

    /// Records an accepted feature's projected primitives so later candidates
    /// in iteration order see them. `ignore_placement` routes into the
    /// ignored grid, which `place_feature` never consults.
    pub fn insert_feature(&mut self, feature: &CollisionFeature, ignore_placement: bool) {
        let grid = if ignore_placement {
            &mut self.ignored_grid
        } else {
            &mut self.grid
        };
        for collision_box in &feature.boxes {
            if feature.along_line {
                if collision_box.used {
                    grid.insert_circle([collision_box.px, collision_box.py, collision_box.radius]);
                }
            } else {
                grid.insert_box([
                    collision_box.px1,
                    collision_box.py1,
                    collision_box.px2,
                    collision_box.py2,
                ]);
            }
        }
    }

    fn project_and_get_perspective_ratio(&self, pos_matrix: &Mat4, point: Vec2) -> (Vec2, f32) {
        let (ndc, w) = project(point, pos_matrix);
        let screen = Vec2::new(
            (ndc.x / 2.0 + 0.5) * (self.screen_right_boundary - self.viewport_padding)
                + self.viewport_padding,
            (-ndc.y / 2.0 + 0.5) * (self.screen_bottom_boundary - self.viewport_padding)
                + self.viewport_padding,
        );
        // Distant geometry shrinks at half the strength of true perspective,
        // matching how the renderer draws labels.
        (screen, 0.5 + 0.5 * (self.camera_to_center_distance / w))
    }

    fn is_offscreen(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        x2 < self.viewport_padding
            || x1 >= self.screen_right_boundary
            || y2 < self.viewport_padding
            || y1 >= self.screen_bottom_boundary
    }

    fn is_inside_grid(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        x2 >= 0.0 && x1 < self.grid_right_boundary && y2 >= 0.0 && y1 < self.grid_bottom_boundary
    }
}

/// Walks `placed.line` in label-plane space both ways from the anchor until
/// `needed` label-plane units are covered on each side, and maps the covered
/// span back to tile units. Returns `(backward, forward)` tile extents, or
/// `None` if the line ends before the label fits.
fn fit_label_to_line(
    placed: &PlacedSymbol,
    label_plane_matrix: &Mat4,
    needed: f32,
) -> Option<(f32, f32)> {
    if placed.line.len() < 2 || placed.anchor_segment + 1 >= placed.line.len() {
        return None;
    }
    if needed <= 0.0 {
        return Some((0.0, 0.0));
    }

    let forward = walk_line(
        placed.anchor,
        placed
            .line
            .iter()
            .skip(placed.anchor_segment + 1)
            .copied(),
        label_plane_matrix,
        needed,
    )?;
    let backward = walk_line(
        placed.anchor,
        placed.line[..=placed.anchor_segment].iter().rev().copied(),
        label_plane_matrix,
        needed,
    )?;
    Some((backward, forward))
}

/// Accumulates label-plane distance vertex by vertex until `needed` is
/// covered, returning the matching tile-unit distance. `None` when the
/// vertices run out first.
fn walk_line(
    anchor: Vec2,
    vertices: impl Iterator<Item = Vec2>,
    label_plane_matrix: &Mat4,
    needed: f32,
) -> Option<f32> {
    let mut tile_point = anchor;
    let (mut plane_point, _) = project(anchor, label_plane_matrix);
    let mut covered = 0.0;
    let mut tile_extent = 0.0;

    for next_tile in vertices {
        let (next_plane, _) = project(next_tile, label_plane_matrix);
        let plane_len = plane_point.distance(next_plane);
        let tile_len = tile_point.distance(next_tile);

        if covered + plane_len >= needed {
            if plane_len > 0.0 {
                tile_extent += tile_len * ((needed - covered) / plane_len);
            }
            return Some(tile_extent);
        }
        covered += plane_len;
        tile_extent += tile_len;
        tile_point = next_tile;
        plane_point = next_plane;
    }
    None
}
