use crate::tile::{EXTENT, OverscaledTileId, TILE_SIZE};
use glam::{Mat4, Vec3};

/// Vertical field of view, `2 * atan(1/3)`. With this value a flat centered
/// view maps world pixels to screen pixels exactly one to one.
pub const FIELD_OF_VIEW: f32 = 0.6435011;

/// Snapshot of the camera used to build one placement frame.
#[derive(Debug, Clone, Copy)]
pub struct TransformState {
    /// Viewport size in pixels.
    pub width: f32,
    pub height: f32,
    pub zoom: f32,
    /// Map bearing in degrees, clockwise from north.
    pub bearing: f32,
    /// Camera pitch in degrees, 0 = straight down.
    pub pitch: f32,
    /// View center as a fraction of the world, `[0, 1]` on each axis.
    pub center: [f32; 2],
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            zoom: 0.0,
            bearing: 0.0,
            pitch: 0.0,
            center: [0.5, 0.5],
        }
    }
}

impl TransformState {
    pub fn new(width: f32, height: f32, zoom: f32) -> Self {
        Self {
            width,
            height,
            zoom,
            ..Self::default()
        }
    }

    /// Rotation applied to screen-aligned content, radians. Bearing is
    /// clockwise, the rotation it induces on the plane is the negation.
    pub fn angle(&self) -> f32 {
        -self.bearing.to_radians()
    }

    pub fn pitch_radians(&self) -> f32 {
        self.pitch.to_radians()
    }

    /// World size in pixels at the current zoom.
    pub fn world_size(&self) -> f32 {
        TILE_SIZE * 2f32.powf(self.zoom)
    }

    pub fn camera_to_center_distance(&self) -> f32 {
        0.5 * self.height / (FIELD_OF_VIEW / 2.0).tan()
    }

    /// Foreshortening factor used when estimating tile distances on a
    /// pitched map.
    pub fn pitch_factor(&self) -> f32 {
        self.pitch_radians().cos() * self.camera_to_center_distance()
    }

    /// Projection from world pixels to clip space for the current view.
    pub fn projection_matrix(&self) -> Mat4 {
        let half_fov = FIELD_OF_VIEW / 2.0;
        let pitch = self.pitch_radians();
        let distance = self.camera_to_center_distance();

        // Extend the far plane to the top of the pitched ground plane so
        // distant tiles stay in frustum.
        let ground_angle = std::f32::consts::FRAC_PI_2 + pitch;
        let top_half_surface_distance =
            half_fov.sin() * distance / (std::f32::consts::PI - ground_angle - half_fov).sin();
        let furthest_distance =
            (std::f32::consts::FRAC_PI_2 - pitch).cos() * top_half_surface_distance + distance;
        let far_z = furthest_distance * 1.01;

        let world = self.world_size();
        let cx = self.center[0] * world;
        let cy = self.center[1] * world;

        Mat4::perspective_rh_gl(FIELD_OF_VIEW, self.width / self.height, 1.0, far_z)
            * Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
            * Mat4::from_translation(Vec3::new(0.0, 0.0, -distance))
            * Mat4::from_rotation_x(pitch)
            * Mat4::from_rotation_z(self.angle())
            * Mat4::from_translation(Vec3::new(-cx, -cy, 0.0))
    }

    /// Model matrix mapping one tile's unit coordinates to world pixels.
    pub fn matrix_for(&self, id: &OverscaledTileId) -> Mat4 {
        let tile_scale = (1u32 << id.canonical_z) as f32;
        let s = self.world_size() / tile_scale;
        let tx = (id.x as f32 + id.wrap as f32 * tile_scale) * s;
        let ty = id.y as f32 * s;
        Mat4::from_translation(Vec3::new(tx, ty, 0.0))
            * Mat4::from_scale(Vec3::new(s / EXTENT, s / EXTENT, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const EPS: f32 = 1e-3;

    #[test]
    fn camera_distance_is_one_and_a_half_heights() {
        let state = TransformState::new(800.0, 600.0, 3.0);
        assert!((state.camera_to_center_distance() - 900.0).abs() < 0.5);
    }

    #[test]
    fn flat_centered_view_maps_world_pixels_one_to_one() {
        let state = TransformState::new(512.0, 512.0, 2.0);
        // World is 2048px; the view is centered on the corner shared by the
        // four middle tiles, so tile (2,2) has its origin at screen center.
        let matrix = state.projection_matrix() * state.matrix_for(&OverscaledTileId::new(2, 2, 2));

        let origin = matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.x / origin.w).abs() < EPS);
        assert!((origin.y / origin.w).abs() < EPS);
        assert!((origin.w - state.camera_to_center_distance()).abs() < 0.5);

        // EXTENT/2 tile units = 256 world pixels = half the viewport width.
        let right = matrix * Vec4::new(EXTENT / 2.0, 0.0, 0.0, 1.0);
        assert!((right.x / right.w - 1.0).abs() < EPS);

        // Screen y grows downward: +y in world lands at negative NDC y.
        let down = matrix * Vec4::new(0.0, EXTENT / 2.0, 0.0, 1.0);
        assert!((down.y / down.w + 1.0).abs() < EPS);
    }

    #[test]
    fn bearing_rotates_clockwise() {
        let state = TransformState {
            bearing: 90.0,
            ..TransformState::new(512.0, 512.0, 2.0)
        };
        assert!((state.angle() + std::f32::consts::FRAC_PI_2).abs() < EPS);

        // With a 90 degree bearing, a point east of center appears above it.
        let matrix = state.projection_matrix() * state.matrix_for(&OverscaledTileId::new(2, 2, 2));
        let east = matrix * Vec4::new(EXTENT / 4.0, 0.0, 0.0, 1.0);
        assert!((east.x / east.w).abs() < EPS);
        assert!(east.y / east.w > 0.4);
    }
}
