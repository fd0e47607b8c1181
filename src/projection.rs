use crate::transform::TransformState;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Project a tile-space point through `matrix`, returning the divided 2D
/// position and the signed camera distance `w`.
pub fn project(point: Vec2, matrix: &Mat4) -> (Vec2, f32) {
    let p = *matrix * Vec4::new(point.x, point.y, 0.0, 1.0);
    (Vec2::new(p.x / p.w, p.y / p.w), p.w)
}

/// Matrix mapping tile space into the plane where along-line labels are laid
/// out. Pitch-aligned labels live on the map plane (scaled to pixel-sized
/// units, counter-rotated if their rotation is viewport-aligned); everything
/// else lives in screen pixels.
pub fn label_plane_matrix(
    pos_matrix: &Mat4,
    pitch_with_map: bool,
    rotate_with_map: bool,
    state: &TransformState,
    pixels_to_tile_units: f32,
) -> Mat4 {
    if pitch_with_map {
        let scale = Mat4::from_scale(Vec3::new(
            1.0 / pixels_to_tile_units,
            1.0 / pixels_to_tile_units,
            1.0,
        ));
        if rotate_with_map {
            scale
        } else {
            scale * Mat4::from_rotation_z(state.angle())
        }
    } else {
        Mat4::from_scale(Vec3::new(state.width / 2.0, -state.height / 2.0, 1.0))
            * Mat4::from_translation(Vec3::new(1.0, -1.0, 0.0))
            * *pos_matrix
    }
}
