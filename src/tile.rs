use serde::{Deserialize, Serialize};

/// Tile coordinate extent: positions inside a tile span `0..EXTENT`.
pub const EXTENT: f32 = 8192.0;

/// Logical tile size in screen pixels at zoom parity.
pub const TILE_SIZE: f32 = 512.0;

/// Identifies one tile in the render set, including overscale: a tile whose
/// data zoom (`canonical_z`) is lower than the zoom it is rendered at
/// (`overscaled_z`) covers more screen area per tile unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverscaledTileId {
    pub overscaled_z: u8,
    pub canonical_z: u8,
    pub wrap: i32,
    pub x: u32,
    pub y: u32,
}

impl OverscaledTileId {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self {
            overscaled_z: z,
            canonical_z: z,
            wrap: 0,
            x,
            y,
        }
    }

    pub fn overscaled(overscaled_z: u8, canonical_z: u8, x: u32, y: u32) -> Self {
        debug_assert!(overscaled_z >= canonical_z);
        Self {
            overscaled_z,
            canonical_z,
            wrap: 0,
            x,
            y,
        }
    }

    pub fn overscale_factor(&self) -> f32 {
        (1u32 << (self.overscaled_z - self.canonical_z)) as f32
    }

    /// Convert a screen pixel length to tile units for this tile at `zoom`.
    pub fn pixels_to_tile_units(&self, pixel_value: f32, zoom: f32) -> f32 {
        pixel_value * (EXTENT / (TILE_SIZE * 2f32.powf(zoom - self.canonical_z as f32)))
    }
}
