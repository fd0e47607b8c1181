use crate::bucket::{RenderTile, SymbolLayer};
use crate::placement::Placement;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Serializable snapshot of a simulated placement run: per-frame decisions
/// and fade states, plus the final vertex stream sizes per bucket.
#[derive(Debug, Serialize)]
pub struct PlacementDump {
    pub mode: String,
    pub frames: Vec<FrameDump>,
    pub buckets: Vec<BucketDump>,
}

#[derive(Debug, Serialize)]
pub struct FrameDump {
    pub index: usize,
    pub time_ms: u64,
    pub placement_changed: bool,
    pub placements: Vec<PlacementEntry>,
    pub opacities: Vec<OpacityEntry>,
}

#[derive(Debug, Serialize)]
pub struct PlacementEntry {
    pub id: u32,
    pub text: bool,
    pub icon: bool,
    pub offscreen: bool,
}

#[derive(Debug, Serialize)]
pub struct OpacityEntry {
    pub id: u32,
    pub text_opacity: f32,
    pub text_placed: bool,
    pub icon_opacity: f32,
    pub icon_placed: bool,
}

#[derive(Debug, Serialize)]
pub struct BucketDump {
    pub layer: String,
    pub tile: String,
    pub text_opacity_vertices: usize,
    pub icon_opacity_vertices: usize,
    pub collision_box_vertices: usize,
    pub collision_circle_vertices: usize,
    /// Cross-tile ids whose placed symbols ended the run hidden.
    pub hidden_symbols: Vec<u32>,
}

impl FrameDump {
    pub fn from_placement(
        index: usize,
        time_ms: u64,
        placement_changed: bool,
        placement: &Placement,
    ) -> Self {
        let mut placements: Vec<PlacementEntry> = placement
            .placements
            .iter()
            .map(|(&id, joint)| PlacementEntry {
                id,
                text: joint.text,
                icon: joint.icon,
                offscreen: joint.offscreen,
            })
            .collect();
        placements.sort_by_key(|entry| entry.id);

        let mut opacities: Vec<OpacityEntry> = placement
            .opacities
            .iter()
            .map(|(&id, joint)| OpacityEntry {
                id,
                text_opacity: joint.text.opacity,
                text_placed: joint.text.placed,
                icon_opacity: joint.icon.opacity,
                icon_placed: joint.icon.placed,
            })
            .collect();
        opacities.sort_by_key(|entry| entry.id);

        FrameDump {
            index,
            time_ms,
            placement_changed,
            placements,
            opacities,
        }
    }
}

impl BucketDump {
    pub fn from_tile(layer: &str, render_tile: &RenderTile) -> Option<Self> {
        let bucket = render_tile.bucket.as_symbol()?;
        let id = render_tile.id;

        let mut hidden_symbols = Vec::new();
        for instance in &bucket.symbol_instances {
            let text_hidden = instance
                .placed_text_index
                .map(|i| bucket.text.placed_symbols[i].hidden);
            let icon_hidden = instance
                .placed_icon_index
                .map(|i| bucket.icon.placed_symbols[i].hidden);
            if text_hidden.unwrap_or(true) && icon_hidden.unwrap_or(true) {
                hidden_symbols.push(instance.cross_tile_id);
            }
        }

        Some(BucketDump {
            layer: layer.to_string(),
            tile: format!("{}/{}/{}", id.overscaled_z, id.x, id.y),
            text_opacity_vertices: bucket.text.opacity_vertices.len(),
            icon_opacity_vertices: bucket.icon.opacity_vertices.len(),
            collision_box_vertices: bucket.collision_box.dynamic_vertices.len(),
            collision_circle_vertices: bucket.collision_circle.dynamic_vertices.len(),
            hidden_symbols,
        })
    }
}

impl PlacementDump {
    pub fn bucket_dumps(layers: &[SymbolLayer]) -> Vec<BucketDump> {
        layers
            .iter()
            .flat_map(|layer| {
                layer
                    .render_tiles
                    .iter()
                    .filter_map(|tile| BucketDump::from_tile(&layer.name, tile))
            })
            .collect()
    }
}

pub fn write_placement_dump(path: &Path, dump: &PlacementDump) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
