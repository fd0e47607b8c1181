use crate::bucket::{
    Alignment, ONE_EM, PlacedSymbol, RenderTile, SymbolBucket, SymbolInstance, SymbolLayer,
    SymbolLayout, SymbolSizeBinder, TileBucket,
};
use crate::collision::CollisionFeature;
use crate::placement::opacity::AnimationMode;
use crate::tile::{EXTENT, OverscaledTileId, TILE_SIZE};
use crate::transform::TransformState;
use glam::Vec2;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Structured failures while turning a scenario file into domain types.
/// Everything past this boundary is invariant-checked, not error-handled.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("unknown alignment `{0}` (expected `map` or `viewport`)")]
    UnknownAlignment(String),
    #[error("unknown animation mode `{0}` (expected `continuous` or `instant`)")]
    UnknownMode(String),
    #[error("symbol in layer `{0}` has cross-tile id 0; ids must be non-zero")]
    ZeroCrossTileId(String),
    #[error("symbol {id}: anchor segment {segment} out of range for a {points}-point line")]
    AnchorSegmentOutOfRange {
        id: u32,
        segment: usize,
        points: usize,
    },
    #[error("symbol {0}: a line needs at least 2 points")]
    ShortLine(u32),
}

/// A fully built placement scene: the view plus every layer's render tiles.
#[derive(Debug)]
pub struct Scenario {
    pub view: TransformState,
    pub mode: AnimationMode,
    pub layers: Vec<SymbolLayer>,
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    view: ViewFile,
    #[serde(default)]
    mode: Option<String>,
    layers: Vec<LayerFile>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ViewFile {
    width: f32,
    height: f32,
    zoom: f32,
    bearing: f32,
    pitch: f32,
    center: [f32; 2],
}

impl Default for ViewFile {
    fn default() -> Self {
        let state = TransformState::default();
        Self {
            width: state.width,
            height: state.height,
            zoom: state.zoom,
            bearing: state.bearing,
            pitch: state.pitch,
            center: state.center,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    name: String,
    #[serde(default)]
    layout: LayoutFile,
    tiles: Vec<TileFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct LayoutFile {
    text_allow_overlap: bool,
    icon_allow_overlap: bool,
    text_ignore_placement: bool,
    icon_ignore_placement: bool,
    text_optional: bool,
    icon_optional: bool,
    text_pitch_alignment: Option<String>,
    text_rotation_alignment: Option<String>,
    icon_pitch_alignment: Option<String>,
    icon_rotation_alignment: Option<String>,
    text_size: Option<SizeFile>,
    icon_size: Option<SizeFile>,
    symbol_sort_by_y: bool,
}

/// Size as either one number or zoom stops.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeFile {
    Constant(f32),
    Stops(Vec<(f32, f32)>),
}

#[derive(Debug, Deserialize)]
struct TileFile {
    z: u8,
    x: u32,
    y: u32,
    #[serde(default)]
    overscaled_z: Option<u8>,
    #[serde(default)]
    wrap: i32,
    #[serde(default = "default_true")]
    renderable: bool,
    #[serde(default)]
    exclude_from_placement: bool,
    symbols: Vec<SymbolFile>,
}

#[derive(Debug, Deserialize)]
struct SymbolFile {
    id: u32,
    anchor: [f32; 2],
    #[serde(default)]
    text: Option<LabelFile>,
    #[serde(default)]
    icon: Option<LabelFile>,
    /// Tile-space polyline; presence makes the text along-line.
    #[serde(default)]
    line: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    anchor_segment: Option<usize>,
    /// Per-feature `[lower, upper]` sizes for source/composite size binders.
    #[serde(default)]
    sizes: Option<[f32; 2]>,
}

/// Label dimensions in pixels at `ONE_EM`.
#[derive(Debug, Deserialize)]
struct LabelFile {
    width: f32,
    height: f32,
}

fn default_true() -> bool {
    true
}

pub fn load_scenario(path: &Path) -> anyhow::Result<Scenario> {
    let contents = std::fs::read_to_string(path)?;
    parse_scenario(&contents)
}

pub fn parse_scenario(source: &str) -> anyhow::Result<Scenario> {
    let file: ScenarioFile = json5::from_str(source)?;
    Ok(build_scenario(file)?)
}

fn build_scenario(file: ScenarioFile) -> Result<Scenario, ScenarioError> {
    let view = TransformState {
        width: file.view.width,
        height: file.view.height,
        zoom: file.view.zoom,
        bearing: file.view.bearing,
        pitch: file.view.pitch,
        center: file.view.center,
    };

    let mode = match file.mode.as_deref() {
        None | Some("continuous") => AnimationMode::Continuous,
        Some("instant") => AnimationMode::Instant,
        Some(other) => return Err(ScenarioError::UnknownMode(other.to_string())),
    };

    let mut layers = Vec::with_capacity(file.layers.len());
    for layer_file in file.layers {
        layers.push(build_layer(layer_file, &view)?);
    }

    Ok(Scenario { view, mode, layers })
}

fn build_layer(file: LayerFile, view: &TransformState) -> Result<SymbolLayer, ScenarioError> {
    let layout = SymbolLayout {
        text_allow_overlap: file.layout.text_allow_overlap,
        icon_allow_overlap: file.layout.icon_allow_overlap,
        text_ignore_placement: file.layout.text_ignore_placement,
        icon_ignore_placement: file.layout.icon_ignore_placement,
        text_optional: file.layout.text_optional,
        icon_optional: file.layout.icon_optional,
        text_pitch_alignment: parse_alignment(file.layout.text_pitch_alignment.as_deref())?,
        text_rotation_alignment: parse_alignment(file.layout.text_rotation_alignment.as_deref())?,
        icon_pitch_alignment: parse_alignment(file.layout.icon_pitch_alignment.as_deref())?,
        icon_rotation_alignment: parse_alignment(file.layout.icon_rotation_alignment.as_deref())?,
    };
    let text_size_binder = size_binder(file.layout.text_size, ONE_EM * 2.0 / 3.0);
    let icon_size_binder = size_binder(file.layout.icon_size, ONE_EM);

    let mut render_tiles = Vec::with_capacity(file.tiles.len());
    for tile_file in file.tiles {
        let id = match tile_file.overscaled_z {
            Some(overscaled_z) => OverscaledTileId {
                overscaled_z,
                canonical_z: tile_file.z,
                wrap: tile_file.wrap,
                x: tile_file.x,
                y: tile_file.y,
            },
            None => OverscaledTileId {
                wrap: tile_file.wrap,
                ..OverscaledTileId::new(tile_file.z, tile_file.x, tile_file.y)
            },
        };

        let mut bucket = SymbolBucket::new(layout.clone(), file.layout.symbol_sort_by_y);
        bucket.text_size_binder = text_size_binder.clone();
        bucket.icon_size_binder = icon_size_binder.clone();

        let base_text_size = text_size_binder.evaluate_for_zoom(view.zoom).size;
        let base_icon_size = icon_size_binder.evaluate_for_zoom(view.zoom).size;

        for (feature_index, symbol_file) in tile_file.symbols.iter().enumerate() {
            if symbol_file.id == 0 {
                return Err(ScenarioError::ZeroCrossTileId(file.name.clone()));
            }
            let instance = build_symbol(
                symbol_file,
                feature_index,
                &mut bucket,
                base_text_size,
                base_icon_size,
                id.overscale_factor(),
            )?;
            bucket.symbol_instances.push(instance);
        }

        render_tiles.push(RenderTile {
            id,
            renderable: tile_file.renderable,
            exclude_from_placement: tile_file.exclude_from_placement,
            bucket: TileBucket::Symbol(bucket),
        });
    }

    Ok(SymbolLayer {
        name: file.name,
        render_tiles,
    })
}

fn build_symbol(
    file: &SymbolFile,
    feature_index: usize,
    bucket: &mut SymbolBucket,
    base_text_size: f32,
    base_icon_size: f32,
    overscaling: f32,
) -> Result<SymbolInstance, ScenarioError> {
    let anchor = Vec2::new(file.anchor[0], file.anchor[1]);
    let line: Option<Vec<Vec2>> = file
        .line
        .as_ref()
        .map(|points| points.iter().map(|p| Vec2::new(p[0], p[1])).collect());

    if let Some(line) = &line {
        if line.len() < 2 {
            return Err(ScenarioError::ShortLine(file.id));
        }
        let segment = file.anchor_segment.unwrap_or(0);
        if segment + 1 >= line.len() {
            return Err(ScenarioError::AnchorSegmentOutOfRange {
                id: file.id,
                segment,
                points: line.len(),
            });
        }
    }

    let (lower_size, upper_size) = match file.sizes {
        Some([lower, upper]) => (lower, upper),
        None => (base_text_size, base_text_size),
    };

    let mut text_collision_feature = CollisionFeature::empty();
    let mut placed_text_index = None;
    let mut horizontal_glyph_quads = 0;

    if let Some(text) = &file.text {
        let box_scale = EXTENT / TILE_SIZE * base_text_size / ONE_EM;
        let anchor_segment = file.anchor_segment.unwrap_or(0);

        text_collision_feature = match &line {
            Some(line) => CollisionFeature::along_line(
                line,
                anchor,
                anchor_segment,
                text.width * box_scale,
                (text.height * box_scale).max(10.0 * box_scale),
                overscaling,
            ),
            None => CollisionFeature::point(
                anchor,
                -text.height / 2.0,
                text.height / 2.0,
                -text.width / 2.0,
                text.width / 2.0,
                box_scale,
                0.0,
            ),
        };

        let mut placed = PlacedSymbol::point(anchor, text.width / 2.0, base_text_size);
        placed.lower_size = lower_size;
        placed.upper_size = upper_size;
        if let Some(line) = &line {
            placed.line = line.clone();
            placed.anchor_segment = anchor_segment;
        }
        placed_text_index = Some(bucket.text.placed_symbols.len());
        bucket.text.placed_symbols.push(placed);

        // Roughly one glyph quad per 8px of text.
        horizontal_glyph_quads = ((text.width / 8.0).ceil() as usize).max(1);
    }

    let mut icon_collision_feature = CollisionFeature::empty();
    let mut placed_icon_index = None;

    if let Some(icon) = &file.icon {
        // Icon collision stays viewport-rotation-aligned point geometry even
        // for along-line symbols; icons are close enough to square.
        let box_scale = EXTENT / TILE_SIZE * base_icon_size / ONE_EM;
        icon_collision_feature = CollisionFeature::point(
            anchor,
            -icon.height / 2.0,
            icon.height / 2.0,
            -icon.width / 2.0,
            icon.width / 2.0,
            box_scale,
            0.0,
        );

        let mut placed = PlacedSymbol::point(anchor, icon.width / 2.0, base_icon_size);
        placed.lower_size = lower_size;
        placed.upper_size = upper_size;
        placed_icon_index = Some(bucket.icon.placed_symbols.len());
        bucket.icon.placed_symbols.push(placed);
    }

    Ok(SymbolInstance {
        cross_tile_id: file.id,
        anchor,
        has_text: file.text.is_some(),
        has_icon: file.icon.is_some(),
        text_collision_feature,
        icon_collision_feature,
        placed_text_index,
        placed_vertical_text_index: None,
        placed_icon_index,
        horizontal_glyph_quads,
        vertical_glyph_quads: 0,
        has_icon_quad: file.icon.is_some(),
        data_feature_index: feature_index,
    })
}

fn parse_alignment(value: Option<&str>) -> Result<Alignment, ScenarioError> {
    match value {
        None | Some("viewport") => Ok(Alignment::Viewport),
        Some("map") => Ok(Alignment::Map),
        Some(other) => Err(ScenarioError::UnknownAlignment(other.to_string())),
    }
}

fn size_binder(file: Option<SizeFile>, default: f32) -> SymbolSizeBinder {
    match file {
        None => SymbolSizeBinder::Constant(default),
        Some(SizeFile::Constant(size)) => SymbolSizeBinder::Constant(size),
        Some(SizeFile::Stops(stops)) => SymbolSizeBinder::CameraFunction(stops),
    }
}
