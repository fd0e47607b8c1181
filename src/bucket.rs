use crate::collision::feature::CollisionFeature;
use glam::Vec2;

/// Glyph base size in pixels; label dimensions and glyph offsets are
/// expressed at this size and scaled by the evaluated font size.
pub const ONE_EM: f32 = 24.0;

/// Whether a symbol side follows the map plane or the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    Map,
    #[default]
    Viewport,
}

/// Layout flags for one symbol layer, evaluated upstream from style
/// properties. Text and icon carry independent copies of every flag.
#[derive(Debug, Clone, Default)]
pub struct SymbolLayout {
    pub text_allow_overlap: bool,
    pub icon_allow_overlap: bool,
    pub text_ignore_placement: bool,
    pub icon_ignore_placement: bool,
    pub text_optional: bool,
    pub icon_optional: bool,
    pub text_pitch_alignment: Alignment,
    pub text_rotation_alignment: Alignment,
    pub icon_pitch_alignment: Alignment,
    pub icon_rotation_alignment: Alignment,
}

/// Anchor and size data for one placed text run or icon. `hidden` is an
/// output of the opacity rebuild, read back by feature-query callers.
#[derive(Debug, Clone)]
pub struct PlacedSymbol {
    /// Anchor position in tile units.
    pub anchor: Vec2,
    /// Segment of `line` the anchor sits on (along-line symbols).
    pub anchor_segment: usize,
    /// Tile-space polyline for along-line symbols, empty for point labels.
    pub line: Vec<Vec2>,
    /// How far glyphs extend from the anchor along the line, in pixels at
    /// `ONE_EM`.
    pub half_label_length: f32,
    pub lower_size: f32,
    pub upper_size: f32,
    pub hidden: bool,
}

impl PlacedSymbol {
    pub fn point(anchor: Vec2, half_label_length: f32, size: f32) -> Self {
        Self {
            anchor,
            anchor_segment: 0,
            line: Vec::new(),
            half_label_length,
            lower_size: size,
            upper_size: size,
            hidden: false,
        }
    }
}

/// One candidate label/icon pair produced by bucket construction. Immutable
/// during placement except for the `used` flags and projected coordinates
/// scratch space inside its collision features.
#[derive(Debug, Clone)]
pub struct SymbolInstance {
    /// Stable identifier shared by instances of the same logical feature
    /// across tiles, zooms, and frames. Never zero.
    pub cross_tile_id: u32,
    pub anchor: Vec2,
    pub has_text: bool,
    pub has_icon: bool,
    pub text_collision_feature: CollisionFeature,
    pub icon_collision_feature: CollisionFeature,
    pub placed_text_index: Option<usize>,
    pub placed_vertical_text_index: Option<usize>,
    pub placed_icon_index: Option<usize>,
    pub horizontal_glyph_quads: usize,
    pub vertical_glyph_quads: usize,
    pub has_icon_quad: bool,
    /// Original feature order, used to break draw-order sorting ties.
    pub data_feature_index: usize,
}

/// Per-quad-vertex fade attribute: opacity quantized to 7 bits with the
/// placed flag packed into the low bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpacityVertex(pub u8);

impl OpacityVertex {
    pub fn new(placed: bool, opacity: f32) -> Self {
        Self((((opacity * 127.0) as u8) << 1) | placed as u8)
    }

    pub fn placed(&self) -> bool {
        self.0 & 1 != 0
    }

    pub fn opacity(&self) -> f32 {
        (self.0 >> 1) as f32 / 127.0
    }
}

/// Dynamic attribute for one collision debug box or circle vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionVertex {
    pub placed: bool,
    pub not_used: bool,
}

/// Placed symbols plus the fade vertex run regenerated every frame for one
/// side (text or icon) of a bucket.
#[derive(Debug, Clone, Default)]
pub struct SymbolBuffer {
    pub placed_symbols: Vec<PlacedSymbol>,
    pub opacity_vertices: Vec<OpacityVertex>,
}

/// Dynamic vertex run for one collision debug stream.
#[derive(Debug, Clone, Default)]
pub struct DebugBuffer {
    pub dynamic_vertices: Vec<CollisionVertex>,
}

/// Zoom-evaluated part of a size binder. Per-feature evaluation only layers
/// feature size data on top of this.
#[derive(Debug, Clone, Copy)]
pub struct ZoomEvaluatedSize {
    pub size: f32,
    pub size_t: f32,
    pub is_feature_constant: bool,
}

/// How text-size / icon-size respond to zoom and per-feature data.
#[derive(Debug, Clone)]
pub enum SymbolSizeBinder {
    /// One size everywhere.
    Constant(f32),
    /// Zoom-interpolated `(zoom, size)` stops, constant across features.
    CameraFunction(Vec<(f32, f32)>),
    /// Per-feature sizes, constant across zoom.
    SourceFunction,
    /// Per-feature sizes interpolated between the stops covering the zoom.
    CompositeFunction(Vec<(f32, f32)>),
}

impl SymbolSizeBinder {
    /// Called once per bucket per placement pass.
    pub fn evaluate_for_zoom(&self, zoom: f32) -> ZoomEvaluatedSize {
        match self {
            Self::Constant(size) => ZoomEvaluatedSize {
                size: *size,
                size_t: 0.0,
                is_feature_constant: true,
            },
            Self::CameraFunction(stops) => ZoomEvaluatedSize {
                size: interpolate_stops(stops, zoom),
                size_t: 0.0,
                is_feature_constant: true,
            },
            Self::SourceFunction => ZoomEvaluatedSize {
                size: 0.0,
                size_t: 0.0,
                is_feature_constant: false,
            },
            Self::CompositeFunction(stops) => ZoomEvaluatedSize {
                size: 0.0,
                size_t: stop_interpolation_factor(stops, zoom),
                is_feature_constant: false,
            },
        }
    }

    /// Cheap per-feature adjustment on top of the zoom-evaluated base.
    pub fn evaluate_size_for_feature(
        &self,
        zoom_evaluated: &ZoomEvaluatedSize,
        placed: &PlacedSymbol,
    ) -> f32 {
        if zoom_evaluated.is_feature_constant {
            return zoom_evaluated.size;
        }
        match self {
            Self::SourceFunction => placed.lower_size,
            Self::CompositeFunction(_) => {
                placed.lower_size + (placed.upper_size - placed.lower_size) * zoom_evaluated.size_t
            }
            _ => zoom_evaluated.size,
        }
    }
}

fn covering_stops(stops: &[(f32, f32)], zoom: f32) -> (usize, usize) {
    debug_assert!(!stops.is_empty());
    let mut lower = 0;
    for (i, stop) in stops.iter().enumerate() {
        if stop.0 <= zoom {
            lower = i;
        } else {
            break;
        }
    }
    (lower, (lower + 1).min(stops.len() - 1))
}

fn stop_interpolation_factor(stops: &[(f32, f32)], zoom: f32) -> f32 {
    let (lower, upper) = covering_stops(stops, zoom);
    if lower == upper {
        return 0.0;
    }
    ((zoom - stops[lower].0) / (stops[upper].0 - stops[lower].0)).clamp(0.0, 1.0)
}

fn interpolate_stops(stops: &[(f32, f32)], zoom: f32) -> f32 {
    let (lower, upper) = covering_stops(stops, zoom);
    let t = stop_interpolation_factor(stops, zoom);
    stops[lower].1 + (stops[upper].1 - stops[lower].1) * t
}

/// Symbol payload of one render tile.
#[derive(Debug, Clone)]
pub struct SymbolBucket {
    pub layout: SymbolLayout,
    pub symbol_instances: Vec<SymbolInstance>,
    pub text: SymbolBuffer,
    pub icon: SymbolBuffer,
    pub collision_box: DebugBuffer,
    pub collision_circle: DebugBuffer,
    pub text_size_binder: SymbolSizeBinder,
    pub icon_size_binder: SymbolSizeBinder,
    pub sort_features_by_y: bool,
    sorted_angle: Option<f32>,
    /// Draw order over `symbol_instances`, back to front.
    pub symbol_order: Vec<usize>,
    pub uploaded: bool,
}

impl SymbolBucket {
    pub fn new(layout: SymbolLayout, sort_features_by_y: bool) -> Self {
        Self {
            layout,
            symbol_instances: Vec::new(),
            text: SymbolBuffer::default(),
            icon: SymbolBuffer::default(),
            collision_box: DebugBuffer::default(),
            collision_circle: DebugBuffer::default(),
            text_size_binder: SymbolSizeBinder::Constant(ONE_EM * 2.0 / 3.0),
            icon_size_binder: SymbolSizeBinder::Constant(ONE_EM),
            sort_features_by_y,
            sorted_angle: None,
            symbol_order: Vec::new(),
            uploaded: false,
        }
    }

    pub fn has_text_data(&self) -> bool {
        !self.text.placed_symbols.is_empty()
    }

    pub fn has_icon_data(&self) -> bool {
        !self.icon.placed_symbols.is_empty()
    }

    /// Marks GPU-facing buffers dirty after an opacity rebuild.
    pub fn update_opacity(&mut self) {
        self.uploaded = false;
    }

    /// Re-sorts draw order by the anchor's y position in the rotated view so
    /// overlapping translucent labels blend back to front. Recomputed only
    /// when the view angle actually changed.
    pub fn sort_features(&mut self, angle: f32) {
        if !self.sort_features_by_y || self.sorted_angle == Some(angle) {
            return;
        }
        self.sorted_angle = Some(angle);

        let (sin, cos) = angle.sin_cos();
        let mut order: Vec<usize> = (0..self.symbol_instances.len()).collect();
        order.sort_by_key(|&i| {
            let instance = &self.symbol_instances[i];
            let rotated_y = instance.anchor.x * sin + instance.anchor.y * cos;
            (
                rotated_y.round() as i64,
                std::cmp::Reverse(instance.data_feature_index),
            )
        });
        self.symbol_order = order;
        self.uploaded = false;
    }
}

/// Bucket payload of a render tile, keyed by layer kind. Non-symbol layers
/// carry no placement work.
#[derive(Debug, Clone)]
pub enum TileBucket {
    Symbol(SymbolBucket),
    Empty,
}

impl TileBucket {
    pub fn as_symbol(&self) -> Option<&SymbolBucket> {
        match self {
            Self::Symbol(bucket) => Some(bucket),
            Self::Empty => None,
        }
    }

    pub fn as_symbol_mut(&mut self) -> Option<&mut SymbolBucket> {
        match self {
            Self::Symbol(bucket) => Some(bucket),
            Self::Empty => None,
        }
    }
}

/// One tile of a layer's render set.
#[derive(Debug, Clone)]
pub struct RenderTile {
    pub id: crate::tile::OverscaledTileId,
    pub renderable: bool,
    /// Tile kept only for transition smoothness; its symbols never
    /// participate in collision decisions.
    pub exclude_from_placement: bool,
    pub bucket: TileBucket,
}

/// A symbol layer's render-tile list, in placement iteration order.
#[derive(Debug, Clone)]
pub struct SymbolLayer {
    pub name: String,
    pub render_tiles: Vec<RenderTile>,
}
