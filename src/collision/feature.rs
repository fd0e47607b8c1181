use glam::Vec2;

/// One collision primitive in tile units, plus scratch space for its screen
/// projection from the most recent placement attempt. Point features use the
/// extents as an axis-aligned box; along-line features use them as a circle
/// diameter.
#[derive(Debug, Clone)]
pub struct CollisionBox {
    /// Center the extents are measured from, in tile units.
    pub anchor: Vec2,
    /// Distances from the anchor to each edge, in tile units.
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Circles only: distance of this circle from the label anchor along the
    /// line, shrunk for conservative pruning. Zero for the anchor circle.
    pub signed_distance_from_anchor: f32,
    /// Circles only: whether this circle participated in the last placement
    /// attempt (circles pruned by the line fit are skipped).
    pub used: bool,
    /// Projected screen box from the last attempt.
    pub px1: f32,
    pub py1: f32,
    pub px2: f32,
    pub py2: f32,
    /// Projected screen circle from the last attempt.
    pub px: f32,
    pub py: f32,
    pub radius: f32,
}

impl CollisionBox {
    pub fn new(anchor: Vec2, x1: f32, y1: f32, x2: f32, y2: f32, distance: f32) -> Self {
        Self {
            anchor,
            x1,
            y1,
            x2,
            y2,
            signed_distance_from_anchor: distance,
            used: true,
            px1: 0.0,
            py1: 0.0,
            px2: 0.0,
            py2: 0.0,
            px: 0.0,
            py: 0.0,
            radius: 0.0,
        }
    }
}

/// Projectable collision geometry for one label or icon: a single box for
/// point placement, or a chain of circles walked along the feature's line.
#[derive(Debug, Clone)]
pub struct CollisionFeature {
    pub along_line: bool,
    pub boxes: Vec<CollisionBox>,
}

impl CollisionFeature {
    /// A feature with no geometry; always placeable, occupies nothing.
    pub fn empty() -> Self {
        Self {
            along_line: false,
            boxes: Vec::new(),
        }
    }

    /// Box around a point label. `top`/`bottom`/`left`/`right` are label
    /// extents in pixels at the base glyph size; `box_scale` converts them to
    /// tile units and `padding` (tile units) grows the box on every side.
    pub fn point(
        anchor: Vec2,
        top: f32,
        bottom: f32,
        left: f32,
        right: f32,
        box_scale: f32,
        padding: f32,
    ) -> Self {
        if top == 0.0 && bottom == 0.0 && left == 0.0 && right == 0.0 {
            return Self::empty();
        }
        let x1 = left * box_scale - padding;
        let y1 = top * box_scale - padding;
        let x2 = right * box_scale + padding;
        let y2 = bottom * box_scale + padding;
        Self {
            along_line: false,
            boxes: vec![CollisionBox::new(anchor, x1, y1, x2, y2, 0.0)],
        }
    }

    /// Circle chain along `line` centered on the anchor. `label_length` and
    /// `box_size` are in tile units; `overscaling` widens the pitch padding
    /// on overscaled tiles where labels crowd together when pitched. Chains
    /// that fall off the start or end of the line come back truncated or
    /// empty.
    pub fn along_line(
        line: &[Vec2],
        anchor: Vec2,
        anchor_segment: usize,
        label_length: f32,
        box_size: f32,
        overscaling: f32,
    ) -> Self {
        let mut feature = Self {
            along_line: true,
            boxes: Vec::new(),
        };
        if line.len() >= 2 && box_size > 0.0 {
            feature.bboxify_label(line, anchor, anchor_segment, label_length, box_size, overscaling);
        }
        feature
    }

    fn bboxify_label(
        &mut self,
        line: &[Vec2],
        anchor: Vec2,
        segment: usize,
        label_length: f32,
        box_size: f32,
        overscaling: f32,
    ) {
        let step = box_size / 2.0;
        let n_boxes = ((label_length / step).floor() as i32).max(1);

        // Extra circles beyond the label ends keep collision working as
        // labels stretch into the distance on a pitched map. Overscaled
        // tiles pack labels tighter, so they get proportionally more.
        let overscaling_padding_factor = 1.0 + 0.4 * overscaling.log2();
        let n_pitch_padding_boxes = ((n_boxes as f32 * overscaling_padding_factor / 2.0).floor()) as i32;

        // Offset the first circle by half a box so its edge lines up with
        // the edge of the label.
        let first_box_offset = -box_size / 2.0;

        let mut p = anchor;
        let mut index = segment + 1;
        let mut anchor_distance = first_box_offset;
        let label_start_distance = -label_length / 2.0;
        let padding_start_distance = label_start_distance - label_length / 8.0;

        // Walk backwards to the segment the label starts on.
        loop {
            if index == 0 {
                if anchor_distance > label_start_distance {
                    // The line does not reach back to the start of the label.
                    return;
                }
                // Not enough room for all the padding, but enough to show
                // the label under most conditions.
                break;
            }
            index -= 1;
            anchor_distance -= line[index].distance(p);
            p = line[index];
            if anchor_distance <= padding_start_distance {
                break;
            }
        }

        let mut segment_length = line[index].distance(line[index + 1]);

        for i in -n_pitch_padding_boxes..n_boxes + n_pitch_padding_boxes {
            let box_offset = i as f32 * step;
            let mut box_distance_to_anchor = label_start_distance + box_offset;

            // Space the pitch padding circles out at double distance.
            if box_offset < 0.0 {
                box_distance_to_anchor += box_offset;
            }
            if box_offset > label_length {
                box_distance_to_anchor += box_offset - label_length;
            }

            if box_distance_to_anchor < anchor_distance {
                // The line does not extend far enough back for this circle.
                continue;
            }

            while anchor_distance + segment_length < box_distance_to_anchor {
                anchor_distance += segment_length;
                index += 1;
                if index + 1 >= line.len() {
                    // Ran off the end of the line.
                    return;
                }
                segment_length = line[index].distance(line[index + 1]);
            }

            let segment_box_distance = box_distance_to_anchor - anchor_distance;
            let p0 = line[index];
            let p1 = line[index + 1];
            let box_anchor = p0 + (p1 - p0) * (segment_box_distance / segment_length);

            // Circles within one step of the anchor are always used, so even
            // zero-width labels keep at least one circle. The 0.8 shrink
            // leaves slack when the line fit prunes the chain.
            let padded_anchor_distance = if (box_distance_to_anchor - first_box_offset).abs() < step
            {
                0.0
            } else {
                (box_distance_to_anchor - first_box_offset) * 0.8
            };

            self.boxes.push(CollisionBox::new(
                box_anchor,
                -box_size / 2.0,
                -box_size / 2.0,
                box_size / 2.0,
                box_size / 2.0,
                padded_anchor_distance,
            ));
        }
    }
}
