use std::collections::{HashMap, HashSet};

/// Accepted screen-space box: `[x1, y1, x2, y2]`.
pub type ScreenBox = [f32; 4];
/// Accepted screen-space circle: `[x, y, radius]`.
pub type ScreenCircle = [f32; 3];

/// Uniform-cell spatial hash over the padded viewport, holding the collision
/// geometry accepted so far this frame. Boxes and circles share the cell
/// structure but live in separate lists so hit tests can pick the right
/// pairwise predicate.
#[derive(Debug, Clone)]
pub struct CollisionGrid {
    cell: f32,
    boxes: Vec<ScreenBox>,
    circles: Vec<ScreenCircle>,
    /// Maps grid cell (ix, iy) to indices into the box list.
    box_cells: HashMap<(i32, i32), Vec<usize>>,
    circle_cells: HashMap<(i32, i32), Vec<usize>>,
}

impl CollisionGrid {
    pub fn new(cell: f32) -> Self {
        Self {
            cell: cell.max(1.0),
            boxes: Vec::new(),
            circles: Vec::new(),
            box_cells: HashMap::new(),
            circle_cells: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.circles.is_empty()
    }

    fn cell_range(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> (i32, i32, i32, i32) {
        (
            (x1 / self.cell).floor() as i32,
            (y1 / self.cell).floor() as i32,
            (x2 / self.cell).floor() as i32,
            (y2 / self.cell).floor() as i32,
        )
    }

    pub fn insert_box(&mut self, screen_box: ScreenBox) {
        let idx = self.boxes.len();
        self.boxes.push(screen_box);
        let [x1, y1, x2, y2] = screen_box;
        let (x0, y0, x1c, y1c) = self.cell_range(x1, y1, x2, y2);
        for ix in x0..=x1c {
            for iy in y0..=y1c {
                self.box_cells.entry((ix, iy)).or_default().push(idx);
            }
        }
    }

    pub fn insert_circle(&mut self, circle: ScreenCircle) {
        let idx = self.circles.len();
        self.circles.push(circle);
        let [x, y, r] = circle;
        let (x0, y0, x1c, y1c) = self.cell_range(x - r, y - r, x + r, y + r);
        for ix in x0..=x1c {
            for iy in y0..=y1c {
                self.circle_cells.entry((ix, iy)).or_default().push(idx);
            }
        }
    }

    /// True if `screen_box` intersects any accepted primitive.
    pub fn hit_test_box(&self, screen_box: &ScreenBox) -> bool {
        let [x1, y1, x2, y2] = *screen_box;
        let range = self.cell_range(x1, y1, x2, y2);

        for idx in self.query(&self.box_cells, range) {
            let [bx1, by1, bx2, by2] = self.boxes[idx];
            if boxes_intersect(x1, y1, x2, y2, bx1, by1, bx2, by2) {
                return true;
            }
        }
        for idx in self.query(&self.circle_cells, range) {
            let [cx, cy, r] = self.circles[idx];
            if box_circle_intersect(x1, y1, x2, y2, cx, cy, r) {
                return true;
            }
        }
        false
    }

    /// True if `circle` intersects any accepted primitive.
    pub fn hit_test_circle(&self, circle: &ScreenCircle) -> bool {
        let [x, y, r] = *circle;
        let range = self.cell_range(x - r, y - r, x + r, y + r);

        for idx in self.query(&self.box_cells, range) {
            let [bx1, by1, bx2, by2] = self.boxes[idx];
            if box_circle_intersect(bx1, by1, bx2, by2, x, y, r) {
                return true;
            }
        }
        for idx in self.query(&self.circle_cells, range) {
            let [cx, cy, cr] = self.circles[idx];
            let dx = cx - x;
            let dy = cy - y;
            let reach = r + cr;
            if dx * dx + dy * dy <= reach * reach {
                return true;
            }
        }
        false
    }

    fn query(
        &self,
        cells: &HashMap<(i32, i32), Vec<usize>>,
        (x0, y0, x1, y1): (i32, i32, i32, i32),
    ) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for ix in x0..=x1 {
            for iy in y0..=y1 {
                if let Some(indices) = cells.get(&(ix, iy)) {
                    for &idx in indices {
                        if seen.insert(idx) {
                            out.push(idx);
                        }
                    }
                }
            }
        }
        out
    }
}

fn boxes_intersect(
    ax1: f32,
    ay1: f32,
    ax2: f32,
    ay2: f32,
    bx1: f32,
    by1: f32,
    bx2: f32,
    by2: f32,
) -> bool {
    ax1 <= bx2 && bx1 <= ax2 && ay1 <= by2 && by1 <= ay2
}

fn box_circle_intersect(x1: f32, y1: f32, x2: f32, y2: f32, cx: f32, cy: f32, r: f32) -> bool {
    // Distance from the circle center to the nearest point of the box.
    let dx = (x1 - cx).max(0.0).max(cx - x2);
    let dy = (y1 - cy).max(0.0).max(cy - y2);
    dx * dx + dy * dy <= r * r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_accepts_everything() {
        let grid = CollisionGrid::new(25.0);
        assert!(!grid.hit_test_box(&[0.0, 0.0, 100.0, 100.0]));
        assert!(!grid.hit_test_circle(&[50.0, 50.0, 10.0]));
    }

    #[test]
    fn box_box_overlap() {
        let mut grid = CollisionGrid::new(25.0);
        grid.insert_box([10.0, 10.0, 50.0, 50.0]);
        assert!(grid.hit_test_box(&[40.0, 40.0, 80.0, 80.0]));
        assert!(!grid.hit_test_box(&[51.0, 51.0, 80.0, 80.0]));
        // Touching edges count as a hit.
        assert!(grid.hit_test_box(&[50.0, 10.0, 80.0, 50.0]));
    }

    #[test]
    fn box_circle_overlap() {
        let mut grid = CollisionGrid::new(25.0);
        grid.insert_circle([100.0, 100.0, 10.0]);
        assert!(grid.hit_test_box(&[105.0, 95.0, 140.0, 140.0]));
        // Close to the corner but outside the radius.
        assert!(!grid.hit_test_box(&[108.0, 108.0, 140.0, 140.0]));
    }

    #[test]
    fn circle_circle_overlap() {
        let mut grid = CollisionGrid::new(25.0);
        grid.insert_box([0.0, 0.0, 20.0, 20.0]);
        grid.insert_circle([100.0, 100.0, 10.0]);
        assert!(grid.hit_test_circle(&[115.0, 100.0, 6.0]));
        assert!(!grid.hit_test_circle(&[120.0, 100.0, 6.0]));
        assert!(grid.hit_test_circle(&[25.0, 10.0, 6.0]));
    }

    #[test]
    fn large_primitives_span_many_cells() {
        let mut grid = CollisionGrid::new(25.0);
        grid.insert_box([0.0, 0.0, 500.0, 10.0]);
        // Hit from a far cell that only the spanning box touches.
        assert!(grid.hit_test_circle(&[480.0, 5.0, 2.0]));
    }
}
