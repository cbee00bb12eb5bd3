//! Shadow casting from a viewpoint against the wall tiles of a grid.
//!
//! Each wall tile hides a region of the map behind it. That region is a convex
//! polygon bounded by the tile's two silhouette corners, the rays from the
//! viewpoint through those corners, and the edge of the visible region.
//! Unioned over every wall tile, these polygons form the occlusion mask.

use crate::geometry::{segment_crosses_border, segment_intersects_rect, Rect, Vector2};
use crate::grid::TileGrid;

/// Substituted for a zero ray component so the boundary equations stay finite.
const DIRECTION_EPSILON: f32 = 1e-10;

/// Consecutive polygon points closer than this are merged.
const MERGE_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

/// The occluded region behind one wall tile. Recomputed every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowPolygon {
    points: Vec<Vector2>,
}

impl ShadowPolygon {
    pub fn points(&self) -> &[Vector2] {
        &self.points
    }

    /// Point-in-polygon for a convex polygon of either winding. Points on the
    /// outline count as inside.
    #[cfg(test)]
    pub fn contains(&self, point: Vector2) -> bool {
        let n = self.points.len();
        let mut sign = 0.0f32;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let side = cross(b.sub(&a), point.sub(&a));
            if side == 0.0 {
                continue;
            }
            if sign == 0.0 {
                sign = side.signum();
            } else if side.signum() != sign {
                return false;
            }
        }
        true
    }
}

fn cross(a: Vector2, b: Vector2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Picks the two corners of `tile` that bound its silhouette as seen from
/// `viewpoint`, or `None` when the tile casts no shadow of its own.
fn silhouette_corners(viewpoint: Vector2, tile: &Rect) -> Option<(Vector2, Vector2)> {
    let mut visible: Vec<Vector2> = Vec::with_capacity(4);

    for corner in tile.corners() {
        let other_x = if corner.x == tile.left {
            tile.right
        } else {
            tile.left
        };
        let other_y = if corner.y == tile.top {
            tile.bottom
        } else {
            tile.top
        };

        // A corner is hidden when the sight line reaches it through the tile.
        let hidden = segment_crosses_border(
            viewpoint.x,
            viewpoint.y,
            corner.x,
            corner.y,
            other_x,
            tile.top,
            tile.bottom,
        ) || segment_crosses_border(
            viewpoint.y,
            viewpoint.x,
            corner.y,
            corner.x,
            other_y,
            tile.left,
            tile.right,
        );

        if !hidden {
            visible.push(corner);
        }
    }

    match visible.len() {
        2 => Some((visible[0], visible[1])),
        3 => {
            // The corner nearest the viewpoint shares its x with one neighbour
            // and its y with the other; it is not on the silhouette.
            let redundant = (0..3).find(|&i| {
                let prev = visible[(i + 2) % 3];
                let next = visible[(i + 1) % 3];
                visible[i] == Vector2::new(prev.x, next.y)
                    || visible[i] == Vector2::new(next.x, prev.y)
            })?;
            visible.remove(redundant);
            Some((visible[0], visible[1]))
        }
        _ => None,
    }
}

/// Follows the ray from `viewpoint` through `through` to the first crossing
/// of the bounds. The returned point lies exactly on the reported edge.
fn extend_to_bounds(viewpoint: Vector2, through: Vector2, bounds: &Rect) -> Option<(Vector2, Edge)> {
    let mut dx = through.x - viewpoint.x;
    if dx == 0.0 {
        dx = DIRECTION_EPSILON;
    }
    let mut dy = through.y - viewpoint.y;
    if dy == 0.0 {
        dy = DIRECTION_EPSILON;
    }

    let candidates = [
        (Edge::Left, (bounds.left - viewpoint.x) / dx),
        (Edge::Right, (bounds.right - viewpoint.x) / dx),
        (Edge::Top, (bounds.top - viewpoint.y) / dy),
        (Edge::Bottom, (bounds.bottom - viewpoint.y) / dy),
    ];

    let (edge, m) = candidates
        .into_iter()
        .filter(|(_, m)| *m > 0.0 && m.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    let x = (viewpoint.x + m * dx).clamp(bounds.left, bounds.right);
    let y = (viewpoint.y + m * dy).clamp(bounds.top, bounds.bottom);
    let exit = match edge {
        Edge::Left => Vector2::new(bounds.left, y),
        Edge::Right => Vector2::new(bounds.right, y),
        Edge::Top => Vector2::new(x, bounds.top),
        Edge::Bottom => Vector2::new(x, bounds.bottom),
    };
    Some((exit, edge))
}

/// Distance along the boundary, walking clockwise on screen from the
/// top-left corner.
fn perimeter_position(bounds: &Rect, point: Vector2, edge: Edge) -> f32 {
    let (w, h) = (bounds.width(), bounds.height());
    let perimeter = 2.0 * (w + h);
    let t = match edge {
        Edge::Top => point.x - bounds.left,
        Edge::Right => w + (point.y - bounds.top),
        Edge::Bottom => w + h + (bounds.right - point.x),
        Edge::Left => 2.0 * w + h + (bounds.bottom - point.y),
    };
    t.rem_euclid(perimeter)
}

/// Boundary corners passed when walking from one exit to the other in the
/// given direction, in walking order.
fn corners_between(bounds: &Rect, from: f32, to: f32, clockwise: bool) -> Vec<Vector2> {
    let (w, h) = (bounds.width(), bounds.height());
    let perimeter = 2.0 * (w + h);
    let corners = [
        (0.0, Vector2::new(bounds.left, bounds.top)),
        (w, Vector2::new(bounds.right, bounds.top)),
        (w + h, Vector2::new(bounds.right, bounds.bottom)),
        (2.0 * w + h, Vector2::new(bounds.left, bounds.bottom)),
    ];

    let span = if clockwise {
        (to - from).rem_euclid(perimeter)
    } else {
        (from - to).rem_euclid(perimeter)
    };

    let mut passed: Vec<(f32, Vector2)> = corners
        .iter()
        .map(|&(t, corner)| {
            let offset = if clockwise {
                (t - from).rem_euclid(perimeter)
            } else {
                (from - t).rem_euclid(perimeter)
            };
            (offset, corner)
        })
        .filter(|(offset, _)| *offset > 0.0 && *offset < span)
        .collect();
    passed.sort_by(|a, b| a.0.total_cmp(&b.0));
    passed.into_iter().map(|(_, corner)| corner).collect()
}

/// Computes the region hidden behind `tile` from `viewpoint`, clipped to `bounds`.
///
/// Returns `None` when the tile casts no shadow of its own (the viewpoint is
/// inside it, or only one corner is exposed) and when the viewpoint lies
/// outside `bounds`. The polygon runs silhouette corner, boundary exit,
/// boundary corners, boundary exit, silhouette corner. It is convex and lies
/// within `bounds`. It has 3 to 6 vertices whenever the tile spans at most a
/// right angle from the viewpoint.
pub fn cast_shadow(viewpoint: Vector2, tile: &Rect, bounds: &Rect) -> Option<ShadowPolygon> {
    if !bounds.contains(viewpoint) {
        return None;
    }

    let (first, second) = silhouette_corners(viewpoint, tile)?;
    let turn = cross(first.sub(&viewpoint), second.sub(&viewpoint));
    if turn == 0.0 {
        return None;
    }

    let (first_exit, first_edge) = extend_to_bounds(viewpoint, first, bounds)?;
    let (second_exit, second_edge) = extend_to_bounds(viewpoint, second, bounds)?;

    // Walk the boundary the same way the wedge sweeps from the first ray to the second.
    let between = corners_between(
        bounds,
        perimeter_position(bounds, first_exit, first_edge),
        perimeter_position(bounds, second_exit, second_edge),
        turn > 0.0,
    );

    let mut points: Vec<Vector2> = Vec::with_capacity(4 + between.len());
    let outline = std::iter::once(first)
        .chain(std::iter::once(first_exit))
        .chain(between)
        .chain(std::iter::once(second_exit))
        .chain(std::iter::once(second));
    for point in outline {
        let duplicate = points
            .last()
            .is_some_and(|last| last.distance_squared(&point) < MERGE_EPSILON * MERGE_EPSILON);
        if !duplicate {
            points.push(point);
        }
    }

    if points.len() < 3 {
        return None;
    }
    Some(ShadowPolygon { points })
}

/// Shadow polygons for every wall tile of the grid.
pub fn cast_shadows(grid: &TileGrid, viewpoint: Vector2) -> Vec<ShadowPolygon> {
    let bounds = grid.world_bounds();
    grid.wall_rects()
        .filter_map(|tile| cast_shadow(viewpoint, &tile, &bounds))
        .collect()
}

/// True unless the sight line from `from` to `to` passes through a wall tile.
pub fn is_visible(grid: &TileGrid, from: Vector2, to: Vector2) -> bool {
    !grid
        .wall_rects()
        .any(|tile| segment_intersects_rect(&tile, from, to))
}

/// Coarse coverage raster of the occluded area. Cells are covered when their
/// center falls inside any shadow polygon.
#[derive(Debug, Clone)]
pub struct OcclusionMask {
    bounds: Rect,
    cell_size: f32,
    cols: usize,
    rows: usize,
    covered: Vec<bool>,
}

impl OcclusionMask {
    pub fn new(bounds: Rect, cell_size: f32) -> Self {
        let cell_size = cell_size.max(1.0);
        let cols = (bounds.width() / cell_size).ceil().max(0.0) as usize;
        let rows = (bounds.height() / cell_size).ceil().max(0.0) as usize;
        OcclusionMask {
            bounds,
            cell_size,
            cols,
            rows,
            covered: vec![false; cols * rows],
        }
    }

    /// Builds the union of every wall tile's shadow from `viewpoint`.
    pub fn from_grid(grid: &TileGrid, viewpoint: Vector2, cell_size: f32) -> Self {
        let mut mask = OcclusionMask::new(grid.world_bounds(), cell_size);
        for polygon in cast_shadows(grid, viewpoint) {
            mask.fill(&polygon);
        }
        mask
    }

    /// Scanline-fills a convex polygon into the mask.
    pub fn fill(&mut self, polygon: &ShadowPolygon) {
        let points = polygon.points();
        if points.len() < 3 || self.cols == 0 {
            return;
        }

        let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        let first_row = (((min_y - self.bounds.top) / self.cell_size - 0.5).ceil()).max(0.0) as usize;
        let last_row = (((max_y - self.bounds.top) / self.cell_size - 0.5).floor()).max(-1.0);
        if last_row < 0.0 {
            return;
        }
        let last_row = (last_row as usize).min(self.rows.saturating_sub(1));

        for row in first_row..=last_row {
            let y = self.bounds.top + (row as f32 + 0.5) * self.cell_size;
            let mut span: Option<(f32, f32)> = None;

            for i in 0..points.len() {
                let a = points[i];
                let b = points[(i + 1) % points.len()];
                let crosses = (a.y <= y && y < b.y) || (b.y <= y && y < a.y);
                if !crosses {
                    continue;
                }
                let x = a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y);
                span = Some(match span {
                    Some((lo, hi)) => (lo.min(x), hi.max(x)),
                    None => (x, x),
                });
            }

            let Some((lo, hi)) = span else {
                continue;
            };
            let first_col = (((lo - self.bounds.left) / self.cell_size - 0.5).ceil()).max(0.0) as usize;
            let last_col = ((hi - self.bounds.left) / self.cell_size - 0.5).floor();
            if last_col < 0.0 {
                continue;
            }
            let last_col = (last_col as usize).min(self.cols - 1);
            for col in first_col..=last_col {
                self.covered[row * self.cols + col] = true;
            }
        }
    }

    /// Whether the cell containing `point` is occluded. Points off the mask are not.
    #[cfg(test)]
    pub fn is_covered(&self, point: Vector2) -> bool {
        let col = ((point.x - self.bounds.left) / self.cell_size).floor();
        let row = ((point.y - self.bounds.top) / self.cell_size).floor();
        if col < 0.0 || row < 0.0 {
            return false;
        }
        let (col, row) = (col as usize, row as usize);
        col < self.cols && row < self.rows && self.covered[row * self.cols + col]
    }

    #[cfg(test)]
    pub fn covered_count(&self) -> usize {
        self.covered.iter().filter(|c| **c).count()
    }

    /// Horizontal runs of covered cells as world-space rectangles, for drawing.
    pub fn runs(&self) -> Vec<Rect> {
        let mut runs = Vec::new();
        for row in 0..self.rows {
            let top = self.bounds.top + row as f32 * self.cell_size;
            let bottom = (top + self.cell_size).min(self.bounds.bottom);
            let mut start: Option<usize> = None;

            for col in 0..=self.cols {
                let covered = col < self.cols && self.covered[row * self.cols + col];
                match (covered, start) {
                    (true, None) => start = Some(col),
                    (false, Some(first)) => {
                        let left = self.bounds.left + first as f32 * self.cell_size;
                        let right = (self.bounds.left + col as f32 * self.cell_size)
                            .min(self.bounds.right);
                        runs.push(Rect::new(left, right, top, bottom));
                        start = None;
                    }
                    _ => {}
                }
            }
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::REFERENCE_MAP;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn bounds() -> Rect {
        Rect::new(0.0, 800.0, 0.0, 800.0)
    }

    fn center_tile() -> Rect {
        Rect::new(400.0, 450.0, 400.0, 450.0)
    }

    fn assert_convex_within(polygon: &ShadowPolygon, bounds: &Rect) {
        let points = polygon.points();
        for p in points {
            assert!(
                p.x >= bounds.left - 1e-3
                    && p.x <= bounds.right + 1e-3
                    && p.y >= bounds.top - 1e-3
                    && p.y <= bounds.bottom + 1e-3,
                "{:?} escapes bounds",
                p
            );
        }

        let n = points.len();
        let mut positive = false;
        let mut negative = false;
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            let c = points[(i + 2) % n];
            let turn = cross(b.sub(&a), c.sub(&b));
            if turn > 1.0 {
                positive = true;
            }
            if turn < -1.0 {
                negative = true;
            }
        }
        assert!(!(positive && negative), "polygon is not convex: {:?}", points);
    }

    #[test]
    fn test_shadow_from_the_side() {
        let polygon = cast_shadow(Vector2::new(100.0, 425.0), &center_tile(), &bounds()).unwrap();
        let points = polygon.points();

        assert_eq!(points.len(), 4);
        assert_eq!(points[0], Vector2::new(400.0, 400.0));
        assert_eq!(points[1].x, 800.0);
        assert_approx_eq!(points[1].y, 425.0 - 700.0 / 12.0, 1e-3);
        assert_eq!(points[2].x, 800.0);
        assert_approx_eq!(points[2].y, 425.0 + 700.0 / 12.0, 1e-3);
        assert_eq!(points[3], Vector2::new(400.0, 450.0));

        assert!(polygon.contains(Vector2::new(600.0, 425.0)));
        assert!(!polygon.contains(Vector2::new(600.0, 300.0)));
        assert!(!polygon.contains(Vector2::new(300.0, 425.0)));
    }

    #[test]
    fn test_shadow_from_the_diagonal_wraps_corner() {
        let polygon = cast_shadow(Vector2::new(100.0, 100.0), &center_tile(), &bounds()).unwrap();
        let points = polygon.points();

        assert_eq!(points.len(), 5);
        assert_eq!(points[0], Vector2::new(400.0, 450.0));
        assert_approx_eq!(points[1].x, 700.0, 1e-3);
        assert_eq!(points[1].y, 800.0);
        assert_eq!(points[2], Vector2::new(800.0, 800.0));
        assert_eq!(points[3].x, 800.0);
        assert_approx_eq!(points[3].y, 700.0, 1e-3);
        assert_eq!(points[4], Vector2::new(450.0, 400.0));

        assert!(polygon.contains(Vector2::new(700.0, 700.0)));
        assert!(!polygon.contains(Vector2::new(300.0, 300.0)));
    }

    #[test]
    fn test_shadow_of_boundary_tile_has_three_points() {
        let tile = Rect::new(0.0, 50.0, 0.0, 50.0);
        let polygon = cast_shadow(Vector2::new(400.0, 400.0), &tile, &bounds()).unwrap();
        assert_eq!(
            polygon.points(),
            &[
                Vector2::new(0.0, 50.0),
                Vector2::new(0.0, 0.0),
                Vector2::new(50.0, 0.0)
            ]
        );
    }

    #[test]
    fn test_shadow_spanning_opposite_edges() {
        // A wide wall just above the viewer throws its shadow across the whole top.
        let tile = Rect::new(100.0, 700.0, 300.0, 350.0);
        let polygon = cast_shadow(Vector2::new(400.0, 400.0), &tile, &bounds()).unwrap();
        let points = polygon.points();

        assert_eq!(points.len(), 6);
        assert!(points.contains(&Vector2::new(0.0, 0.0)));
        assert!(points.contains(&Vector2::new(800.0, 0.0)));
        assert!(polygon.contains(Vector2::new(400.0, 100.0)));
        assert!(!polygon.contains(Vector2::new(400.0, 600.0)));
        assert_convex_within(&polygon, &bounds());
    }

    #[test]
    fn test_viewpoint_inside_tile_casts_nothing() {
        assert!(cast_shadow(Vector2::new(425.0, 425.0), &center_tile(), &bounds()).is_none());
    }

    #[test]
    fn test_viewpoint_outside_bounds_casts_nothing() {
        assert!(cast_shadow(Vector2::new(-5.0, 425.0), &center_tile(), &bounds()).is_none());
    }

    #[test]
    fn test_axis_aligned_viewpoint_uses_epsilon() {
        // Viewpoint level with the tile's top edge: one ray is exactly horizontal.
        let polygon = cast_shadow(Vector2::new(100.0, 400.0), &center_tile(), &bounds()).unwrap();
        let points = polygon.points();
        assert_eq!(points[0], Vector2::new(400.0, 400.0));
        assert_eq!(points[1], Vector2::new(800.0, 400.0));
        assert_convex_within(&polygon, &bounds());
    }

    #[test]
    fn test_shadows_convex_and_bounded_from_every_open_tile() {
        let grid = TileGrid::from_rows(&REFERENCE_MAP, Vector2::new(800.0, 800.0)).unwrap();
        let bounds = grid.world_bounds();
        let mut checked = 0;

        for ty in 0..16 {
            for tx in 0..16 {
                if grid.is_wall(tx, ty) {
                    continue;
                }
                let viewpoint = grid.tile_rect(tx, ty).center();
                for polygon in cast_shadows(&grid, viewpoint) {
                    assert!((3..=6).contains(&polygon.points().len()));
                    assert_convex_within(&polygon, &bounds);
                    checked += 1;
                }
            }
        }

        assert!(checked > 1000);
    }

    #[test]
    fn test_shadows_convex_from_random_viewpoints() {
        let mut rng = StdRng::seed_from_u64(3);
        let bounds = bounds();
        let mut checked = 0;

        for _ in 0..2000 {
            let tx = rng.gen_range(0..16) as f32 * 50.0;
            let ty = rng.gen_range(0..16) as f32 * 50.0;
            let tile = Rect::new(tx, tx + 50.0, ty, ty + 50.0);
            let viewpoint = Vector2::new(rng.gen_range(0.0..800.0), rng.gen_range(0.0..800.0));

            let nearest = Vector2::new(
                viewpoint.x.clamp(tile.left, tile.right),
                viewpoint.y.clamp(tile.top, tile.bottom),
            );
            if nearest.distance_squared(&viewpoint) < 25.0 * 25.0 {
                continue;
            }

            let polygon = cast_shadow(viewpoint, &tile, &bounds).unwrap();
            assert!((3..=6).contains(&polygon.points().len()));
            assert_convex_within(&polygon, &bounds);
            // The far corner of the tile is always in its own shadow.
            assert!(!polygon.contains(viewpoint));
            checked += 1;
        }

        assert!(checked > 1000);
    }

    #[test]
    fn test_visibility_through_walls() {
        let grid = TileGrid::from_rows(&["     ", "  #  ", "     "], Vector2::new(50.0, 30.0)).unwrap();
        // Wall occupies x 20..30, y 10..20
        assert!(!is_visible(&grid, Vector2::new(5.0, 15.0), Vector2::new(45.0, 15.0)));
        assert!(is_visible(&grid, Vector2::new(5.0, 5.0), Vector2::new(45.0, 5.0)));
    }

    #[test]
    fn test_empty_grid_hides_nothing() {
        let grid = TileGrid::from_rows(&["    ", "    "], Vector2::new(400.0, 200.0)).unwrap();
        assert!(cast_shadows(&grid, Vector2::new(10.0, 10.0)).is_empty());
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let a = Vector2::new(rng.gen_range(-50.0..450.0), rng.gen_range(-50.0..250.0));
            let b = Vector2::new(rng.gen_range(-50.0..450.0), rng.gen_range(-50.0..250.0));
            assert!(is_visible(&grid, a, b));
        }
        let mask = OcclusionMask::from_grid(&grid, Vector2::new(10.0, 10.0), 10.0);
        assert_eq!(mask.covered_count(), 0);
        assert!(mask.runs().is_empty());
    }

    #[test]
    fn test_mask_fill_matches_polygon() {
        let polygon = cast_shadow(Vector2::new(100.0, 425.0), &center_tile(), &bounds()).unwrap();
        let mut mask = OcclusionMask::new(bounds(), 10.0);
        mask.fill(&polygon);

        assert!(mask.is_covered(Vector2::new(600.0, 425.0)));
        assert!(mask.is_covered(Vector2::new(795.0, 425.0)));
        assert!(!mask.is_covered(Vector2::new(600.0, 300.0)));
        assert!(!mask.is_covered(Vector2::new(200.0, 425.0)));
        assert!(!mask.is_covered(Vector2::new(-5.0, 425.0)));

        for run in mask.runs() {
            assert!(polygon.contains(run.center()) || run.width() <= 20.0);
        }
    }

    #[test]
    fn test_mask_union_of_overlapping_shadows() {
        let viewpoint = Vector2::new(100.0, 425.0);
        let near = cast_shadow(viewpoint, &Rect::new(400.0, 450.0, 400.0, 450.0), &bounds()).unwrap();
        let far = cast_shadow(viewpoint, &Rect::new(600.0, 650.0, 400.0, 450.0), &bounds()).unwrap();

        let mut both = OcclusionMask::new(bounds(), 10.0);
        both.fill(&near);
        both.fill(&far);
        let mut alone = OcclusionMask::new(bounds(), 10.0);
        alone.fill(&near);

        // The far tile sits entirely inside the near tile's shadow.
        assert_eq!(both.covered_count(), alone.covered_count());
    }
}
