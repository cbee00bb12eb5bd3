//! Occlusion primitives: pure predicates over segments, rectangles and circles.
//!
//! World space has x growing to the right and y growing downwards, matching
//! screen coordinates, so a rectangle's `top` is numerically smaller than its
//! `bottom`.

use serde::{Deserialize, Serialize};

/// A vector (or point) in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vector2 { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Returns the normalized vector, or zero for a zero-length input.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    /// Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Returns `self - other`.
    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn distance_squared(&self, other: &Vector2) -> f32 {
        self.sub(other).magnitude_squared()
    }

    /// Rotates the vector by `angle` radians (clockwise on screen, since y points down).
    pub fn rotated(&self, angle: f32) -> Vector2 {
        let (sin, cos) = angle.sin_cos();
        Vector2 {
            x: cos * self.x - sin * self.y,
            y: sin * self.x + cos * self.y,
        }
    }
}

/// Axis-aligned rectangle, built transiently per wall tile per query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Rect {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(
            self.left + self.width() / 2.0,
            self.top + self.height() / 2.0,
        )
    }

    /// Corners in the order (left, top), (left, bottom), (right, top), (right, bottom).
    pub fn corners(&self) -> [Vector2; 4] {
        [
            Vector2::new(self.left, self.top),
            Vector2::new(self.left, self.bottom),
            Vector2::new(self.right, self.top),
            Vector2::new(self.right, self.bottom),
        ]
    }

    /// Inclusive containment.
    pub fn contains(&self, point: Vector2) -> bool {
        point.x >= self.left
            && point.x <= self.right
            && point.y >= self.top
            && point.y <= self.bottom
    }
}

/// Collision hull of a player or a projectile impact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vector2,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Vector2, radius: f32) -> Self {
        Circle { center, radius }
    }
}

/// Tests whether the segment `(p1, p2) -> (dest1, dest2)` crosses the line
/// `first = border` strictly inside the segment, at a point whose second
/// coordinate lies in `[lower, upper]`.
///
/// The same function handles horizontal borders by passing the coordinates
/// in swapped order. A segment with no extent along the first axis runs
/// parallel to the border and never crosses it.
pub fn segment_crosses_border(
    p1: f32,
    p2: f32,
    dest1: f32,
    dest2: f32,
    border: f32,
    lower: f32,
    upper: f32,
) -> bool {
    let extent = dest1 - p1;
    if extent == 0.0 {
        return false;
    }

    let m = (border - p1) / extent;
    if !(m > 0.0 && m < 1.0) {
        return false;
    }

    let crossing = p2 + m * (dest2 - p2);
    lower <= crossing && crossing <= upper
}

/// Returns true if the segment crosses any of the rectangle's four borders.
pub fn segment_intersects_rect(rect: &Rect, start: Vector2, end: Vector2) -> bool {
    segment_crosses_border(start.x, start.y, end.x, end.y, rect.left, rect.top, rect.bottom)
        || segment_crosses_border(start.x, start.y, end.x, end.y, rect.right, rect.top, rect.bottom)
        || segment_crosses_border(start.y, start.x, end.y, end.x, rect.top, rect.left, rect.right)
        || segment_crosses_border(start.y, start.x, end.y, end.x, rect.bottom, rect.left, rect.right)
}

/// Closest-point test between a circle and an axis-aligned rectangle.
/// Touching counts as intersecting.
pub fn circle_intersects_rect(rect: &Rect, circle: &Circle) -> bool {
    let center = rect.center();
    let half_width = rect.width() / 2.0;
    let half_height = rect.height() / 2.0;

    let dist_x = (circle.center.x - center.x).abs();
    let dist_y = (circle.center.y - center.y).abs();

    if dist_x > half_width + circle.radius || dist_y > half_height + circle.radius {
        return false;
    }

    if dist_x <= half_width || dist_y <= half_height {
        return true;
    }

    let corner_x = dist_x - half_width;
    let corner_y = dist_y - half_height;
    corner_x * corner_x + corner_y * corner_y <= circle.radius * circle.radius
}
