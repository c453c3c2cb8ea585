//! Geometric primitives shared by the index, the hierarchy and the ROIs.
//!
//! Provides:
//! - `Point` and `Rect` tuple types
//! - the `HasBBox` trait
//! - bounding box helpers (union, degeneracy, strict intersection)

/// Small epsilon for floating-point comparisons.
pub const EPSILON: f64 = 1e-9;

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// A rectangle defined by (x0, y0, x1, y1) where (x0, y0) is the minimum corner
/// and (x1, y1) the maximum corner.
pub type Rect = (f64, f64, f64, f64);

/// Compares two floats for approximate equality.
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Builds a `Rect` from a minimum corner and a size.
#[inline]
pub const fn rect_from_xywh(x: f64, y: f64, width: f64, height: f64) -> Rect {
    (x, y, x + width, y + height)
}

/// Trait for objects that have a bounding box.
pub trait HasBBox {
    fn x0(&self) -> f64;
    fn y0(&self) -> f64;
    fn x1(&self) -> f64;
    fn y1(&self) -> f64;

    fn bbox(&self) -> Rect {
        (self.x0(), self.y0(), self.x1(), self.y1())
    }

    fn width(&self) -> f64 {
        self.x1() - self.x0()
    }

    fn height(&self) -> f64 {
        self.y1() - self.y0()
    }
}

impl HasBBox for Rect {
    fn x0(&self) -> f64 {
        self.0
    }

    fn y0(&self) -> f64 {
        self.1
    }

    fn x1(&self) -> f64 {
        self.2
    }

    fn y1(&self) -> f64 {
        self.3
    }
}

/// Calculate union of two bounding boxes
pub const fn bbox_union(a: Rect, b: Rect) -> Rect {
    (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3))
}

/// A box with no area: zero (or negative) width or height.
#[inline]
pub fn bbox_is_degenerate(bbox: Rect) -> bool {
    bbox.2 - bbox.0 <= 0.0 || bbox.3 - bbox.1 <= 0.0
}

/// Strict intersection: boxes sharing only an edge do not intersect.
#[inline]
pub fn bbox_intersects(a: Rect, b: Rect) -> bool {
    !(a.2 <= b.0 || b.2 <= a.0 || a.3 <= b.1 || b.3 <= a.1)
}

/// Index pruning rule: a degenerate box on either side is never pruned.
#[inline]
pub fn bbox_may_overlap(node: Rect, query: Rect) -> bool {
    bbox_is_degenerate(node) || bbox_is_degenerate(query) || bbox_intersects(node, query)
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Point, b: Point) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Bounding box of a set of points, `None` when there are no points.
pub fn points_bbox(points: &[Point]) -> Option<Rect> {
    points
        .iter()
        .map(|&(x, y)| (x, y, x, y))
        .reduce(bbox_union)
}
