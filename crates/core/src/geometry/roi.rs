use geo::{Area, BooleanOps, BoundingRect, Centroid, Contains, LineString, MultiPolygon, Polygon};
use geo::{Point as GeoPoint, Rect as GeoRect, coord};

use crate::utils::{
    EPSILON, HasBBox, Point, Rect, bbox_intersects, bbox_is_degenerate, points_bbox,
    rect_from_xywh,
};

/// Region of interest of a hierarchy object.
///
/// Rectangles use half-open containment (`x0 <= x < x1`), polygons use
/// interior containment, and points contain nothing by area.
#[derive(Debug, Clone, PartialEq)]
pub enum Roi {
    Points(Vec<Point>),
    Rectangle(Rect),
    Polygon(MultiPolygon<f64>),
}

impl Roi {
    pub fn point(x: f64, y: f64) -> Self {
        Self::Points(vec![(x, y)])
    }

    pub fn points(points: Vec<Point>) -> Self {
        Self::Points(points)
    }

    /// Rectangle from its minimum corner and size.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::Rectangle(rect_from_xywh(x, y, width, height))
    }

    /// Simple polygon from its exterior ring; the ring is closed if needed.
    pub fn polygon(exterior: Vec<Point>) -> Self {
        let ring = LineString::from(exterior);
        Self::Polygon(MultiPolygon::new(vec![Polygon::new(ring, vec![])]))
    }

    pub fn from_multi_polygon(shape: MultiPolygon<f64>) -> Self {
        Self::Polygon(shape)
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Self::Points(_))
    }

    /// A points ROI holding more than one point.
    pub fn is_multi_point(&self) -> bool {
        matches!(self, Self::Points(points) if points.len() > 1)
    }

    pub fn n_points(&self) -> usize {
        match self {
            Self::Points(points) => points.len(),
            Self::Rectangle(_) => 4,
            Self::Polygon(shape) => shape
                .0
                .iter()
                .map(|p| p.exterior().0.len() + p.interiors().iter().map(|r| r.0.len()).sum::<usize>())
                .sum(),
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Self::Points(_) => 0.0,
            Self::Rectangle(r) => (r.2 - r.0).max(0.0) * (r.3 - r.1).max(0.0),
            Self::Polygon(shape) => shape.unsigned_area(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Points(points) => points.is_empty(),
            Self::Rectangle(r) => bbox_is_degenerate(*r),
            Self::Polygon(_) => self.area() < EPSILON,
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Self::Points(points) => points_bbox(points).unwrap_or_default(),
            Self::Rectangle(r) => *r,
            Self::Polygon(shape) => shape
                .bounding_rect()
                .map(|r| (r.min().x, r.min().y, r.max().x, r.max().y))
                .unwrap_or_default(),
        }
    }

    pub fn centroid(&self) -> Point {
        match self {
            Self::Points(points) if points.is_empty() => (0.0, 0.0),
            Self::Points(points) => {
                let n = points.len() as f64;
                let (sx, sy) = points
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
                (sx / n, sy / n)
            }
            Self::Rectangle(r) => ((r.0 + r.2) / 2.0, (r.1 + r.3) / 2.0),
            Self::Polygon(shape) => shape.centroid().map(|c| (c.x(), c.y())).unwrap_or_else(|| {
                let b = self.bounds();
                ((b.0 + b.2) / 2.0, (b.1 + b.3) / 2.0)
            }),
        }
    }

    pub fn contains_point(&self, (x, y): Point) -> bool {
        match self {
            Self::Points(_) => false,
            Self::Rectangle(r) => r.0 <= x && x < r.2 && r.1 <= y && y < r.3,
            Self::Polygon(shape) => shape.contains(&GeoPoint::new(x, y)),
        }
    }

    /// True when the two regions share a part with non-zero area, or when a
    /// point of one lies inside the other.
    pub fn intersects(&self, other: &Roi) -> bool {
        match (self, other) {
            (Self::Points(a), Self::Points(b)) => a.iter().any(|p| b.contains(p)),
            (Self::Points(points), area) | (area, Self::Points(points)) => {
                points.iter().any(|&p| area.contains_point(p))
            }
            (Self::Rectangle(a), Self::Rectangle(b)) => bbox_intersects(*a, *b),
            _ => {
                bbox_intersects(self.bounds(), other.bounds())
                    && self.intersection(other).area() >= EPSILON
            }
        }
    }

    pub fn intersection(&self, other: &Roi) -> Roi {
        match (self, other) {
            (Self::Points(points), area) | (area, Self::Points(points)) => Self::Points(
                points
                    .iter()
                    .copied()
                    .filter(|&p| area.contains_point(p))
                    .collect(),
            ),
            (Self::Rectangle(a), Self::Rectangle(b)) => {
                let overlap = (a.0.max(b.0), a.1.max(b.1), a.2.min(b.2), a.3.min(b.3));
                if bbox_is_degenerate(overlap) {
                    Self::Polygon(MultiPolygon::new(vec![]))
                } else {
                    Self::Rectangle(overlap)
                }
            }
            _ => Self::Polygon(self.to_multi_polygon().intersection(&other.to_multi_polygon())),
        }
    }

    /// The part of `self` outside `other`.
    pub fn difference(&self, other: &Roi) -> Roi {
        match (self, other) {
            (Self::Points(points), area) => Self::Points(
                points
                    .iter()
                    .copied()
                    .filter(|&p| !area.contains_point(p))
                    .collect(),
            ),
            (_, Self::Points(_)) => self.clone(),
            _ => Self::Polygon(self.to_multi_polygon().difference(&other.to_multi_polygon())),
        }
    }

    /// Area shape of this ROI; points have no area and map to an empty shape.
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        match self {
            Self::Points(_) => MultiPolygon::new(vec![]),
            Self::Rectangle(r) => {
                let rect = GeoRect::new(coord! { x: r.0, y: r.1 }, coord! { x: r.2, y: r.3 });
                MultiPolygon::new(vec![rect.to_polygon()])
            }
            Self::Polygon(shape) => shape.clone(),
        }
    }
}

impl HasBBox for Roi {
    fn x0(&self) -> f64 {
        self.bounds().0
    }

    fn y0(&self) -> f64 {
        self.bounds().1
    }

    fn x1(&self) -> f64 {
        self.bounds().2
    }

    fn y1(&self) -> f64 {
        self.bounds().3
    }

    fn bbox(&self) -> Rect {
        self.bounds()
    }
}
