//! Axis-aligned bounding boxes.

use super::Point;
use crate::Coord;
use serde::{Deserialize, Serialize};

/// An axis-aligned 2D bounding box in micrometer coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Create a new empty (inverted) bounding box.
    pub fn new() -> Self {
        Self {
            min: Point::new(Coord::MAX, Coord::MAX),
            max: Point::new(Coord::MIN, Coord::MIN),
        }
    }

    /// Whether no point has been merged yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand to include the given point.
    pub fn merge_point(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Expand to include another bounding box.
    pub fn merge(&mut self, other: &BoundingBox) {
        if !other.is_empty() {
            self.merge_point(other.min);
            self.merge_point(other.max);
        }
    }

    /// Width along X.
    #[inline]
    pub fn width(&self) -> Coord {
        self.max.x - self.min.x
    }

    /// Height along Y.
    #[inline]
    pub fn height(&self) -> Coord {
        self.max.y - self.min.y
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2,
            (self.min.y + self.max.y) / 2,
        )
    }

    /// Whether the two boxes overlap.
    pub fn hit(&self, other: &BoundingBox) -> bool {
        !(self.is_empty()
            || other.is_empty()
            || self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_merge() {
        let mut bbox = BoundingBox::new();
        assert!(bbox.is_empty());
        bbox.merge_point(Point::new(10, 20));
        bbox.merge_point(Point::new(-5, 40));
        assert_eq!(bbox.min, Point::new(-5, 20));
        assert_eq!(bbox.max, Point::new(10, 40));
        assert_eq!(bbox.width(), 15);
        assert_eq!(bbox.height(), 20);
    }

    #[test]
    fn test_bbox_hit() {
        let mut a = BoundingBox::new();
        a.merge_point(Point::new(0, 0));
        a.merge_point(Point::new(10, 10));
        let mut b = BoundingBox::new();
        b.merge_point(Point::new(5, 5));
        b.merge_point(Point::new(20, 20));
        let mut c = BoundingBox::new();
        c.merge_point(Point::new(50, 50));
        c.merge_point(Point::new(60, 60));
        assert!(a.hit(&b));
        assert!(!a.hit(&c));
    }
}
