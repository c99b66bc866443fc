//! Polygon types for closed contours.
//!
//! A `Polygon` is implicitly closed (the last point connects back to the
//! first). Outer contours are counter-clockwise (positive area), holes are
//! clockwise (negative area). `Polygons` preserves insertion order; the
//! emission pipeline depends on that order being stable.

use super::{BoundingBox, Point};
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut, Index, IndexMut};

/// A closed polygon defined by a sequence of points.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Create a new empty polygon.
    #[inline]
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a polygon from a vector of points.
    #[inline]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Get the points of this polygon.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Add a point to the polygon.
    #[inline]
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Signed area in square micrometers. Positive for counter-clockwise.
    pub fn area(&self) -> CoordF {
        if self.points.len() < 3 {
            return 0.0;
        }
        let mut sum: i128 = 0;
        let n = self.points.len();
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            sum += (p.x as i128) * (q.y as i128) - (q.x as i128) * (p.y as i128);
        }
        sum as CoordF / 2.0
    }

    /// Whether the polygon winds counter-clockwise (an outer contour).
    #[inline]
    pub fn is_outer(&self) -> bool {
        self.area() >= 0.0
    }

    /// Reverse the winding direction.
    #[inline]
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Centroid of the vertices.
    pub fn centroid(&self) -> Point {
        if self.points.is_empty() {
            return Point::zero();
        }
        let mut x: i128 = 0;
        let mut y: i128 = 0;
        for p in &self.points {
            x += p.x as i128;
            y += p.y as i128;
        }
        let n = self.points.len() as i128;
        Point::new((x / n) as i64, (y / n) as i64)
    }

    /// Total length of the closed contour, in micrometers.
    pub fn perimeter_length(&self) -> CoordF {
        if self.points.len() < 2 {
            return 0.0;
        }
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    /// Even-odd test for whether `point` lies inside the contour.
    pub fn inside(&self, point: Point) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut crossings = 0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            if (a.y > point.y) != (b.y > point.y) {
                let t = (point.y - a.y) as f64 / (b.y - a.y) as f64;
                let x = a.x as f64 + t * (b.x - a.x) as f64;
                if (point.x as f64) < x {
                    crossings += 1;
                }
            }
        }
        crossings % 2 == 1
    }

    /// The vertex closest to the given point.
    pub fn closest_point_to(&self, point: Point) -> Point {
        self.points[self.closest_index_to(point)]
    }

    /// Index of the vertex closest to the given point.
    pub fn closest_index_to(&self, point: Point) -> usize {
        let mut best = 0;
        let mut best_dist = i128::MAX;
        for (i, p) in self.points.iter().enumerate() {
            let d = p.distance_squared(&point);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    /// Axis-aligned bounding box of the vertices.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::new();
        for p in &self.points {
            bbox.merge_point(*p);
        }
        bbox
    }
}

impl Deref for Polygon {
    type Target = Vec<Point>;
    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

impl DerefMut for Polygon {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.points
    }
}

impl fmt::Debug for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polygon({} points)", self.points.len())
    }
}

impl FromIterator<Point> for Polygon {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// An ordered collection of polygons.
///
/// Iteration order matters: the planner walks polygons as stored (subject
/// only to the documented path-order optimisation), so callers must not
/// re-sort behind its back.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygons {
    polygons: Vec<Polygon>,
}

impl Polygons {
    /// Create a new empty collection.
    #[inline]
    pub fn new() -> Self {
        Self {
            polygons: Vec::new(),
        }
    }

    /// Create a collection from a vector of polygons.
    #[inline]
    pub fn from_vec(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    /// Add a polygon.
    #[inline]
    pub fn add(&mut self, polygon: Polygon) {
        self.polygons.push(polygon);
    }

    /// Append all polygons from another collection.
    #[inline]
    pub fn add_all(&mut self, other: &Polygons) {
        self.polygons.extend(other.polygons.iter().cloned());
    }

    /// Total unsigned area in square millimeters.
    pub fn area_mm2(&self) -> CoordF {
        let scale2 = crate::SCALING_FACTOR * crate::SCALING_FACTOR;
        self.polygons.iter().map(|p| p.area()).sum::<CoordF>() / scale2
    }

    /// Whether the point is inside the covered region (holes excluded).
    pub fn inside(&self, point: Point) -> bool {
        let mut crossings = 0;
        for poly in &self.polygons {
            if poly.inside(point) {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }

    /// Split into connected parts: each outer contour grouped with the
    /// holes it contains. Returns one `Polygons` per island.
    pub fn split_into_parts(&self) -> Vec<Polygons> {
        let mut parts: Vec<Polygons> = Vec::new();
        let mut outer_indices: Vec<usize> = Vec::new();

        for (i, poly) in self.polygons.iter().enumerate() {
            if poly.is_outer() {
                let mut part = Polygons::new();
                part.add(poly.clone());
                parts.push(part);
                outer_indices.push(i);
            }
        }

        for poly in self.polygons.iter().filter(|p| !p.is_outer()) {
            if poly.is_empty() {
                continue;
            }
            let probe = poly[0];
            for (part, &outer_idx) in parts.iter_mut().zip(&outer_indices) {
                if self.polygons[outer_idx].inside(probe) {
                    part.add(poly.clone());
                    break;
                }
            }
        }

        parts
    }

    /// Bounding box over all member polygons.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::new();
        for poly in &self.polygons {
            for p in poly.points() {
                bbox.merge_point(*p);
            }
        }
        bbox
    }
}

impl Deref for Polygons {
    type Target = Vec<Polygon>;
    fn deref(&self) -> &Self::Target {
        &self.polygons
    }
}

impl DerefMut for Polygons {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.polygons
    }
}

impl Index<usize> for Polygons {
    type Output = Polygon;
    fn index(&self, index: usize) -> &Polygon {
        &self.polygons[index]
    }
}

impl IndexMut<usize> for Polygons {
    fn index_mut(&mut self, index: usize) -> &mut Polygon {
        &mut self.polygons[index]
    }
}

impl fmt::Debug for Polygons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polygons({} contours)", self.polygons.len())
    }
}

impl FromIterator<Polygon> for Polygons {
    fn from_iter<I: IntoIterator<Item = Polygon>>(iter: I) -> Self {
        Self {
            polygons: iter.into_iter().collect(),
        }
    }
}
