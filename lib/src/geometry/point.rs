//! Point types for 2D and 3D geometry.
//!
//! Points use scaled integer coordinates (1 unit = 1 micrometer) to avoid
//! floating-point drift between runs.

use crate::{scale, unscale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A 2D point with integer micrometer coordinates.
///
/// # Example
/// ```
/// use layercode::geometry::Point;
///
/// // A point at (1mm, 2mm)
/// let p = Point::new(1_000, 2_000);
/// let q = Point::new_scale(1.0, 2.0);
/// assert_eq!(p, q);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    /// Create a new point with the given micrometer coordinates.
    #[inline]
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// Create a new point from millimeter coordinates, scaling them.
    #[inline]
    pub fn new_scale(x: CoordF, y: CoordF) -> Self {
        Self {
            x: scale(x),
            y: scale(y),
        }
    }

    /// Create a point at the origin (0, 0).
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Squared distance to another point. Returns i128 to avoid overflow.
    #[inline]
    pub fn distance_squared(&self, other: &Point) -> i128 {
        let dx = (other.x - self.x) as i128;
        let dy = (other.y - self.y) as i128;
        dx * dx + dy * dy
    }

    /// Distance to another point, in micrometers.
    #[inline]
    pub fn distance(&self, other: &Point) -> CoordF {
        (self.distance_squared(other) as CoordF).sqrt()
    }

    /// Distance to another point, in millimeters.
    #[inline]
    pub fn distance_mm(&self, other: &Point) -> CoordF {
        self.distance(other) / crate::SCALING_FACTOR
    }

    /// Length of this point as a vector from the origin.
    #[inline]
    pub fn length(&self) -> CoordF {
        let x = self.x as CoordF;
        let y = self.y as CoordF;
        (x * x + y * y).sqrt()
    }

    /// Rotate this point by the given angle (radians) around the origin.
    #[inline]
    pub fn rotate(&self, angle: CoordF) -> Self {
        let cos_a = angle.cos();
        let sin_a = angle.sin();
        let x = self.x as CoordF;
        let y = self.y as CoordF;
        Self {
            x: (cos_a * x - sin_a * y).round() as Coord,
            y: (cos_a * y + sin_a * x).round() as Coord,
        }
    }

    /// 2D pseudo-cross product with another point.
    #[inline]
    pub fn cross(&self, other: &Point) -> i128 {
        (self.x as i128) * (other.y as i128) - (self.y as i128) * (other.x as i128)
    }

    /// Dot product with another point.
    #[inline]
    pub fn dot(&self, other: &Point) -> i128 {
        (self.x as i128) * (other.x as i128) + (self.y as i128) * (other.y as i128)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", unscale(self.x), unscale(self.y))
    }
}

impl Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Point {
    #[inline]
    fn add_assign(&mut self, other: Point) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl SubAssign for Point {
    #[inline]
    fn sub_assign(&mut self, other: Point) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Neg for Point {
    type Output = Point;
    #[inline]
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<Coord> for Point {
    type Output = Point;
    #[inline]
    fn mul(self, factor: Coord) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

/// A 3D point with integer micrometer coordinates.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point3 {
    pub x: Coord,
    pub y: Coord,
    pub z: Coord,
}

impl Point3 {
    /// Create a new 3D point with the given micrometer coordinates.
    #[inline]
    pub const fn new(x: Coord, y: Coord, z: Coord) -> Self {
        Self { x, y, z }
    }

    /// Project onto the XY plane.
    #[inline]
    pub const fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl fmt::Debug for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_new_scale() {
        let p = Point::new_scale(1.5, -0.25);
        assert_eq!(p, Point::new(1500, -250));
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3000, 4000);
        assert_eq!(a.distance_squared(&b), 25_000_000);
        assert!((a.distance(&b) - 5000.0).abs() < 1e-9);
        assert!((a.distance_mm(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_rotate() {
        let p = Point::new(1000, 0);
        let r = p.rotate(std::f64::consts::FRAC_PI_2);
        assert_eq!(r, Point::new(0, 1000));
    }

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(10, 20);
        let b = Point::new(3, 4);
        assert_eq!(a + b, Point::new(13, 24));
        assert_eq!(a - b, Point::new(7, 16));
        assert_eq!(-a, Point::new(-10, -20));
        assert_eq!(b * 2, Point::new(6, 8));
    }

    #[test]
    fn test_point3_xy() {
        let p = Point3::new(1, 2, 3);
        assert_eq!(p.xy(), Point::new(1, 2));
    }
}
