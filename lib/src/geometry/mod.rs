//! Geometry primitives for layer planning.
//!
//! All geometry is integer-micron: coordinates are `i64` micrometers so
//! that identical inputs always produce identical toolpaths.

mod bbox;
mod point;
mod polygon;

pub use bbox::BoundingBox;
pub use point::{Point, Point3};
pub use polygon::{Polygon, Polygons};
