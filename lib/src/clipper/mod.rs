//! Polygon boolean and offset operations.
//!
//! Thin wrapper over the geo-clipper library translating between the
//! crate's flat integer-micron [`Polygons`] model (holes are clockwise
//! members of the same collection) and geo's exterior/interior polygons.
//!
//! These operations back the wipe-tower inset generation, concentric
//! infill, skin offsetting and the bridge-angle support test.

use crate::geometry::{Point, Polygon, Polygons};
use crate::{scale, unscale, Coord};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

/// Fixed-point factor handed to clipper; 1000.0 keeps micron resolution.
const CLIPPER_FACTOR: f64 = 1000.0;

fn ring_to_linestring(poly: &Polygon) -> LineString<f64> {
    let mut coords: Vec<GeoCoord<f64>> = poly
        .points()
        .iter()
        .map(|p| GeoCoord {
            x: unscale(p.x),
            y: unscale(p.y),
        })
        .collect();
    // geo rings are explicitly closed
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    LineString::new(coords)
}

fn linestring_to_ring(line: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = line
        .coords()
        .map(|c| Point::new(scale(c.x), scale(c.y)))
        .collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Polygon::from_points(points)
}

/// Convert flat polygons (outer CCW contours plus CW holes) into geo's
/// exterior/interior representation.
fn to_geo_multi(polys: &Polygons) -> MultiPolygon<f64> {
    let parts = polys.split_into_parts();
    let geo_polys = parts
        .iter()
        .map(|part| {
            let exterior = ring_to_linestring(&part[0]);
            let interiors: Vec<LineString<f64>> =
                part.iter().skip(1).map(ring_to_linestring).collect();
            GeoPolygon::new(exterior, interiors)
        })
        .collect();
    MultiPolygon::new(geo_polys)
}

/// Flatten geo polygons back to the crate's representation, holes as
/// clockwise members.
fn from_geo_multi(multi: &MultiPolygon<f64>) -> Polygons {
    let mut result = Polygons::new();
    for geo_poly in &multi.0 {
        let mut contour = linestring_to_ring(geo_poly.exterior());
        if !contour.is_outer() {
            contour.reverse();
        }
        result.add(contour);
        for interior in geo_poly.interiors() {
            let mut hole = linestring_to_ring(interior);
            if hole.is_outer() {
                hole.reverse();
            }
            result.add(hole);
        }
    }
    result
}

/// Offset polygons by `delta` micrometers (positive grows, negative
/// shrinks). Returns an empty collection once the region vanishes.
pub fn offset_polygons(polys: &Polygons, delta: Coord) -> Polygons {
    if polys.is_empty() {
        return Polygons::new();
    }
    let geo_multi = to_geo_multi(polys);
    let result = geo_multi.offset(
        unscale(delta),
        JoinType::Miter(2.0),
        EndType::ClosedPolygon,
        CLIPPER_FACTOR,
    );
    from_geo_multi(&result)
}

/// Union of two polygon sets.
pub fn union_polygons(subject: &Polygons, clip: &Polygons) -> Polygons {
    if subject.is_empty() {
        return clip.clone();
    }
    if clip.is_empty() {
        return subject.clone();
    }
    let result = to_geo_multi(subject).union(&to_geo_multi(clip), CLIPPER_FACTOR);
    from_geo_multi(&result)
}

/// Intersection of two polygon sets.
pub fn intersection_polygons(subject: &Polygons, clip: &Polygons) -> Polygons {
    if subject.is_empty() || clip.is_empty() {
        return Polygons::new();
    }
    let result = to_geo_multi(subject).intersection(&to_geo_multi(clip), CLIPPER_FACTOR);
    from_geo_multi(&result)
}

/// Difference of two polygon sets (subject minus clip).
pub fn difference_polygons(subject: &Polygons, clip: &Polygons) -> Polygons {
    if subject.is_empty() {
        return Polygons::new();
    }
    if clip.is_empty() {
        return subject.clone();
    }
    let result = to_geo_multi(subject).difference(&to_geo_multi(clip), CLIPPER_FACTOR);
    from_geo_multi(&result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mm(size: f64, x: f64, y: f64) -> Polygon {
        Polygon::from_points(vec![
            Point::new_scale(x, y),
            Point::new_scale(x + size, y),
            Point::new_scale(x + size, y + size),
            Point::new_scale(x, y + size),
        ])
    }

    #[test]
    fn test_offset_shrink_vanishes() {
        let mut polys = Polygons::new();
        polys.add(square_mm(2.0, 0.0, 0.0));
        // Shrinking a 2mm square by 1.5mm leaves nothing.
        let shrunk = offset_polygons(&polys, -1_500);
        assert!(shrunk.is_empty());
    }

    #[test]
    fn test_offset_grow_area() {
        let mut polys = Polygons::new();
        polys.add(square_mm(10.0, 0.0, 0.0));
        let grown = offset_polygons(&polys, 1_000);
        assert!(grown.area_mm2() > polys.area_mm2());
    }

    #[test]
    fn test_intersection_disjoint_is_empty() {
        let mut a = Polygons::new();
        a.add(square_mm(5.0, 0.0, 0.0));
        let mut b = Polygons::new();
        b.add(square_mm(5.0, 20.0, 20.0));
        assert!(intersection_polygons(&a, &b).is_empty());
    }

    #[test]
    fn test_intersection_overlap() {
        let mut a = Polygons::new();
        a.add(square_mm(10.0, 0.0, 0.0));
        let mut b = Polygons::new();
        b.add(square_mm(10.0, 5.0, 5.0));
        let isect = intersection_polygons(&a, &b);
        assert!((isect.area_mm2() - 25.0).abs() < 0.5);
    }

    #[test]
    fn test_union_merges_overlap() {
        let mut a = Polygons::new();
        a.add(square_mm(10.0, 0.0, 0.0));
        let mut b = Polygons::new();
        b.add(square_mm(10.0, 5.0, 0.0));
        let merged = union_polygons(&a, &b);
        assert_eq!(merged.split_into_parts().len(), 1);
        assert!((merged.area_mm2() - 150.0).abs() < 0.5);
    }
}
