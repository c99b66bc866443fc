//! Bridge direction detection for skin regions over air.

use crate::clipper::intersection_polygons;
use crate::geometry::Polygons;
use crate::storage::SliceLayer;

/// Pick the angle to lay skin lines across a gap, in degrees.
///
/// Intersects the skin outline with the parts of the layer below to find
/// the islands the bridge can anchor on. With two to five islands the
/// bridge runs between the centroids of the two largest; with fewer
/// (nothing to anchor on, or fully supported) or more the region is not
/// treated as a bridge and -1 is returned.
pub fn bridge_angle(outline: &Polygons, prev_layer: &SliceLayer) -> i32 {
    let boundary = outline.bounding_box();
    let mut islands: Vec<Polygons> = Vec::new();

    for part in &prev_layer.parts {
        if !boundary.hit(&part.outline.bounding_box()) {
            continue;
        }
        let supported = intersection_polygons(outline, &part.outline);
        islands.extend(supported.split_into_parts());
    }

    if islands.len() < 2 || islands.len() > 5 {
        return -1;
    }

    islands.sort_by(|a, b| {
        b.area_mm2()
            .partial_cmp(&a.area_mm2())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let a = islands[0][0].centroid();
    let b = islands[1][0].centroid();
    let angle = ((b.y - a.y) as f64)
        .atan2((b.x - a.x) as f64)
        .to_degrees();
    (angle.rem_euclid(180.0)).round() as i32 % 180
}
