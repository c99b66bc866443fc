//! Infill pattern generators.
//!
//! Pure functions producing either unconnected line segments (as
//! two-point polygons) or polygon rings from an outline plus parameters.
//! The emission pipeline decides which planner channel each result goes
//! through: line sets via the line optimiser, rings via the polygon
//! optimiser.
//!
//! The scanline generators work in a rotated frame: the outline is
//! rotated by the negative fill angle, cut by vertical scanlines spaced
//! `line_spacing` apart, and the resulting spans are rotated back.

mod bridge;

pub use bridge::bridge_angle;

use crate::clipper::offset_polygons;
use crate::geometry::{Point, Polygon, Polygons};
use crate::Coord;

/// Generate parallel line infill.
///
/// The outline is first offset by `outline_offset` plus the overlap
/// fraction of the line width, so fill lines bond with the surrounding
/// walls. Returns unconnected two-point polygons.
pub fn generate_line_infill(
    outline: &Polygons,
    outline_offset: Coord,
    line_width: Coord,
    line_spacing: Coord,
    infill_overlap: f64,
    rotation_deg: f64,
) -> Polygons {
    let outline = apply_overlap_offset(outline, outline_offset, line_width, infill_overlap);
    scanline_segments(&outline, line_spacing, rotation_deg)
}

/// Generate grid infill: two perpendicular line passes.
pub fn generate_grid_infill(
    outline: &Polygons,
    outline_offset: Coord,
    line_width: Coord,
    line_spacing: Coord,
    infill_overlap: f64,
    rotation_deg: f64,
) -> Polygons {
    let outline = apply_overlap_offset(outline, outline_offset, line_width, infill_overlap);
    let mut result = scanline_segments(&outline, line_spacing, rotation_deg);
    let cross = scanline_segments(&outline, line_spacing, rotation_deg + 90.0);
    result.add_all(&cross);
    result
}

/// Generate triangle infill: three line passes 60 degrees apart.
pub fn generate_triangle_infill(
    outline: &Polygons,
    outline_offset: Coord,
    line_width: Coord,
    line_spacing: Coord,
    infill_overlap: f64,
    rotation_deg: f64,
) -> Polygons {
    let outline = apply_overlap_offset(outline, outline_offset, line_width, infill_overlap);
    let mut result = scanline_segments(&outline, line_spacing, rotation_deg);
    for extra in [60.0, 120.0] {
        let pass = scanline_segments(&outline, line_spacing, rotation_deg + extra);
        result.add_all(&pass);
    }
    result
}

/// Generate concentric infill: rings offset inward by the spacing until
/// the region vanishes.
pub fn generate_concentric_infill(outline: &Polygons, line_spacing: Coord) -> Polygons {
    let mut result = Polygons::new();
    let mut current = offset_polygons(outline, -line_spacing / 2);
    while !current.is_empty() {
        result.add_all(&current);
        current = offset_polygons(&current, -line_spacing);
    }
    result
}

/// Generate zigzag infill: scanline spans chained end-to-end into open
/// polygons so the nozzle sweeps back and forth without hopping.
///
/// A chain breaks wherever a scanline carries more than one span (the
/// connection would cross a hole). With `connect_ends` false the chains
/// are additionally broken after every pair of spans.
pub fn generate_zigzag_infill(
    outline: &Polygons,
    line_width: Coord,
    line_spacing: Coord,
    infill_overlap: f64,
    rotation_deg: f64,
    connect_ends: bool,
) -> Polygons {
    let outline = apply_overlap_offset(outline, 0, line_width, infill_overlap);
    let spans = scanline_spans(&outline, line_spacing, rotation_deg);

    fn flush(result: &mut Polygons, chain: &mut Polygon, chained: &mut usize) {
        if chain.len() >= 2 {
            result.add(std::mem::take(chain));
        } else {
            chain.clear();
        }
        *chained = 0;
    }

    let mut result = Polygons::new();
    let mut chain = Polygon::new();
    let mut chained_spans = 0usize;
    let mut forward = true;

    for spans_at_line in spans {
        if spans_at_line.len() != 1 {
            // Can't connect across a split scanline; emit what we have
            // and fall back to plain segments here.
            flush(&mut result, &mut chain, &mut chained_spans);
            for (a, b) in spans_at_line {
                result.add(Polygon::from_points(vec![a, b]));
            }
            forward = true;
            continue;
        }

        let (a, b) = spans_at_line[0];
        let (start, end) = if forward { (a, b) } else { (b, a) };
        if chain.is_empty() {
            chain.push(start);
        }
        chain.push(end);
        chained_spans += 1;
        forward = !forward;

        if !connect_ends && chained_spans >= 2 {
            flush(&mut result, &mut chain, &mut chained_spans);
            forward = true;
        }
    }
    flush(&mut result, &mut chain, &mut chained_spans);

    result
}

fn apply_overlap_offset(
    outline: &Polygons,
    outline_offset: Coord,
    line_width: Coord,
    infill_overlap: f64,
) -> Polygons {
    let delta = outline_offset + (line_width as f64 * infill_overlap / 100.0) as Coord;
    if delta == 0 {
        outline.clone()
    } else {
        offset_polygons(outline, delta)
    }
}

/// Cut the outline with vertical scanlines in a frame rotated by
/// `-rotation_deg`, returning the inside spans grouped per scanline.
fn scanline_spans(
    outline: &Polygons,
    line_spacing: Coord,
    rotation_deg: f64,
) -> Vec<Vec<(Point, Point)>> {
    if line_spacing <= 0 || outline.is_empty() {
        return Vec::new();
    }
    let angle = rotation_deg.to_radians();
    let rotated: Polygons = outline
        .iter()
        .map(|poly| poly.iter().map(|p| p.rotate(-angle)).collect::<Polygon>())
        .collect();

    let bbox = rotated.bounding_box();
    if bbox.is_empty() {
        return Vec::new();
    }

    let first_line = bbox.min.x - (bbox.min.x.rem_euclid(line_spacing)) + line_spacing;
    let mut result = Vec::new();

    let mut x = first_line;
    while x < bbox.max.x {
        // Collect crossings of this scanline with every edge.
        let mut cuts: Vec<Coord> = Vec::new();
        for poly in rotated.iter() {
            let n = poly.len();
            for i in 0..n {
                let p0 = poly[i];
                let p1 = poly[(i + 1) % n];
                if (p0.x > x) == (p1.x > x) {
                    continue;
                }
                let t = (x - p0.x) as f64 / (p1.x - p0.x) as f64;
                cuts.push(p0.y + ((p1.y - p0.y) as f64 * t).round() as Coord);
            }
        }
        cuts.sort_unstable();

        let mut spans_at_line = Vec::new();
        for pair in cuts.chunks_exact(2) {
            if pair[1] - pair[0] < line_spacing / 20 {
                continue; // degenerate sliver
            }
            let a = Point::new(x, pair[0]).rotate(angle);
            let b = Point::new(x, pair[1]).rotate(angle);
            spans_at_line.push((a, b));
        }
        if !spans_at_line.is_empty() {
            result.push(spans_at_line);
        }
        x += line_spacing;
    }
    result
}

fn scanline_segments(outline: &Polygons, line_spacing: Coord, rotation_deg: f64) -> Polygons {
    let mut result = Polygons::new();
    for spans in scanline_spans(outline, line_spacing, rotation_deg) {
        for (a, b) in spans {
            result.add(Polygon::from_points(vec![a, b]));
        }
    }
    result
}
