//! Nearest-neighbour ordering for polygons and line sets.
//!
//! Given a starting head position, pick for every polygon the vertex to
//! enter at and a visiting order that keeps travel moves short. Lines
//! (two-point polygons) additionally may be reversed.

use crate::geometry::{Point, Polygon};

/// Orders closed polygons, choosing a start vertex per polygon.
pub struct PathOrderOptimizer<'a> {
    start_point: Point,
    polygons: Vec<&'a Polygon>,
    /// Chosen entry vertex per polygon (indexed like `polygons`).
    pub poly_start: Vec<usize>,
    /// Visiting order after `optimize`.
    pub poly_order: Vec<usize>,
}

impl<'a> PathOrderOptimizer<'a> {
    /// Create an optimizer seeded with the current head position.
    pub fn new(start_point: Point) -> Self {
        Self {
            start_point,
            polygons: Vec::new(),
            poly_start: Vec::new(),
            poly_order: Vec::new(),
        }
    }

    /// Add a polygon to order.
    pub fn add_polygon(&mut self, polygon: &'a Polygon) {
        self.polygons.push(polygon);
        self.poly_start.push(0);
    }

    /// Number of polygons added.
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Whether no polygon was added.
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Greedy nearest-neighbour pass: repeatedly pick the unvisited
    /// polygon whose closest vertex is nearest the current position.
    pub fn optimize(&mut self) {
        self.poly_order.clear();
        let mut visited = vec![false; self.polygons.len()];
        let mut position = self.start_point;

        for _ in 0..self.polygons.len() {
            let mut best: Option<usize> = None;
            let mut best_dist = i128::MAX;
            let mut best_vertex = 0;

            for (i, poly) in self.polygons.iter().enumerate() {
                if visited[i] || poly.is_empty() {
                    continue;
                }
                let vertex = poly.closest_index_to(position);
                let dist = poly[vertex].distance_squared(&position);
                if dist < best_dist {
                    best_dist = dist;
                    best = Some(i);
                    best_vertex = vertex;
                }
            }

            let Some(best) = best else { break };
            visited[best] = true;
            self.poly_start[best] = best_vertex;
            self.poly_order.push(best);
            position = self.polygons[best][best_vertex];
        }
    }
}

/// Orders open line segments, allowing each to be walked in reverse.
pub struct LineOrderOptimizer<'a> {
    start_point: Point,
    lines: Vec<&'a Polygon>,
    /// Visiting order with a reversal flag per line.
    pub line_order: Vec<(usize, bool)>,
}

impl<'a> LineOrderOptimizer<'a> {
    /// Create an optimizer seeded with the current head position.
    pub fn new(start_point: Point) -> Self {
        Self {
            start_point,
            lines: Vec::new(),
            line_order: Vec::new(),
        }
    }

    /// Add a line (polyline; usually two points).
    pub fn add_line(&mut self, line: &'a Polygon) {
        self.lines.push(line);
    }

    /// Greedy nearest-endpoint pass; a line entered at its far end is
    /// flagged reversed.
    pub fn optimize(&mut self) {
        self.line_order.clear();
        let mut visited = vec![false; self.lines.len()];
        let mut position = self.start_point;

        for _ in 0..self.lines.len() {
            let mut best: Option<(usize, bool)> = None;
            let mut best_dist = i128::MAX;

            for (i, line) in self.lines.iter().enumerate() {
                if visited[i] || line.is_empty() {
                    continue;
                }
                let head = line[0].distance_squared(&position);
                let tail = line[line.len() - 1].distance_squared(&position);
                if head < best_dist {
                    best_dist = head;
                    best = Some((i, false));
                }
                if tail < best_dist {
                    best_dist = tail;
                    best = Some((i, true));
                }
            }

            let Some((index, reversed)) = best else { break };
            visited[index] = true;
            self.line_order.push((index, reversed));
            let line = self.lines[index];
            position = if reversed { line[0] } else { line[line.len() - 1] };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(x0: i64, y0: i64, x1: i64, y1: i64) -> Polygon {
        Polygon::from_points(vec![Point::new(x0, y0), Point::new(x1, y1)])
    }

    #[test]
    fn test_polygon_order_prefers_nearest() {
        let near = Polygon::from_points(vec![
            Point::new(1_000, 0),
            Point::new(2_000, 0),
            Point::new(2_000, 1_000),
        ]);
        let far = Polygon::from_points(vec![
            Point::new(50_000, 0),
            Point::new(51_000, 0),
            Point::new(51_000, 1_000),
        ]);

        let mut optimizer = PathOrderOptimizer::new(Point::zero());
        optimizer.add_polygon(&far);
        optimizer.add_polygon(&near);
        optimizer.optimize();

        assert_eq!(optimizer.poly_order, vec![1, 0]);
        assert_eq!(optimizer.poly_start[1], 0);
    }

    #[test]
    fn test_polygon_order_picks_entry_vertex() {
        let poly = Polygon::from_points(vec![
            Point::new(10_000, 10_000),
            Point::new(20_000, 10_000),
            Point::new(20_000, 20_000),
            Point::new(10_000, 20_000),
        ]);
        let mut optimizer = PathOrderOptimizer::new(Point::new(21_000, 21_000));
        optimizer.add_polygon(&poly);
        optimizer.optimize();
        assert_eq!(optimizer.poly_start[0], 2);
    }

    #[test]
    fn test_line_order_reverses() {
        let line = segment(10_000, 0, 0, 0);
        let mut optimizer = LineOrderOptimizer::new(Point::zero());
        optimizer.add_line(&line);
        optimizer.optimize();
        // Entering at the tail (0,0) means walking the line reversed.
        assert_eq!(optimizer.line_order, vec![(0, true)]);
    }

    #[test]
    fn test_line_order_chains_scanlines() {
        let a = segment(0, 0, 0, 10_000);
        let b = segment(2_000, 0, 2_000, 10_000);
        let c = segment(4_000, 0, 4_000, 10_000);

        let mut optimizer = LineOrderOptimizer::new(Point::zero());
        optimizer.add_line(&a);
        optimizer.add_line(&b);
        optimizer.add_line(&c);
        optimizer.optimize();

        let order: Vec<usize> = optimizer.line_order.iter().map(|&(i, _)| i).collect();
        assert_eq!(order, vec![0, 1, 2]);
        // Boustrophedon: middle line is walked backwards.
        assert!(optimizer.line_order[1].1);
        assert!(!optimizer.line_order[2].1);
    }
}
