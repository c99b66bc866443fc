//! Layer planner: buffers one layer's travels, polygons and line sets,
//! then drains them to the motion writer in order.
//!
//! The planner is constructed per layer, populated by the emitters, run
//! through the cooling controller, and drained exactly once. Paths carry
//! a copy of their effective config, so config mutations after handover
//! cannot change what gets written.

use crate::clipper::offset_polygons;
use crate::config::{CoastingConfig, GCodePathConfig, PathRole, RetractionConfig};
use crate::geometry::{Point, Polygons};
use crate::storage::SliceDataStorage;
use crate::{Coord, CoordF};

use super::{GCodeWriter, LineOrderOptimizer, PathOrderOptimizer};

/// One run of moves sharing a config and retraction decision.
#[derive(Clone, Debug)]
struct GCodePath {
    config: GCodePathConfig,
    extruder: usize,
    retract: bool,
    points: Vec<Point>,
}

/// Accumulates ordered paths for a single layer.
pub struct GCodePlanner {
    paths: Vec<GCodePath>,
    first_position: Point,
    last_position: Point,
    travel_config: GCodePathConfig,
    retraction_config: RetractionConfig,
    coasting_config: CoastingConfig,
    retraction_min_travel: Coord,
    comb_boundary: Option<Polygons>,
    travel_avoid_other_parts: bool,
    always_retract: bool,
    current_extruder: usize,
    extrude_speed_factor: CoordF,
    extra_time: CoordF,
}

impl GCodePlanner {
    /// Create a planner for one layer.
    ///
    /// When combing is enabled the comb boundary is the union of all part
    /// outlines at this layer, shrunk by the outer wall width; travels
    /// whose endpoints share that region skip retraction. Detour routing
    /// around other parts is upstream's concern; here `travel_avoid_other_parts`
    /// escalates boundary-crossing travels to a retraction regardless of
    /// the minimum-travel threshold.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gcode: &GCodeWriter,
        storage: &SliceDataStorage,
        retraction_config: &RetractionConfig,
        coasting_config: &CoastingConfig,
        travel_speed: CoordF,
        retraction_min_travel: Coord,
        retraction_combing: bool,
        layer_nr: usize,
        wall_line_width_0: Coord,
        travel_avoid_other_parts: bool,
    ) -> Self {
        let mut travel_config = GCodePathConfig::new(PathRole::Move);
        travel_config.speed = travel_speed.max(0.1);

        let comb_boundary = if retraction_combing {
            let outlines = storage.layer_outlines(layer_nr);
            if outlines.is_empty() {
                None
            } else {
                Some(offset_polygons(&outlines, -wall_line_width_0))
            }
        } else {
            None
        };

        Self {
            paths: Vec::new(),
            first_position: gcode.get_position_xy(),
            last_position: gcode.get_position_xy(),
            travel_config,
            retraction_config: retraction_config.clone(),
            coasting_config: coasting_config.clone(),
            retraction_min_travel,
            comb_boundary,
            travel_avoid_other_parts,
            always_retract: false,
            current_extruder: gcode.current_extruder(),
            extrude_speed_factor: 1.0,
            extra_time: 0.0,
        }
    }

    /// Force retraction on every travel over the minimum distance.
    pub fn set_always_retract(&mut self, always_retract: bool) {
        self.always_retract = always_retract;
    }

    /// Currently selected extruder.
    pub fn get_extruder(&self) -> usize {
        self.current_extruder
    }

    /// Select an extruder for subsequent paths. Returns whether it
    /// actually changed.
    pub fn set_extruder(&mut self, extruder: usize) -> bool {
        if extruder == self.current_extruder {
            return false;
        }
        self.current_extruder = extruder;
        true
    }

    fn latest_path(&mut self, config: &GCodePathConfig) -> &mut GCodePath {
        let matches = self
            .paths
            .last()
            .map(|path| path.config == *config && path.extruder == self.current_extruder)
            .unwrap_or(false);
        if !matches {
            self.paths.push(GCodePath {
                config: config.clone(),
                extruder: self.current_extruder,
                retract: false,
                points: Vec::new(),
            });
        }
        self.paths.last_mut().unwrap()
    }

    /// Add a travel move to `point`.
    pub fn add_travel(&mut self, point: Point) {
        let distance = self.last_position.distance_squared(&point);
        let min = self.retraction_min_travel as i128 * self.retraction_min_travel as i128;
        let long_enough = distance > min;

        let retract = if let Some(boundary) = &self.comb_boundary {
            let combed = boundary.inside(self.last_position) && boundary.inside(point);
            if combed {
                self.always_retract && long_enough
            } else {
                self.travel_avoid_other_parts || long_enough
            }
        } else {
            self.always_retract && long_enough
        };

        let travel_config = self.travel_config.clone();
        let path = self.latest_path(&travel_config);
        if retract {
            path.retract = true;
        }
        path.points.push(point);
        self.last_position = point;
    }

    /// Add an extrusion move to `point` under `config`.
    pub fn add_extrusion_move(&mut self, point: Point, config: &GCodePathConfig) {
        self.latest_path(config).points.push(point);
        self.last_position = point;
    }

    /// Walk a closed polygon starting at vertex `start_idx`.
    pub fn add_polygon(&mut self, polygon: &crate::geometry::Polygon, start_idx: usize, config: &GCodePathConfig) {
        if polygon.is_empty() {
            return;
        }
        self.add_travel(polygon[start_idx]);
        for i in 1..polygon.len() {
            self.add_extrusion_move(polygon[(start_idx + i) % polygon.len()], config);
        }
        if polygon.len() > 2 {
            self.add_extrusion_move(polygon[start_idx], config);
        }
    }

    /// Add polygons in nearest-neighbour order.
    pub fn add_polygons_by_optimizer(&mut self, polygons: &Polygons, config: &GCodePathConfig) {
        let mut optimizer = PathOrderOptimizer::new(self.last_position);
        for polygon in polygons.iter() {
            optimizer.add_polygon(polygon);
        }
        optimizer.optimize();
        for &index in &optimizer.poly_order {
            self.add_polygon(&polygons[index], optimizer.poly_start[index], config);
        }
    }

    /// Add open lines in nearest-endpoint order, reversing as needed.
    pub fn add_lines_by_optimizer(&mut self, lines: &Polygons, config: &GCodePathConfig) {
        let mut optimizer = LineOrderOptimizer::new(self.last_position);
        for line in lines.iter() {
            optimizer.add_line(line);
        }
        optimizer.optimize();
        for &(index, reversed) in &optimizer.line_order {
            let line = &lines[index];
            if reversed {
                self.add_travel(line[line.len() - 1]);
                for point in line.iter().rev().skip(1) {
                    self.add_extrusion_move(*point, config);
                }
            } else {
                self.add_travel(line[0]);
                for point in line.iter().skip(1) {
                    self.add_extrusion_move(*point, config);
                }
            }
        }
    }

    /// Planned travel and extrusion durations in seconds, at unscaled
    /// speeds.
    pub fn get_times(&self) -> (CoordF, CoordF) {
        let mut travel_time = 0.0;
        let mut extrude_time = 0.0;
        let mut position = self.first_position;
        for path in &self.paths {
            for point in &path.points {
                let distance = position.distance_mm(point);
                if path.config.is_travel() {
                    travel_time += distance / path.config.speed;
                } else {
                    extrude_time += distance / path.config.speed;
                }
                position = *point;
            }
        }
        (travel_time, extrude_time)
    }

    /// Stretch the layer to `min_time` seconds by scaling extrusion
    /// speeds down, never below `minimal_speed`. Any shortfall that the
    /// speed floor prevents from being recovered is remembered as extra
    /// time for the head-lift dwell.
    pub fn force_minimal_layer_time(
        &mut self,
        min_time: CoordF,
        minimal_speed: CoordF,
        travel_time: CoordF,
        extrude_time: CoordF,
    ) {
        let total_time = travel_time + extrude_time;
        if total_time >= min_time || extrude_time <= 0.0 {
            return;
        }

        let min_extrude_time = (min_time - travel_time).max(1.0);
        let mut factor = extrude_time / min_extrude_time;
        for path in &self.paths {
            if path.config.is_travel() {
                continue;
            }
            if path.config.speed * factor < minimal_speed {
                factor = minimal_speed / path.config.speed;
            }
        }

        if factor < 1.0 {
            self.extrude_speed_factor = factor;
        } else {
            factor = 1.0;
        }
        self.extra_time = (min_time - (travel_time + extrude_time / factor)).max(0.0);
    }

    /// Leftover time the speed floor could not absorb.
    pub fn extra_time(&self) -> CoordF {
        self.extra_time
    }

    /// Drain all buffered paths to the motion writer.
    ///
    /// `is_new_layer` marks a rewriter seam: the drain opens with a
    /// forced retraction so the lifted travel to the new print position
    /// happens depressurised.
    pub fn write_gcode(
        self,
        gcode: &mut GCodeWriter,
        lift_head_if_needed: bool,
        layer_thickness: Coord,
        is_new_layer: bool,
    ) {
        let volumetric = gcode.flavor() == crate::settings::GCodeFlavor::UltiGCode;
        let mut last_role: Option<PathRole> = None;

        if is_new_layer {
            gcode.write_retraction(&self.retraction_config, true);
        }

        for path in &self.paths {
            if path.points.is_empty() {
                continue;
            }
            if path.extruder != gcode.current_extruder() {
                gcode.switch_extruder(path.extruder, &self.retraction_config);
            }

            if path.config.is_travel() {
                if path.retract {
                    gcode.write_retraction(&self.retraction_config, false);
                }
                for point in &path.points {
                    gcode.write_move(*point, path.config.speed, 0.0);
                }
                continue;
            }

            if last_role != Some(path.config.role) {
                gcode.write_comment(&format!("TYPE:{}", path.config.role));
                last_role = Some(path.config.role);
            }

            let speed = path.config.speed * self.extrude_speed_factor;
            let extrusion_per_mm = if volumetric {
                path.config.extrusion_mm3_per_mm()
            } else {
                path.config.extrusion_per_mm()
            };

            if path.config.spiralize {
                self.write_spiral_path(gcode, path, speed, extrusion_per_mm, layer_thickness);
            } else if self.coasting_config.enable {
                self.write_coasting_path(gcode, path, speed, extrusion_per_mm);
            } else {
                for point in &path.points {
                    gcode.write_move(*point, speed, extrusion_per_mm);
                }
            }
        }

        if lift_head_if_needed && self.extra_time > 0.0 {
            gcode.write_comment("Small layer, adding delay");
            gcode.write_retraction(&self.retraction_config, true);
            gcode.set_z(gcode.get_position_z() + 3_000);
            gcode.write_move(gcode.get_position_xy(), self.travel_config.speed, 0.0);
            gcode.write_delay(self.extra_time);
        }
    }

    fn write_spiral_path(
        &self,
        gcode: &mut GCodeWriter,
        path: &GCodePath,
        speed: CoordF,
        extrusion_per_mm: CoordF,
        layer_thickness: Coord,
    ) {
        let mut total_length = 0.0;
        let mut position = gcode.get_position_xy();
        for point in &path.points {
            total_length += position.distance_mm(point);
            position = *point;
        }
        if total_length <= 0.0 {
            return;
        }

        let base_z = gcode.get_position_z();
        let mut walked = 0.0;
        let mut position = gcode.get_position_xy();
        for point in &path.points {
            walked += position.distance_mm(point);
            position = *point;
            let z = base_z + (layer_thickness as CoordF * walked / total_length) as Coord;
            gcode.set_z(z);
            gcode.write_move(*point, speed, extrusion_per_mm);
        }
    }

    fn write_coasting_path(
        &self,
        gcode: &mut GCodeWriter,
        path: &GCodePath,
        speed: CoordF,
        extrusion_per_mm: CoordF,
    ) {
        let mm3_per_mm = path.config.extrusion_mm3_per_mm();
        let mut total_length = 0.0;
        let mut position = gcode.get_position_xy();
        for point in &path.points {
            total_length += position.distance_mm(point);
            position = *point;
        }

        let coast_length = if mm3_per_mm > 0.0 {
            self.coasting_config.volume_move / mm3_per_mm
        } else {
            0.0
        };
        let path_volume = total_length * mm3_per_mm;
        if coast_length <= 0.0 || path_volume <= self.coasting_config.min_volume_move {
            for point in &path.points {
                gcode.write_move(*point, speed, extrusion_per_mm);
            }
            return;
        }

        let extrude_until = (total_length - coast_length).max(0.0);
        let coast_speed = speed * self.coasting_config.speed_move;
        let mut walked = 0.0;
        let mut position = gcode.get_position_xy();
        for point in &path.points {
            let segment = position.distance_mm(point);
            if walked + segment <= extrude_until || segment <= 0.0 {
                gcode.write_move(*point, speed, extrusion_per_mm);
            } else if walked >= extrude_until {
                gcode.write_move(*point, coast_speed, 0.0);
            } else {
                // Split the segment at the coasting boundary.
                let t = (extrude_until - walked) / segment;
                let split = Point::new(
                    position.x + ((point.x - position.x) as CoordF * t).round() as Coord,
                    position.y + ((point.y - position.y) as CoordF * t).round() as Coord,
                );
                gcode.write_move(split, speed, extrusion_per_mm);
                gcode.write_move(*point, coast_speed, 0.0);
            }
            walked += segment;
            position = *point;
        }
    }

    /// Total planned path length in millimeters; used by tests and the
    /// bench harness.
    pub fn planned_length_mm(&self) -> CoordF {
        let mut length = 0.0;
        let mut position = self.first_position;
        for path in &self.paths {
            for point in &path.points {
                length += position.distance_mm(point);
                position = *point;
            }
        }
        length
    }
}
