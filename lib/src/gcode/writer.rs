//! Buffer-backed motion writer.
//!
//! Formats motion commands and auxiliary directives into a G-code text
//! stream while tracking machine state: position, extrusion accumulator,
//! retraction, active extruder, fan speed, and print-time / filament
//! accounting.
//!
//! Flavors:
//! - RepRap: linear E values in millimeters of filament.
//! - UltiGCode: volumetric E in cubic millimeters, firmware retraction
//!   (`G10`/`G11`), metadata prefix handled by the orchestrator.
//! - BFB: retraction handled by the firmware via `M227`; explicit
//!   retraction writes are suppressed.

use crate::config::RetractionConfig;
use crate::geometry::{Point, Point3};
use crate::settings::{GCodeFlavor, SettingsStore};
use crate::{unscale, Coord, CoordF, MAX_EXTRUDERS};
use std::fmt::Write as _;

use super::GCode;

/// Writes motion commands into an in-memory G-code stream.
pub struct GCodeWriter {
    flavor: GCodeFlavor,
    content: String,

    current_position: Point,
    z_pos: Coord,
    written_z: Coord,
    /// Pending Z to descend to after the next travel move; set around
    /// rewriter seams where the head travels lifted.
    next_z_pos: Option<Coord>,
    start_position: Point,

    current_speed: CoordF,
    extrusion_amount: CoordF,
    retracted: bool,
    retraction_prime_speed: CoordF,
    retraction_prime_amount: CoordF,
    zhop_from: Option<Coord>,

    current_extruder: usize,
    extruder_offsets: [Point; MAX_EXTRUDERS],
    total_filament: [CoordF; MAX_EXTRUDERS],
    total_print_time: CoordF,
    current_fan_speed: CoordF,
}

impl GCodeWriter {
    /// Create a writer for the given flavor.
    pub fn new(flavor: GCodeFlavor) -> Self {
        Self {
            flavor,
            content: String::new(),
            current_position: Point::zero(),
            z_pos: 0,
            written_z: 0,
            next_z_pos: None,
            start_position: Point::zero(),
            current_speed: 0.0,
            extrusion_amount: 0.0,
            retracted: false,
            retraction_prime_speed: 0.0,
            retraction_prime_amount: 0.0,
            zhop_from: None,
            current_extruder: 0,
            extruder_offsets: [Point::zero(); MAX_EXTRUDERS],
            total_filament: [0.0; MAX_EXTRUDERS],
            total_print_time: 0.0,
            current_fan_speed: -1.0,
        }
    }

    /// Configure flavor and extruder offsets from settings.
    pub fn pre_setup(&mut self, settings: &SettingsStore) {
        self.flavor = settings.get_gcode_flavor("machine_gcode_flavor");
        for n in 1..MAX_EXTRUDERS {
            let key_x = format!("machine_nozzle_offset_x_{n}");
            let key_y = format!("machine_nozzle_offset_y_{n}");
            if settings.has(&key_x) || settings.has(&key_y) {
                self.extruder_offsets[n] =
                    Point::new(settings.get_microns(&key_x), settings.get_microns(&key_y));
            }
        }
    }

    /// The configured G-code dialect.
    pub fn flavor(&self) -> GCodeFlavor {
        self.flavor
    }

    /// Current head position in the XY plane.
    pub fn get_position_xy(&self) -> Point {
        self.current_position
    }

    /// Current commanded Z in micrometers.
    pub fn get_position_z(&self) -> Coord {
        self.z_pos
    }

    /// Head position at the start of the current layer plan.
    pub fn get_start_position_xy(&self) -> Point {
        self.start_position
    }

    /// XY offset of the given nozzle.
    pub fn get_extruder_offset(&self, extruder: usize) -> Point {
        self.extruder_offsets[extruder.min(MAX_EXTRUDERS - 1)]
    }

    /// Extruder currently selected.
    pub fn current_extruder(&self) -> usize {
        self.current_extruder
    }

    /// Set the Z for subsequent moves.
    pub fn set_z(&mut self, z: Coord) {
        self.z_pos = z;
    }

    /// Arrange for the head to descend to `z` right after the next
    /// travel move completes.
    pub fn set_next_z(&mut self, z: Coord) {
        self.next_z_pos = Some(z);
    }

    /// Re-anchor the start position at the current head position.
    pub fn reset_start_position(&mut self) {
        self.start_position = self.current_position;
    }

    /// Zero the extrusion accumulator (writes `G92 E0`).
    pub fn reset_extrusion_value(&mut self) {
        if self.extrusion_amount != 0.0 && self.flavor != GCodeFlavor::UltiGCode {
            self.content.push_str("G92 E0\n");
        }
        self.total_filament[self.current_extruder] += self.extrusion_amount;
        self.extrusion_amount = 0.0;
    }

    /// Zero the accumulated print-time estimate and filament tallies.
    pub fn reset_total_print_time(&mut self) {
        self.total_print_time = 0.0;
        self.total_filament = [0.0; MAX_EXTRUDERS];
    }

    /// Estimated print time so far, in seconds.
    pub fn get_total_print_time(&self) -> CoordF {
        self.total_print_time
    }

    /// Filament used by the given extruder so far (mm, or mm3 for the
    /// volumetric flavor).
    pub fn get_total_filament_used(&self, extruder: usize) -> CoordF {
        let mut total = self.total_filament[extruder.min(MAX_EXTRUDERS - 1)];
        if extruder == self.current_extruder {
            total += self.extrusion_amount;
        }
        total
    }

    /// Write a move to `point`. `extrusion_per_mm` of zero means travel;
    /// a positive value extrudes that much filament (mm, or mm3 for the
    /// volumetric flavor) per millimeter traveled.
    pub fn write_move(&mut self, point: Point, speed: CoordF, extrusion_per_mm: CoordF) {
        let distance = self.current_position.distance_mm(&point);
        let extruding = extrusion_per_mm > 0.0;

        if extruding && self.retracted {
            self.prime();
        }

        let command = if extruding { "G1" } else { "G0" };
        let mut line = String::from(command);
        if (speed - self.current_speed).abs() > 1e-9 {
            let _ = write!(line, " F{:.0}", speed * 60.0);
            self.current_speed = speed;
        }
        let _ = write!(
            line,
            " X{:.3} Y{:.3}",
            unscale(point.x),
            unscale(point.y)
        );
        if self.z_pos != self.written_z {
            let _ = write!(line, " Z{:.3}", unscale(self.z_pos));
            self.written_z = self.z_pos;
        }
        if extruding {
            self.extrusion_amount += extrusion_per_mm * distance;
            let _ = write!(line, " E{:.5}", self.extrusion_amount);
        }
        line.push('\n');
        self.content.push_str(&line);

        if speed > 0.0 {
            self.total_print_time += distance / speed;
        }
        self.current_position = point;

        // Descend onto the new object after a lifted seam travel.
        if !extruding {
            if let Some(z) = self.next_z_pos.take() {
                self.z_pos = z;
                self.written_z = z;
                let _ = writeln!(self.content, "G0 Z{:.3}", unscale(z));
            }
        }
    }

    /// Write a move in XYZ; used for head parking.
    pub fn write_move_3d(&mut self, point: Point3, speed: CoordF) {
        self.set_z(point.z);
        self.write_move(point.xy(), speed, 0.0);
    }

    /// Retract filament per `config`. Forced retractions ignore the
    /// already-retracted state.
    pub fn write_retraction(&mut self, config: &RetractionConfig, force: bool) {
        if self.flavor == GCodeFlavor::Bfb {
            return; // M227 auto-retraction
        }
        if config.amount <= 0.0 || (self.retracted && !force) {
            return;
        }

        if self.flavor == GCodeFlavor::UltiGCode {
            self.content.push_str("G10\n");
        } else {
            self.extrusion_amount -= config.amount;
            let _ = writeln!(
                self.content,
                "G1 F{:.0} E{:.5}",
                config.speed * 60.0,
                self.extrusion_amount
            );
            self.current_speed = config.speed;
        }
        self.retracted = true;
        self.retraction_prime_speed = config.prime_speed;
        self.retraction_prime_amount = config.amount + config.prime_amount;

        if config.zhop > 0 {
            self.zhop_from = Some(self.z_pos);
            self.z_pos += config.zhop;
        }
    }

    fn prime(&mut self) {
        if let Some(z) = self.zhop_from.take() {
            self.z_pos = z;
        }
        if self.flavor == GCodeFlavor::UltiGCode {
            self.content.push_str("G11\n");
        } else {
            self.extrusion_amount += self.retraction_prime_amount;
            let _ = writeln!(
                self.content,
                "G1 F{:.0} E{:.5}",
                self.retraction_prime_speed * 60.0,
                self.extrusion_amount
            );
            self.current_speed = self.retraction_prime_speed;
        }
        self.retracted = false;
    }

    /// Select a different extruder, retracting first.
    pub fn switch_extruder(&mut self, extruder: usize, retraction: &RetractionConfig) {
        if self.current_extruder == extruder {
            return;
        }
        if self.flavor == GCodeFlavor::UltiGCode {
            self.content.push_str("G10 S1\n");
        } else {
            self.write_retraction(retraction, true);
        }
        self.reset_extrusion_value();
        self.current_extruder = extruder;
        let _ = writeln!(self.content, "T{extruder}");
    }

    /// Command a nozzle temperature; `wait` blocks until reached.
    pub fn write_temperature_command(&mut self, extruder: usize, celsius: CoordF, wait: bool) {
        let command = if wait { "M109" } else { "M104" };
        if extruder == self.current_extruder {
            let _ = writeln!(self.content, "{command} S{celsius:.0}");
        } else {
            let _ = writeln!(self.content, "{command} T{extruder} S{celsius:.0}");
        }
    }

    /// Command the bed temperature; `wait` blocks until reached.
    pub fn write_bed_temperature_command(&mut self, celsius: CoordF, wait: bool) {
        let command = if wait { "M190" } else { "M140" };
        let _ = writeln!(self.content, "{command} S{celsius:.0}");
    }

    /// Command the part-cooling fan, in percent. Duplicate commands are
    /// suppressed.
    pub fn write_fan_command(&mut self, percent: CoordF) {
        if (self.current_fan_speed - percent).abs() < 1e-9 {
            return;
        }
        if percent > 0.0 {
            let _ = writeln!(self.content, "M106 S{:.0}", percent * 255.0 / 100.0);
        } else {
            self.content.push_str("M107\n");
        }
        self.current_fan_speed = percent;
    }

    /// Write a layer index comment.
    pub fn write_layer_comment(&mut self, layer_nr: i32) {
        let _ = writeln!(self.content, ";LAYER:{layer_nr}");
    }

    /// Write a comment line.
    pub fn write_comment(&mut self, comment: &str) {
        let _ = writeln!(self.content, ";{comment}");
    }

    /// Write a raw (possibly multi-line) code block.
    pub fn write_code(&mut self, code: &str) {
        if code.is_empty() {
            return;
        }
        self.content.push_str(code);
        if !code.ends_with('\n') {
            self.content.push('\n');
        }
    }

    /// Write a single raw line.
    pub fn write_line(&mut self, line: &str) {
        self.content.push_str(line);
        self.content.push('\n');
    }

    /// Dwell for the given number of seconds.
    pub fn write_delay(&mut self, seconds: CoordF) {
        let _ = writeln!(self.content, "G4 P{:.0}", seconds * 1000.0);
        self.total_print_time += seconds;
    }

    /// Park the head and run the machine end code.
    pub fn finalize(&mut self, max_object_height: Coord, travel_speed: CoordF, end_code: &str) {
        self.write_fan_command(0.0);
        self.set_z(max_object_height + 5_000);
        self.write_move(self.get_position_xy(), travel_speed, 0.0);
        self.write_code(end_code);
        log::info!(
            "print time estimate: {:.0}s, filament: {:.2}mm",
            self.total_print_time,
            self.get_total_filament_used(0)
        );
    }

    /// Current stream content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume the writer, yielding the finished G-code.
    pub fn into_gcode(self) -> GCode {
        GCode::from_string(self.content)
    }
}
