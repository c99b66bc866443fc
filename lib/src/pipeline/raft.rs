//! Raft prelude: base, interface and surface sub-layers emitted before
//! layer 0 at synthetic layer indices.

use super::FffEmitter;
use crate::config::{GCodePathConfig, PathRole};
use crate::gcode::GCodePlanner;
use crate::infill::generate_line_infill;
use crate::storage::SliceDataStorage;
use crate::Coord;

impl FffEmitter {
    /// Emit the raft: one base layer, one interface layer, then the
    /// configured number of cross-hatched surface layers. All phases
    /// print before layer 0; base and interface carry layer comment -2
    /// and -1, each surface repeats -1.
    pub(super) fn process_raft(&mut self, storage: &SliceDataStorage) {
        let s = &self.settings;
        let fill_overlap = s.get_percentage("fill_overlap");
        let base_thickness = s.get_microns("raft_base_thickness");
        let interface_thickness = s.get_microns("raft_interface_thickness");
        let surface_layers = s.get_count("raft_surface_layers");
        let surface_thickness = s.get_microns("raft_surface_thickness");

        // All raft configs meter volume against the base thickness.
        let raft_base_config = self.raft_config(
            "raft_base_line_width",
            "raft_base_speed",
            base_thickness,
        );
        let raft_interface_config = self.raft_config(
            "raft_interface_line_width",
            "raft_interface_speed",
            base_thickness,
        );
        let raft_surface_config = self.raft_config(
            "raft_surface_line_width",
            "raft_surface_speed",
            base_thickness,
        );

        // Base: outline walk plus wide, slow fill straight onto the bed.
        {
            self.gcode.write_layer_comment(-2);
            self.gcode.write_comment("RAFT");
            let mut planner = self.raft_planner(storage);
            if self.settings.get_index("support_extruder_nr") > 0 {
                planner.set_extruder(self.settings.get_index("support_extruder_nr") as usize);
            }
            self.gcode.set_z(base_thickness);
            planner.add_polygons_by_optimizer(&storage.raft_outline, &raft_base_config);

            let raft_lines = generate_line_infill(
                &storage.raft_outline,
                0,
                self.settings.get_microns("raft_base_line_width"),
                self.settings.get_microns("raft_line_spacing"),
                fill_overlap,
                0.0,
            );
            planner.add_lines_by_optimizer(&raft_lines, &raft_base_config);

            self.gcode
                .write_fan_command(self.settings.get_percentage("raft_base_fan_speed"));
            planner.write_gcode(&mut self.gcode, false, base_thickness, false);
        }

        // Interface: diagonal when surface layers will cross it, else
        // perpendicular to the base.
        {
            self.gcode.write_layer_comment(-1);
            self.gcode.write_comment("RAFT");
            let mut planner = self.raft_planner(storage);
            self.gcode.set_z(base_thickness + interface_thickness);

            let angle = if surface_layers > 0 { 45.0 } else { 90.0 };
            let raft_lines = generate_line_infill(
                &storage.raft_outline,
                0,
                self.settings.get_microns("raft_interface_line_width"),
                self.settings.get_microns("raft_interface_line_spacing"),
                fill_overlap,
                angle,
            );
            planner.add_lines_by_optimizer(&raft_lines, &raft_interface_config);

            planner.write_gcode(&mut self.gcode, false, interface_thickness, false);
        }

        // Surfaces: successive layers cross-hatch at 90 degree steps.
        for surface_layer in 1..=surface_layers {
            self.gcode.write_layer_comment(-1);
            self.gcode.write_comment("RAFT");
            let mut planner = self.raft_planner(storage);
            self.gcode.set_z(
                base_thickness
                    + interface_thickness
                    + surface_thickness * surface_layer as Coord,
            );

            let raft_lines = generate_line_infill(
                &storage.raft_outline,
                0,
                self.settings.get_microns("raft_surface_line_width"),
                self.settings.get_microns("raft_surface_line_spacing"),
                fill_overlap,
                (90 * surface_layer) as f64,
            );
            planner.add_lines_by_optimizer(&raft_lines, &raft_surface_config);

            planner.write_gcode(&mut self.gcode, false, interface_thickness, false);
        }
    }

    fn raft_config(&self, width_key: &str, speed_key: &str, thickness: Coord) -> GCodePathConfig {
        let mut config = GCodePathConfig::new(PathRole::Support);
        config.configure(
            self.settings.get_microns(width_key),
            self.settings.get_mm_per_second(speed_key),
            self.settings.get_microns("material_diameter"),
            self.settings.get_percentage("material_flow"),
            thickness,
        );
        config
    }

    fn raft_planner(&self, storage: &SliceDataStorage) -> GCodePlanner {
        GCodePlanner::new(
            &self.gcode,
            storage,
            &storage.retraction_config,
            &self.coasting_config,
            self.settings.get_mm_per_second("speed_travel"),
            self.settings.get_microns("retraction_min_travel"),
            self.settings.get_bool("retraction_combing"),
            0,
            self.settings.get_microns("wall_line_width_0"),
            self.settings.get_bool("travel_avoid_other_parts"),
        )
    }
}
