//! Support emission: per-layer support islands with pattern-selected
//! fill.

use super::FffEmitter;
use crate::gcode::{GCodePlanner, PathOrderOptimizer};
use crate::infill::{generate_grid_infill, generate_line_infill, generate_zigzag_infill};
use crate::settings::SupportPattern;
use crate::storage::SliceDataStorage;
use log::warn;

impl FffEmitter {
    /// Emit this layer's support islands under the support config.
    pub(super) fn add_support_to_gcode(
        &mut self,
        storage: &SliceDataStorage,
        planner: &mut GCodePlanner,
        layer_nr: usize,
    ) {
        if !storage.support.generated {
            return;
        }

        let support_line_distance = self.settings.get_microns("support_line_distance");
        let extrusion_width = storage.support_config.line_width;
        let infill_overlap = self.settings.get_percentage("fill_overlap");
        let pattern = match self.settings.get_support_pattern("support_pattern") {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!("{err}; skipping support");
                return;
            }
        };

        let support_extruder = self.settings.get_index("support_extruder_nr");
        if support_extruder > -1 {
            let prev_extruder = planner.get_extruder();
            if planner.set_extruder(support_extruder as usize) {
                self.add_wipe_tower(storage, planner, layer_nr, prev_extruder);
            }
        }

        let Some(support) = storage.support.support_areas_per_layer.get(layer_nr) else {
            return;
        };

        let islands = support.split_into_parts();
        let mut optimizer = PathOrderOptimizer::new(self.gcode.get_position_xy());
        for island in &islands {
            optimizer.add_polygon(&island[0]);
        }
        optimizer.optimize();

        for &island_idx in &optimizer.poly_order {
            let island = &islands[island_idx];

            let mut support_lines = crate::geometry::Polygons::new();
            if support_line_distance > 0 {
                match pattern {
                    SupportPattern::Grid => {
                        if support_line_distance > extrusion_width * 4 {
                            support_lines = generate_grid_infill(
                                island,
                                0,
                                extrusion_width,
                                support_line_distance * 2,
                                infill_overlap,
                                0.0,
                            );
                        } else {
                            let angle = if layer_nr & 1 == 1 { 0.0 } else { 90.0 };
                            support_lines = generate_line_infill(
                                island,
                                0,
                                extrusion_width,
                                support_line_distance,
                                infill_overlap,
                                angle,
                            );
                        }
                    }
                    SupportPattern::Lines => {
                        if layer_nr == 0 {
                            // Sticky first layer: dense grid at 150% overlap.
                            support_lines = generate_grid_infill(
                                island,
                                0,
                                extrusion_width,
                                support_line_distance,
                                150.0,
                                0.0,
                            );
                        } else {
                            support_lines = generate_line_infill(
                                island,
                                0,
                                extrusion_width,
                                support_line_distance,
                                0.0,
                                0.0,
                            );
                        }
                    }
                    SupportPattern::ZigZag => {
                        if layer_nr == 0 {
                            support_lines = generate_grid_infill(
                                island,
                                0,
                                extrusion_width,
                                support_line_distance,
                                150.0,
                                0.0,
                            );
                        } else {
                            support_lines = generate_zigzag_infill(
                                island,
                                extrusion_width,
                                support_line_distance,
                                0.0,
                                0.0,
                                self.settings.get_bool("support_connect_zigzags"),
                            );
                        }
                    }
                }
            }

            if pattern == SupportPattern::Grid
                || (pattern == SupportPattern::ZigZag && layer_nr == 0)
            {
                planner.add_polygons_by_optimizer(island, &storage.support_config);
            }
            planner.add_lines_by_optimizer(&support_lines, &storage.support_config);
        }
    }
}
