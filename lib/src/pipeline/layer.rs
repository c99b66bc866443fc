//! Per-layer emission: start position, skirt, ooze shield, support
//! ordering, mesh ordering, cooling and the planner drain.

use super::FffEmitter;
use crate::config::GCodePathConfig;
use crate::gcode::{fan_speed_for_layer, CoolingSettings, GCodePlanner};
use crate::storage::{SliceDataStorage, SliceMeshStorage};
use crate::{Coord, MAX_INFILL_COMBINE};
use log::debug;

impl FffEmitter {
    /// Emit one layer: configs, planner, start position, skirt, support,
    /// ooze shield, meshes, cooling, drain.
    pub(super) fn process_layer(
        &mut self,
        storage: &mut SliceDataStorage,
        layer_nr: usize,
        total_layers: usize,
        has_raft: bool,
    ) {
        debug!("emitting layer {}/{}", layer_nr + 1, total_layers);

        let layer_thickness = if layer_nr == 0 {
            self.settings.get_microns("layer_height_0")
        } else {
            self.settings.get_microns("layer_height")
        };

        self.set_config_skirt(storage, layer_thickness);
        self.set_config_support(storage, layer_thickness);
        for mesh in &mut storage.meshes {
            set_config_insets(mesh, layer_thickness);
            set_config_skin(mesh, layer_thickness);
            set_config_infill(mesh, layer_thickness);
        }
        self.process_initial_layers_speedup(storage, layer_nr);

        self.gcode.write_layer_comment(layer_nr as i32);

        let storage = &*storage;
        let mut planner = self.create_layer_planner(storage, layer_nr);
        let combing = self.settings.get_bool("retraction_combing");
        if !combing {
            planner.set_always_retract(true);
        }

        self.process_layer_start_pos(storage, layer_nr, has_raft);

        self.process_skirt(storage, &mut planner, layer_nr);

        let support_extruder = self.settings.get_index("support_extruder_nr");
        let print_support_first = storage.support.generated
            && support_extruder > 0
            && support_extruder as usize == planner.get_extruder();
        if print_support_first {
            self.add_support_to_gcode(storage, &mut planner, layer_nr);
        }

        self.process_ooze_shield(storage, &mut planner, layer_nr);

        let magic_polygon_mode = self.settings.get_bool("magic_polygon_mode");
        for mesh_idx in calculate_mesh_order(storage, planner.get_extruder()) {
            if magic_polygon_mode {
                self.add_mesh_layer_magic_polygon_mode(storage, mesh_idx, &mut planner, layer_nr);
            } else {
                self.add_mesh_layer_to_gcode(storage, mesh_idx, &mut planner, layer_nr);
            }
        }

        if !print_support_first {
            self.add_support_to_gcode(storage, &mut planner, layer_nr);
        }

        let cooling = self.process_fan_speed_and_minimal_layer_time(&mut planner, layer_nr);

        // The drain flag is the previous layer's seam marker; distinct
        // from the two-layer window used for the start position.
        let is_new_layer =
            layer_nr > 0 && storage.meshes[0].layers[layer_nr - 1].is_new_layer;
        self.gcode
            .write_comment(&format!("NEW LAYER: {}", is_new_layer as u8));

        planner.write_gcode(&mut self.gcode, cooling.lift_head, layer_thickness, is_new_layer);

        if let Some(session) = &mut self.session {
            session.send_gcode_layer(self.gcode.content());
        }
    }

    fn create_layer_planner(
        &self,
        storage: &SliceDataStorage,
        layer_nr: usize,
    ) -> GCodePlanner {
        GCodePlanner::new(
            &self.gcode,
            storage,
            &storage.retraction_config,
            &self.coasting_config,
            self.settings.get_mm_per_second("speed_travel"),
            self.settings.get_microns("retraction_min_travel"),
            self.settings.get_bool("retraction_combing"),
            layer_nr,
            self.settings.get_microns("wall_line_width_0"),
            self.settings.get_bool("travel_avoid_other_parts"),
        )
    }

    /// Apply the first-layers speed ramp to every regional config.
    fn process_initial_layers_speedup(&self, storage: &mut SliceDataStorage, layer_nr: usize) {
        let slowdown_layers = self.settings.get_count("speed_slowdown_layers");
        if (layer_nr as i32) >= slowdown_layers {
            return;
        }
        let initial_speed = self.settings.get_mm_per_second("speed_layer_0");
        let layer_nr = layer_nr as i32;
        storage
            .support_config
            .smooth_speed(initial_speed, layer_nr, slowdown_layers);
        for mesh in &mut storage.meshes {
            mesh.inset0_config
                .smooth_speed(initial_speed, layer_nr, slowdown_layers);
            mesh.insetx_config
                .smooth_speed(initial_speed, layer_nr, slowdown_layers);
            mesh.skin_config
                .smooth_speed(initial_speed, layer_nr, slowdown_layers);
            for config in &mut mesh.infill_config {
                config.smooth_speed(initial_speed, layer_nr, slowdown_layers);
            }
        }
    }

    /// Compute the layer Z and position the head for it.
    ///
    /// The seam flag's effect spans two layers: the marked layer emits
    /// nothing (its meshes are gated off), so the layer after it is the
    /// new stack's first physical layer and must restart the Z numbering
    /// too. On a seam the head is parked 10mm above the current Z and the
    /// writer descends to the real Z after the travel to the new object.
    fn process_layer_start_pos(
        &mut self,
        storage: &SliceDataStorage,
        layer_nr: usize,
        has_raft: bool,
    ) {
        let layers = &storage.meshes[0].layers;
        let mut is_new_layer = layers[layer_nr].is_new_layer;
        if !is_new_layer && layer_nr > 0 && layers[layer_nr - 1].is_new_layer {
            is_new_layer = true;
        }

        if is_new_layer {
            self.layer_count = 0;
        }
        self.layer_count += 1;

        let mut z = self.settings.get_microns("layer_height_0")
            + self.layer_count as Coord * self.settings.get_microns("layer_height");

        if has_raft {
            z += self.settings.get_microns("raft_base_thickness")
                + self.settings.get_microns("raft_interface_thickness")
                + self.settings.get_count("raft_surface_layers") as Coord
                    * self.settings.get_microns("raft_surface_thickness");
            z += if layer_nr == 0 {
                self.settings.get_microns("raft_airgap_layer_0")
            } else {
                self.settings.get_microns("raft_airgap")
            };
        }

        if (self.is_merge_meshes || self.is_stack_layer_parts) && is_new_layer {
            self.gcode.set_next_z(z);
            self.gcode.set_z(self.gcode.get_position_z() + 10_000);
        } else {
            self.gcode.reset_start_position();
            self.gcode.set_z(z);
        }
    }

    /// Walk the skirt at layer 0, entering at the point nearest the head.
    fn process_skirt(
        &mut self,
        storage: &SliceDataStorage,
        planner: &mut GCodePlanner,
        layer_nr: usize,
    ) {
        if layer_nr != 0 {
            return;
        }
        if let Some(last) = storage.skirt.last() {
            planner.add_travel(last.closest_point_to(self.gcode.get_position_xy()));
        }
        planner.add_polygons_by_optimizer(&storage.skirt, &storage.skirt_config);
    }

    /// Walk the ooze shield with retraction forced on: its whole point
    /// is catching ooze, so every approach must be depressurised.
    fn process_ooze_shield(
        &mut self,
        storage: &SliceDataStorage,
        planner: &mut GCodePlanner,
        layer_nr: usize,
    ) {
        let Some(shield) = storage.ooze_shield.get(layer_nr) else {
            return;
        };
        if shield.is_empty() {
            return;
        }
        planner.set_always_retract(true);
        planner.add_polygons_by_optimizer(shield, &storage.skirt_config);
        planner.set_always_retract(!self.settings.get_bool("retraction_combing"));
    }

    /// Run the cooling controller: stretch the layer to the minimum time
    /// and command the interpolated fan speed.
    fn process_fan_speed_and_minimal_layer_time(
        &mut self,
        planner: &mut GCodePlanner,
        layer_nr: usize,
    ) -> CoolingSettings {
        let cooling = CoolingSettings::from_settings(&self.settings);
        let (travel_time, extrude_time) = planner.get_times();
        planner.force_minimal_layer_time(
            cooling.min_layer_time,
            cooling.min_speed,
            travel_time,
            extrude_time,
        );

        let fan_speed =
            fan_speed_for_layer(&cooling, layer_nr as i32, travel_time + extrude_time);
        self.gcode.write_fan_command(fan_speed);
        cooling
    }

    pub(super) fn set_config_skirt(&self, storage: &mut SliceDataStorage, layer_thickness: Coord) {
        let s = &self.settings;
        storage.skirt_config.configure(
            s.get_microns("skirt_line_width"),
            s.get_mm_per_second("skirt_speed"),
            s.get_microns("material_diameter"),
            s.get_percentage("material_flow"),
            layer_thickness,
        );
    }

    pub(super) fn set_config_support(&self, storage: &mut SliceDataStorage, layer_thickness: Coord) {
        let s = &self.settings;
        storage.support_config.configure(
            s.get_microns("support_line_width"),
            s.get_mm_per_second("speed_support"),
            s.get_microns("material_diameter"),
            s.get_percentage("material_flow"),
            layer_thickness,
        );
    }
}

/// Mesh emission order: everything on the current extruder first (in
/// storage order), then the next extruder's bucket, until all meshes are
/// placed. Minimises tool changes without reordering within a bucket.
pub fn calculate_mesh_order(storage: &SliceDataStorage, current_extruder: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(storage.meshes.len());
    let mut remaining: Vec<usize> = (0..storage.meshes.len()).collect();

    let mut extruder = current_extruder;
    while !remaining.is_empty() {
        remaining.retain(|&idx| {
            if storage.meshes[idx].extruder_nr() == extruder {
                order.push(idx);
                false
            } else {
                true
            }
        });
        if let Some(&next) = remaining.first() {
            extruder = storage.meshes[next].extruder_nr();
        }
    }
    order
}

fn set_config_insets(mesh: &mut SliceMeshStorage, layer_thickness: Coord) {
    let s = mesh.settings.clone();
    mesh.inset0_config.configure(
        s.get_microns("wall_line_width_0"),
        s.get_mm_per_second("speed_wall_0"),
        s.get_microns("material_diameter"),
        s.get_percentage("material_flow"),
        layer_thickness,
    );
    mesh.inset0_config.spiralize = false;
    mesh.insetx_config.configure(
        s.get_microns("wall_line_width_x"),
        s.get_mm_per_second("speed_wall_x"),
        s.get_microns("material_diameter"),
        s.get_percentage("material_flow"),
        layer_thickness,
    );
}

fn set_config_skin(mesh: &mut SliceMeshStorage, layer_thickness: Coord) {
    let s = mesh.settings.clone();
    mesh.skin_config.configure(
        s.get_microns("skin_line_width"),
        s.get_mm_per_second("speed_topbottom"),
        s.get_microns("material_diameter"),
        s.get_percentage("material_flow"),
        layer_thickness,
    );
}

fn set_config_infill(mesh: &mut SliceMeshStorage, layer_thickness: Coord) {
    let s = mesh.settings.clone();
    for idx in 0..MAX_INFILL_COMBINE {
        mesh.infill_config[idx].configure(
            s.get_microns("infill_line_width") * (idx as Coord + 1),
            s.get_mm_per_second("speed_infill"),
            s.get_microns("material_diameter"),
            s.get_percentage("material_flow"),
            layer_thickness,
        );
    }
}

/// Effective config handed to the planner when a flag mutates behaviour:
/// clone, adjust, pass by value so stored configs stay untouched.
pub(super) fn spiralized(config: &GCodePathConfig) -> GCodePathConfig {
    let mut config = config.clone();
    config.spiralize = true;
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;
    use std::sync::Arc;

    fn storage_with_extruders(extruders: &[usize]) -> SliceDataStorage {
        let mut storage = SliceDataStorage::new();
        for &e in extruders {
            let mut settings = SettingsStore::with_defaults();
            settings.set("extruder_nr", e.to_string());
            storage
                .meshes
                .push(SliceMeshStorage::new(Arc::new(settings)));
        }
        storage
    }

    #[test]
    fn test_mesh_order_prefers_current_extruder() {
        let storage = storage_with_extruders(&[0, 1, 0]);
        assert_eq!(calculate_mesh_order(&storage, 1), vec![1, 0, 2]);
        assert_eq!(calculate_mesh_order(&storage, 0), vec![0, 2, 1]);
    }

    #[test]
    fn test_mesh_order_stable_within_bucket() {
        let storage = storage_with_extruders(&[1, 1, 0, 1]);
        assert_eq!(calculate_mesh_order(&storage, 1), vec![0, 1, 3, 2]);
    }

    #[test]
    fn test_mesh_order_empty_storage() {
        let storage = SliceDataStorage::new();
        assert!(calculate_mesh_order(&storage, 0).is_empty());
    }
}
