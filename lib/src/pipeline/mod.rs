//! Emission pipeline orchestration.
//!
//! [`FffEmitter`] drives the whole job: startup or inter-object code,
//! the optional storage rewriter pre-passes, the raft prelude, the layer
//! loop, and finalisation. The per-layer, per-mesh, support, raft and
//! wipe-tower stages live in the sibling modules of this directory.
//!
//! Emission is strictly sequential by design: G-code is an ordered byte
//! stream, so no stage may run out of order or concurrently.

mod layer;
mod mesh;
mod raft;
mod support;
mod wipe_tower;

use crate::config::CoastingConfig;
use crate::gcode::GCodeWriter;
use crate::settings::{AdhesionType, GCodeFlavor, SettingsStore};
use crate::storage::{merge_meshes, stack_layer_parts, SliceDataStorage};
use crate::{Coord, Error, Result, MAX_EXTRUDERS};

/// Sink for streaming results to an attached front-end session.
pub trait ClientSession {
    /// G-code generation is about to begin.
    fn begin_gcode(&mut self);
    /// A layer finished; `gcode` is the stream produced so far.
    fn send_gcode_layer(&mut self, gcode: &str);
    /// Stream a prefix block (flavor metadata) for the finished object.
    fn send_gcode_prefix(&mut self, prefix: &str);
    /// The whole object has been emitted.
    fn end_send_sliced_object(&mut self);
}

/// Top-level G-code emitter.
///
/// Holds the process-wide state that spans objects in a multi-object
/// run: the object counter, the running maximum object height used for
/// inter-object lifts, the planner-internal layer counter, and the
/// rewriter flags. All of it is initialised at construction; nothing
/// lives in process globals.
pub struct FffEmitter {
    settings: SettingsStore,
    gcode: GCodeWriter,
    session: Option<Box<dyn ClientSession>>,
    coasting_config: CoastingConfig,
    /// 1-based object counter; the first object gets startup code,
    /// later ones an inter-object transition.
    file_nr: usize,
    /// Running maximum of `model_max.z` across emitted objects.
    max_object_height: Coord,
    /// Z counter for the layer start position; reset at rewriter seams.
    layer_count: i32,
    is_merge_meshes: bool,
    is_stack_layer_parts: bool,
}

impl FffEmitter {
    /// Create an emitter over the given settings.
    pub fn new(settings: SettingsStore) -> Self {
        let flavor = settings.get_gcode_flavor("machine_gcode_flavor");
        Self {
            settings,
            gcode: GCodeWriter::new(flavor),
            session: None,
            coasting_config: CoastingConfig::default(),
            file_nr: 1,
            max_object_height: 0,
            layer_count: 0,
            is_merge_meshes: false,
            is_stack_layer_parts: false,
        }
    }

    /// Attach a client session to stream progress to.
    pub fn set_session(&mut self, session: Box<dyn ClientSession>) {
        self.session = Some(session);
    }

    /// Settings this emitter reads.
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// The G-code produced so far.
    pub fn content(&self) -> &str {
        self.gcode.content()
    }

    /// Consume the emitter, yielding the finished G-code.
    pub fn into_gcode(self) -> crate::gcode::GCode {
        self.gcode.into_gcode()
    }

    /// Emit the complete G-code for one sliced object.
    ///
    /// The storage is mutated in place by the rewriter pre-passes and the
    /// per-layer path config updates; everything else is read as stored.
    pub fn write_gcode(&mut self, storage: &mut SliceDataStorage) -> Result<()> {
        self.gcode.pre_setup(&self.settings);
        self.gcode.reset_total_print_time();

        if let Some(session) = &mut self.session {
            session.begin_gcode();
        }

        self.set_config_coasting();
        self.set_config_retraction(storage);

        if self.file_nr == 1 {
            self.process_starting_code(storage);
        } else {
            self.process_next_print_object_code(storage);
        }
        self.file_nr += 1;

        if self.settings.get_bool("StackLayerParts") {
            self.is_stack_layer_parts = true;
            stack_layer_parts(storage);
        }
        if self.settings.get_bool("PrintMeshesSeperatly") {
            self.is_merge_meshes = true;
            merge_meshes(storage);
        }

        if self.is_merge_meshes || self.is_stack_layer_parts {
            let gantry_distance = self.settings.get_microns("machine_nozzle_gantry_distance");
            if gantry_distance < storage.model_max.z {
                return Err(Error::GantryClearance {
                    model_max_z: storage.model_max.z,
                    gantry_distance,
                });
            }
        }

        let total_layers = storage.total_layers();
        let has_raft =
            self.settings.get_adhesion_type("adhesion_type") == AdhesionType::Raft;

        if has_raft {
            self.process_raft(storage);
        }

        self.layer_count = 0;
        for layer_nr in 0..total_layers {
            self.process_layer(storage, layer_nr, total_layers, has_raft);
        }

        self.gcode.write_retraction(&storage.retraction_config, true);
        self.gcode.write_fan_command(0.0);

        // Needed to clear this object when traveling to the next one.
        self.max_object_height = self.max_object_height.max(storage.model_max.z);

        self.finalize_machine();

        if let Some(session) = &mut self.session {
            session.send_gcode_layer(self.gcode.content());
            session.end_send_sliced_object();
            if self.gcode.flavor() == GCodeFlavor::UltiGCode {
                let prefix = format!(
                    ";FLAVOR:UltiGCode\n;TIME:{}\n;MATERIAL:{}\n;MATERIAL2:{}\n",
                    self.gcode.get_total_print_time() as i64,
                    self.gcode.get_total_filament_used(0) as i64,
                    self.gcode.get_total_filament_used(1) as i64,
                );
                session.send_gcode_prefix(&prefix);
            }
        }

        Ok(())
    }

    fn set_config_coasting(&mut self) {
        let s = &self.settings;
        self.coasting_config = CoastingConfig {
            enable: s.get_bool("coasting_enable"),
            volume_move: s.get_cubic_millimeters("coasting_volume_move"),
            speed_move: s.get_cubic_millimeters("coasting_speed_move"),
            min_volume_move: s.get_cubic_millimeters("coasting_min_volume_move"),
            volume_retract: s.get_cubic_millimeters("coasting_volume_retract"),
            speed_retract: s.get_cubic_millimeters("coasting_speed_retract"),
            min_volume_retract: s.get_cubic_millimeters("coasting_min_volume_retract"),
        };
    }

    fn set_config_retraction(&self, storage: &mut SliceDataStorage) {
        let s = &self.settings;
        storage.retraction_config = crate::config::RetractionConfig {
            amount: crate::unscale(s.get_microns("retraction_amount")),
            prime_amount: crate::unscale(s.get_microns("retraction_extra_prime_amount")),
            speed: s.get_mm_per_second("retraction_retract_speed"),
            prime_speed: s.get_mm_per_second("retraction_prime_speed"),
            zhop: s.get_microns("retraction_hop"),
        };
    }

    fn process_starting_code(&mut self, storage: &SliceDataStorage) {
        if self.gcode.flavor() == GCodeFlavor::UltiGCode {
            if self.session.is_none() {
                self.gcode
                    .write_code(";FLAVOR:UltiGCode\n;TIME:666\n;MATERIAL:666\n;MATERIAL2:-1\n");
            }
        } else {
            if self.settings.has("material_bed_temperature")
                && self.settings.get_celsius("material_bed_temperature") > 0.0
            {
                self.gcode.write_bed_temperature_command(
                    self.settings.get_celsius("material_bed_temperature"),
                    true,
                );
            }
            // First pass heats all nozzles without blocking, the second
            // waits, so extruders come up to temperature together.
            for wait in [false, true] {
                for mesh in &storage.meshes {
                    if mesh.settings.has("material_print_temperature")
                        && mesh.settings.get_celsius("material_print_temperature") > 0.0
                    {
                        self.gcode.write_temperature_command(
                            mesh.extruder_nr(),
                            mesh.settings.get_celsius("material_print_temperature"),
                            wait,
                        );
                    }
                }
            }
            self.gcode
                .write_code(self.settings.get_string("machine_start_gcode"));
        }
        self.gcode.write_comment(&format!(
            "Generated with layercode {}",
            env!("CARGO_PKG_VERSION")
        ));
        if self.gcode.flavor() == GCodeFlavor::Bfb {
            self.gcode.write_comment("enable auto-retraction");
            let steps = self.settings.get_microns("retraction_amount") * 2560 / 1000;
            self.gcode.write_line(&format!("M227 S{steps} P{steps}"));
        }
    }

    fn process_next_print_object_code(&mut self, storage: &SliceDataStorage) {
        let travel_speed = self.settings.get_mm_per_second("speed_travel");
        self.gcode.write_fan_command(0.0);
        self.gcode.reset_extrusion_value();
        self.gcode.set_z(self.max_object_height + 5_000);
        self.gcode
            .write_move(self.gcode.get_position_xy(), travel_speed, 0.0);
        self.gcode.write_move(
            crate::geometry::Point::new(storage.model_min.x, storage.model_min.y),
            travel_speed,
            0.0,
        );
    }

    fn finalize_machine(&mut self) {
        let travel_speed = self.settings.get_mm_per_second("speed_travel");
        let end_code = self.settings.get_string("machine_end_gcode").to_string();
        self.gcode
            .finalize(self.max_object_height, travel_speed, &end_code);
        for extruder in 0..MAX_EXTRUDERS {
            self.gcode.write_temperature_command(extruder, 0.0, false);
        }
    }
}

pub use layer::calculate_mesh_order;
