//! End-to-end emission tests.
//!
//! These tests build small slice storages by hand, run the full emission
//! pipeline, and assert on the produced G-code stream: layer comments,
//! Z progression, tool changes, wipe tower placement, fan commands and
//! the spiralize bottom shell.

use layercode::geometry::{Point, Point3, Polygon, Polygons};
use layercode::pipeline::FffEmitter;
use layercode::settings::SettingsStore;
use layercode::storage::{SliceDataStorage, SliceLayer, SliceLayerPart, SliceMeshStorage};
use layercode::scale;
use std::sync::Arc;

fn square_at(size_mm: f64, x_mm: f64, y_mm: f64) -> Polygons {
    let size = scale(size_mm);
    let x = scale(x_mm);
    let y = scale(y_mm);
    let mut polys = Polygons::new();
    polys.add(Polygon::from_points(vec![
        Point::new(x, y),
        Point::new(x + size, y),
        Point::new(x + size, y + size),
        Point::new(x, y + size),
    ]));
    polys
}

fn cube_mesh(
    settings: Arc<SettingsStore>,
    layers: usize,
    size_mm: f64,
    origin_mm: f64,
    inset_count: usize,
) -> SliceMeshStorage {
    let mut mesh = SliceMeshStorage::new(settings);
    for _ in 0..layers {
        mesh.layers.push(SliceLayer {
            parts: vec![SliceLayerPart::from_outline(
                square_at(size_mm, origin_mm, origin_mm),
                inset_count,
                400,
            )],
            ..Default::default()
        });
    }
    mesh
}

fn base_settings() -> SettingsStore {
    let mut settings = SettingsStore::with_defaults();
    // Keep the stream minimal and deterministic for assertions.
    settings.set("adhesion_type", "None");
    settings.set("speed_slowdown_layers", "0");
    settings.set("infill_line_distance", "0");
    settings.set("retraction_combing", "false");
    settings.set("cool_min_layer_time", "0");
    settings.set("cool_fan_full_layer", "0");
    settings.set("machine_start_gcode", "");
    settings.set("machine_end_gcode", "");
    settings
}

fn single_cube_storage(settings: &Arc<SettingsStore>, layers: usize) -> SliceDataStorage {
    let mut storage = SliceDataStorage::new();
    storage
        .meshes
        .push(cube_mesh(settings.clone(), layers, 10.0, 0.0, 2));
    storage.model_max = Point3::new(scale(10.0), scale(10.0), scale(layers as f64 * 0.1 + 0.2));
    storage
}

fn emit(settings: SettingsStore, storage: &mut SliceDataStorage) -> String {
    let mut emitter = FffEmitter::new(settings);
    emitter.write_gcode(storage).expect("emission failed");
    emitter.into_gcode().into()
}

/// Z values of all motion lines, in order of appearance.
fn z_values(gcode: &str) -> Vec<f64> {
    gcode
        .lines()
        .filter(|line| line.starts_with("G0") || line.starts_with("G1"))
        .filter_map(|line| {
            line.split_whitespace()
                .find(|word| word.starts_with('Z'))
                .and_then(|word| word[1..].parse::<f64>().ok())
        })
        .collect()
}

fn layer_comment_count(gcode: &str) -> usize {
    gcode
        .lines()
        .filter(|line| line.starts_with(";LAYER:") && !line.starts_with(";LAYER:-"))
        .count()
}

#[test]
fn single_cube_three_layers() {
    let settings = Arc::new(base_settings());
    let mut storage = single_cube_storage(&settings, 3);
    let gcode = emit(base_settings(), &mut storage);

    assert_eq!(layer_comment_count(&gcode), 3);

    // Z strictly increases layer over layer.
    let zs = z_values(&gcode);
    assert!(!zs.is_empty());
    let mut print_zs: Vec<f64> = Vec::new();
    for z in zs {
        if !print_zs.contains(&z) {
            print_zs.push(z);
        }
    }
    // Final park move goes up as well, so the full sequence climbs.
    for pair in print_zs.windows(2) {
        assert!(pair[1] > pair[0], "Z went backwards: {pair:?}");
    }

    // Inner walls print before the outer wall in every layer.
    for layer in gcode.split(";LAYER:").skip(1).take(3) {
        let inner = layer.find("TYPE:WALL-INNER").expect("no inner wall");
        let outer = layer.find("TYPE:WALL-OUTER").expect("no outer wall");
        assert!(inner < outer, "outer wall printed before inner");
    }

    // Single extruder: no tool change, no wipe tower.
    assert!(!gcode.lines().any(|line| line.starts_with('T')));
}

#[test]
fn emission_is_deterministic() {
    let settings = Arc::new(base_settings());

    let mut storage_a = single_cube_storage(&settings, 3);
    let mut storage_b = single_cube_storage(&settings, 3);

    let first = emit(base_settings(), &mut storage_a);
    let second = emit(base_settings(), &mut storage_b);
    assert_eq!(first, second);
}

#[test]
fn merge_meshes_prints_objects_sequentially() {
    let mut settings = base_settings();
    settings.set("PrintMeshesSeperatly", "true");
    let shared = Arc::new(settings.clone());

    let mut storage = SliceDataStorage::new();
    storage
        .meshes
        .push(cube_mesh(shared.clone(), 5, 10.0, 0.0, 2));
    storage
        .meshes
        .push(cube_mesh(shared.clone(), 5, 10.0, 30.0, 2));
    storage.model_min = Point3::new(0, 0, 0);
    storage.model_max = Point3::new(scale(40.0), scale(40.0), scale(0.8));

    let gcode = emit(settings, &mut storage);

    assert_eq!(layer_comment_count(&gcode), 10);

    // Exactly one lifted seam: a single standalone descend move written
    // after the travel onto the second cube.
    let descends: Vec<&str> = gcode
        .lines()
        .filter(|line| line.starts_with("G0 Z"))
        .collect();
    assert_eq!(descends.len(), 1, "expected one seam descend: {descends:?}");

    // The travel right before the descend is lifted at least 10mm and
    // lands on the second cube.
    let lines: Vec<&str> = gcode.lines().collect();
    let descend_idx = lines
        .iter()
        .position(|line| line.starts_with("G0 Z"))
        .unwrap();
    let travel = lines[..descend_idx]
        .iter()
        .rev()
        .find(|line| line.starts_with("G0") && line.contains("X"))
        .expect("no travel before seam descend");
    let z_word = travel
        .split_whitespace()
        .find(|word| word.starts_with('Z'))
        .expect("seam travel carries no Z");
    let z: f64 = z_word[1..].parse().unwrap();
    assert!(z >= 10.0, "seam travel not lifted: {travel}");
    let x_word = travel
        .split_whitespace()
        .find(|word| word.starts_with('X'))
        .unwrap();
    let x: f64 = x_word[1..].parse().unwrap();
    assert!((29.0..=41.0).contains(&x), "seam travel missed the second cube: {travel}");
}

#[test]
fn gantry_clearance_failure_surfaces_as_error() {
    let mut settings = base_settings();
    settings.set("PrintMeshesSeperatly", "true");
    settings.set("machine_nozzle_gantry_distance", "10");
    let shared = Arc::new(settings.clone());

    let mut storage = SliceDataStorage::new();
    storage.meshes.push(cube_mesh(shared.clone(), 5, 10.0, 0.0, 2));
    storage.meshes.push(cube_mesh(shared, 5, 10.0, 30.0, 2));
    storage.model_max = Point3::new(scale(40.0), scale(40.0), scale(20.0));

    let mut emitter = FffEmitter::new(settings);
    let result = emitter.write_gcode(&mut storage);
    assert!(matches!(
        result,
        Err(layercode::Error::GantryClearance { .. })
    ));
}

#[test]
fn raft_emits_virtual_layers_before_layer_zero() {
    let settings = {
        let mut s = base_settings();
        s.set("adhesion_type", "Raft");
        s.set("raft_surface_layers", "2");
        s
    };
    let shared = Arc::new(settings.clone());
    let mut storage = single_cube_storage(&shared, 2);
    storage.raft_outline = square_at(14.0, -2.0, -2.0);

    let gcode = emit(settings, &mut storage);

    let comments: Vec<&str> = gcode
        .lines()
        .filter(|line| line.starts_with(";LAYER:"))
        .collect();
    // Base, interface, two surfaces, then the object layers.
    assert_eq!(
        &comments[..5],
        &[";LAYER:-2", ";LAYER:-1", ";LAYER:-1", ";LAYER:-1", ";LAYER:0"]
    );
    assert_eq!(gcode.matches(";RAFT").count(), 4);

    // Raft sits below the object: first object layer Z clears the raft
    // stack plus air gap.
    let object_section = gcode.split(";LAYER:0").nth(1).unwrap();
    let first_z = z_values(object_section)[0];
    assert!(first_z > 1.0, "object not lifted above raft: {first_z}");
}

#[test]
fn extruder_change_emits_wipe_tower() {
    let mut settings = base_settings();
    settings.set("wipe_tower_size", "15");

    let mut settings_e1 = settings.clone();
    settings_e1.set("extruder_nr", "1");

    let mut storage = SliceDataStorage::new();
    storage
        .meshes
        .push(cube_mesh(Arc::new(settings.clone()), 2, 10.0, 0.0, 1));
    storage
        .meshes
        .push(cube_mesh(Arc::new(settings_e1), 2, 10.0, 20.0, 1));
    storage.wipe_tower = square_at(8.0, 60.0, 60.0);
    storage.wipe_point = Point::new(scale(64.0), scale(64.0));
    storage.model_max = Point3::new(scale(30.0), scale(30.0), scale(0.4));

    let gcode = emit(settings, &mut storage);

    let lines: Vec<&str> = gcode.lines().collect();
    let tool_changes: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| matches!(**line, "T0" | "T1"))
        .map(|(i, _)| i)
        .collect();
    // One switch per layer: L0 switches to E1, L1 starts on E1 and
    // switches back to E0.
    assert_eq!(tool_changes.len(), 2);

    // Each tool change is immediately followed by wipe tower walls.
    for &idx in &tool_changes {
        let first_extrusion = lines[idx..]
            .iter()
            .find(|line| line.starts_with("G1") && line.contains("X") && line.contains("E"))
            .expect("no extrusion after tool change");
        let x_word = first_extrusion
            .split_whitespace()
            .find(|word| word.starts_with('X'))
            .unwrap();
        let x: f64 = x_word[1..].parse().unwrap();
        assert!(
            (55.0..=70.0).contains(&x),
            "first extrusion after tool change is not on the wipe tower: {first_extrusion}"
        );
    }
}

#[test]
fn fast_layer_gets_max_fan_and_slowdown() {
    let mut settings = base_settings();
    settings.set("cool_min_layer_time", "10");
    settings.set("cool_min_layer_time_fan_speed_max", "20");
    settings.set("cool_fan_speed_min", "40");
    settings.set("cool_fan_speed_max", "100");
    settings.set("cool_min_speed", "5");
    let shared = Arc::new(settings.clone());
    let mut storage = single_cube_storage(&shared, 2);

    let gcode = emit(settings, &mut storage);

    // A 10mm cube layer takes well under 10s, so the fan runs at max.
    assert!(gcode.contains("M106 S255"));

    // The walls were slowed down: nominal outer wall is 30mm/s (F1800),
    // the stretched layer must print slower than that.
    let outer_section = gcode.split("TYPE:WALL-OUTER").nth(1).unwrap();
    let wall_move = outer_section
        .lines()
        .find(|line| line.starts_with("G1") && line.contains('X') && line.contains('E'))
        .expect("no wall extrusion after outer wall comment");
    let feedrate = wall_move
        .split_whitespace()
        .find(|word| word.starts_with('F'))
        .map(|word| word[1..].parse::<f64>().unwrap())
        .expect("wall extrusion carries no feedrate");
    assert!(feedrate < 1800.0, "no cooling slowdown applied: F{feedrate}");
}

#[test]
fn skirt_only_on_first_layer() {
    let settings = base_settings();
    let shared = Arc::new(settings.clone());
    let mut storage = single_cube_storage(&shared, 3);
    storage.skirt = square_at(16.0, -3.0, -3.0);

    let gcode = emit(settings, &mut storage);

    // The skirt walks under the skirt config (tagged SKIN); with no skin
    // regions in this storage it must appear in layer 0 only.
    let layers: Vec<&str> = gcode.split(";LAYER:").collect();
    assert!(layers[1].contains("TYPE:SKIN"));
    for layer in &layers[2..] {
        assert!(!layer.contains("TYPE:SKIN"), "skirt re-emitted above layer 0");
    }
}

#[test]
fn spiralize_emits_bottom_shell_at_transition_layer() {
    let mut settings = base_settings();
    settings.set("magic_spiralize", "true");
    settings.set("bottom_layers", "3");
    settings.set("wall_line_count", "1");
    let shared = Arc::new(settings.clone());

    let mut storage = SliceDataStorage::new();
    storage.meshes.push(cube_mesh(shared, 5, 10.0, 0.0, 1));
    storage.model_max = Point3::new(scale(10.0), scale(10.0), scale(0.7));

    let gcode = emit(settings, &mut storage);
    let layers: Vec<&str> = gcode.split(";LAYER:").collect();

    // Layer 3: the final non-spiral bottom shell under the inner-wall
    // config plus the spiralized outer wall.
    let transition = layers[4];
    assert!(transition.starts_with('3'));
    assert!(transition.contains("TYPE:WALL-INNER"));
    assert!(transition.contains("TYPE:WALL-OUTER"));

    // Layer 4: pure spiral; Z ramps within the layer.
    let spiral = layers[5];
    assert!(spiral.starts_with('4'));
    assert!(!spiral.contains("TYPE:WALL-INNER"));
    let zs = z_values(spiral);
    assert!(zs.len() > 2, "spiral layer should ramp Z continuously: {zs:?}");

    // Layers below the transition print a plain outer wall.
    let flat = layers[2];
    assert!(flat.starts_with('1'));
    assert!(!flat.contains("TYPE:WALL-INNER"));
    assert!(flat.contains("TYPE:WALL-OUTER"));
}

#[test]
fn support_islands_emitted_with_support_config() {
    let mut settings = base_settings();
    settings.set("support_pattern", "Lines");
    settings.set("support_line_distance", "2.0");
    let shared = Arc::new(settings.clone());

    let mut storage = single_cube_storage(&shared, 2);
    storage.support.generated = true;
    storage.support.support_areas_per_layer =
        vec![square_at(6.0, 20.0, 20.0), square_at(6.0, 20.0, 20.0)];

    let gcode = emit(settings, &mut storage);
    assert!(gcode.contains("TYPE:SUPPORT"));

    // Support appears in both layers.
    for layer in gcode.split(";LAYER:").skip(1).take(2) {
        assert!(layer.contains("TYPE:SUPPORT"), "missing support in a layer");
    }

    // The sticky first layer fills at a flat 150% overlap, so its grid
    // reaches past the island outline (x >= 20mm); later layers fill at
    // zero overlap and stay inside it.
    let support_min_x = |layer: &str| -> f64 {
        layer
            .split("TYPE:SUPPORT")
            .nth(1)
            .expect("no support section")
            .lines()
            .filter(|line| line.starts_with("G1") && line.contains('X') && line.contains('E'))
            .filter_map(|line| {
                line.split_whitespace()
                    .find(|word| word.starts_with('X'))
                    .and_then(|word| word[1..].parse::<f64>().ok())
            })
            .fold(f64::INFINITY, f64::min)
    };
    let layers: Vec<&str> = gcode.split(";LAYER:").collect();
    assert!(
        support_min_x(layers[1]) < 19.9,
        "first-layer support grid should overshoot the island"
    );
    assert!(
        support_min_x(layers[2]) > 19.9,
        "upper-layer support should stay within the island"
    );
}

#[test]
fn ultigcode_flavor_uses_firmware_retraction_and_prefix() {
    let mut settings = base_settings();
    settings.set("machine_gcode_flavor", "UltiGCode");
    settings.set("retraction_combing", "false");
    let shared = Arc::new(settings.clone());
    let mut storage = single_cube_storage(&shared, 2);

    let gcode = emit(settings, &mut storage);

    // Placeholder prefix is written when no session is attached.
    assert!(gcode.starts_with(";FLAVOR:UltiGCode"));
    assert!(gcode.contains(";MATERIAL2:-1"));
    // No M104/M109 preheat in this dialect.
    let body = gcode.split(";LAYER:0").next().unwrap();
    assert!(!body.contains("M109"));
}

#[test]
fn stack_layer_parts_flattens_two_towers() {
    let mut settings = base_settings();
    settings.set("StackLayerParts", "true");
    let shared = Arc::new(settings.clone());

    // Two separate towers in each layer.
    let mut mesh = SliceMeshStorage::new(shared);
    for _ in 0..3 {
        mesh.layers.push(SliceLayer {
            parts: vec![
                SliceLayerPart::from_outline(square_at(8.0, 0.0, 0.0), 1, 400),
                SliceLayerPart::from_outline(square_at(8.0, 30.0, 0.0), 1, 400),
            ],
            ..Default::default()
        });
    }
    let mut storage = SliceDataStorage::new();
    storage.meshes.push(mesh);
    storage.model_max = Point3::new(scale(38.0), scale(8.0), scale(0.5));

    let gcode = emit(settings, &mut storage);

    // Two stacks of three layers each.
    assert_eq!(layer_comment_count(&gcode), 6);
    // One seam between the stacks.
    assert_eq!(
        gcode.lines().filter(|line| line.starts_with("G0 Z")).count(),
        1
    );
}
