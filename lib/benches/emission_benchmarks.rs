//! Emission benchmarks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use layercode::geometry::{Point, Point3, Polygon, Polygons};
use layercode::pipeline::FffEmitter;
use layercode::settings::SettingsStore;
use layercode::storage::{SliceDataStorage, SliceLayer, SliceLayerPart, SliceMeshStorage};
use layercode::scale;
use std::sync::Arc;

fn cube_storage(layers: usize) -> (SettingsStore, SliceDataStorage) {
    let mut settings = SettingsStore::with_defaults();
    settings.set("adhesion_type", "None");
    settings.set("machine_start_gcode", "");
    settings.set("machine_end_gcode", "");
    let shared = Arc::new(settings.clone());

    let size = scale(20.0);
    let mut outline = Polygons::new();
    outline.add(Polygon::from_points(vec![
        Point::new(0, 0),
        Point::new(size, 0),
        Point::new(size, size),
        Point::new(0, size),
    ]));

    let mut mesh = SliceMeshStorage::new(shared);
    for _ in 0..layers {
        mesh.layers.push(SliceLayer {
            parts: vec![SliceLayerPart::from_outline(outline.clone(), 2, 400)],
            ..Default::default()
        });
    }
    let mut storage = SliceDataStorage::new();
    storage.meshes.push(mesh);
    storage.model_max = Point3::new(size, size, scale(layers as f64 * 0.1));
    (settings, storage)
}

fn emit_cube_benchmark(c: &mut Criterion) {
    c.bench_function("emit_cube_50_layers", |b| {
        b.iter(|| {
            let (settings, mut storage) = cube_storage(50);
            let mut emitter = FffEmitter::new(settings);
            emitter.write_gcode(black_box(&mut storage)).unwrap();
            black_box(emitter.into_gcode().len())
        })
    });
}

criterion_group!(benches, emit_cube_benchmark);
criterion_main!(benches);
