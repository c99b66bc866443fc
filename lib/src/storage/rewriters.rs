//! Storage rewriter pre-passes.
//!
//! Both rewriters restructure the layered storage so that the unchanged
//! emission loop prints several things one after another simply by
//! walking a longer layer list. Seams between the concatenated pieces
//! are flagged with `is_new_layer`; the layer emitter restarts its Z
//! numbering there and lifts clear of the finished geometry.

use super::{SliceDataStorage, SliceLayer};
use crate::geometry::Polygons;
use log::warn;

/// Rewrite each mesh so every layer holds at most one part, stacking the
/// k-th part of every layer into its own contiguous run of layers.
///
/// Stacks are concatenated in reverse bucket order; the first layer of
/// every stack after the first is flagged `is_new_layer`. Support areas
/// are replicated once per extra stack so the (now longer) layer index
/// range stays in bounds. Layers missing a k-th part simply contribute
/// nothing to stack k.
pub fn stack_layer_parts(storage: &mut SliceDataStorage) {
    for mesh in &mut storage.meshes {
        let mut stacks: Vec<Vec<SliceLayer>> = Vec::new();

        for layer in &mesh.layers {
            for (index, part) in layer.parts.iter().enumerate() {
                if index == stacks.len() {
                    stacks.push(Vec::new());
                }
                let mut single = layer.clone();
                single.parts.clear();
                single.parts.push(part.clone());
                stacks[index].push(single);
            }
        }

        mesh.layers.clear();

        let originals: Vec<Polygons> = storage.support.support_areas_per_layer.clone();
        for _ in 1..stacks.len().max(1) {
            storage
                .support
                .support_areas_per_layer
                .extend(originals.iter().cloned());
        }

        for (stack_nr, stack) in stacks.into_iter().rev().enumerate() {
            for (layer_nr, mut layer) in stack.into_iter().enumerate() {
                if layer_nr == 0 && stack_nr > 0 {
                    layer.is_new_layer = true;
                }
                mesh.layers.push(layer);
            }
        }
    }
}

/// Concatenate every mesh's layers into mesh 0 so objects print one at a
/// time, then drop the other meshes.
///
/// The first layer of every mesh after the first is flagged
/// `is_new_layer` (already-set flags are preserved). Support areas are
/// replicated once per extra mesh. With a single mesh this is a no-op
/// apart from a logged warning.
pub fn merge_meshes(storage: &mut SliceDataStorage) {
    if storage.meshes.len() == 1 {
        warn!("merge-meshes requested but only one mesh is loaded");
        return;
    }

    let mut layers: Vec<SliceLayer> = Vec::new();
    for (mesh_nr, mesh) in storage.meshes.iter().enumerate() {
        for (layer_nr, layer) in mesh.layers.iter().enumerate() {
            let mut layer = layer.clone();
            if layer_nr == 0 && mesh_nr > 0 {
                layer.is_new_layer = true;
            }
            layers.push(layer);
        }
    }

    let originals: Vec<Polygons> = storage.support.support_areas_per_layer.clone();
    while storage.meshes.len() > 1 {
        storage.meshes.pop();
        storage
            .support
            .support_areas_per_layer
            .extend(originals.iter().cloned());
    }

    storage.meshes[0].layers = layers;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};
    use crate::settings::SettingsStore;
    use crate::storage::{SliceLayerPart, SliceMeshStorage};
    use std::sync::Arc;

    fn square(size: i64) -> Polygons {
        let mut polys = Polygons::new();
        polys.add(Polygon::from_points(vec![
            Point::new(0, 0),
            Point::new(size, 0),
            Point::new(size, size),
            Point::new(0, size),
        ]));
        polys
    }

    fn mesh_with_layers(part_counts: &[usize]) -> SliceMeshStorage {
        let settings = Arc::new(SettingsStore::with_defaults());
        let mut mesh = SliceMeshStorage::new(settings);
        for &count in part_counts {
            let parts = (0..count)
                .map(|_| SliceLayerPart::from_outline(square(10_000), 1, 400))
                .collect();
            mesh.layers.push(SliceLayer {
                parts,
                ..Default::default()
            });
        }
        mesh
    }

    #[test]
    fn test_stack_layer_parts_single_part_per_layer() {
        let mut storage = SliceDataStorage::new();
        storage.meshes.push(mesh_with_layers(&[2, 2, 2]));
        storage.support.support_areas_per_layer = vec![Polygons::new(); 3];

        stack_layer_parts(&mut storage);

        let mesh = &storage.meshes[0];
        assert_eq!(mesh.layers.len(), 6);
        assert!(mesh.layers.iter().all(|layer| layer.parts.len() <= 1));
        // Two stacks, reverse order: seam at the start of the second stack.
        let seams: Vec<usize> = mesh
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_new_layer)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(seams, vec![3]);
        assert_eq!(storage.support.support_areas_per_layer.len(), 6);
    }

    #[test]
    fn test_stack_layer_parts_ragged_part_counts() {
        let mut storage = SliceDataStorage::new();
        // Deeper layers have an extra part; the extra stack starts above
        // the others but still prints.
        storage.meshes.push(mesh_with_layers(&[1, 2, 2]));

        stack_layer_parts(&mut storage);

        let mesh = &storage.meshes[0];
        assert_eq!(mesh.layers.len(), 5);
        // Reverse bucket order: the short stack (2 layers) comes first.
        assert!(!mesh.layers[0].is_new_layer);
        assert!(mesh.layers[2].is_new_layer);
    }

    #[test]
    fn test_merge_meshes_concatenates() {
        let mut storage = SliceDataStorage::new();
        storage.meshes.push(mesh_with_layers(&[1, 1, 1, 1, 1]));
        storage.meshes.push(mesh_with_layers(&[1, 1, 1, 1, 1]));
        storage.support.support_areas_per_layer = vec![Polygons::new(); 5];

        merge_meshes(&mut storage);

        assert_eq!(storage.meshes.len(), 1);
        assert_eq!(storage.meshes[0].layers.len(), 10);
        assert!(storage.meshes[0].layers[5].is_new_layer);
        assert!(!storage.meshes[0].layers[0].is_new_layer);
        assert_eq!(storage.support.support_areas_per_layer.len(), 10);
    }

    #[test]
    fn test_merge_meshes_single_mesh_is_noop() {
        let mut storage = SliceDataStorage::new();
        storage.meshes.push(mesh_with_layers(&[1, 1]));

        merge_meshes(&mut storage);

        assert_eq!(storage.meshes.len(), 1);
        assert_eq!(storage.meshes[0].layers.len(), 2);
        assert!(storage.meshes[0].layers.iter().all(|l| !l.is_new_layer));
    }

    #[test]
    fn test_merge_preserves_existing_seams() {
        let mut storage = SliceDataStorage::new();
        let mut first = mesh_with_layers(&[1, 1]);
        first.layers[1].is_new_layer = true; // from a prior stacking pass
        storage.meshes.push(first);
        storage.meshes.push(mesh_with_layers(&[1, 1]));

        merge_meshes(&mut storage);

        let mesh = &storage.meshes[0];
        assert!(mesh.layers[1].is_new_layer);
        assert!(mesh.layers[2].is_new_layer);
    }
}
