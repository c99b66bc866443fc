//! Per-mesh-per-layer emission: extruder switch with wipe tower, part
//! ordering, infill, insets and skin.

use super::layer::spiralized;
use super::FffEmitter;
use crate::gcode::{GCodePlanner, PathOrderOptimizer};
use crate::geometry::{Polygon, Polygons};
use crate::infill::{
    bridge_angle, generate_concentric_infill, generate_grid_infill, generate_line_infill,
    generate_triangle_infill, generate_zigzag_infill,
};
use crate::settings::{FillPattern, TopBottomPattern};
use crate::storage::{SliceDataStorage, SliceLayerPart, SliceMeshStorage};
use crate::{Coord, MAX_INFILL_COMBINE};
use log::warn;

impl FffEmitter {
    /// Emit one mesh's layer: walls, skin and infill per part, parts in
    /// nearest-neighbour order from the layer start position.
    pub(super) fn add_mesh_layer_to_gcode(
        &mut self,
        storage: &SliceDataStorage,
        mesh_idx: usize,
        planner: &mut GCodePlanner,
        layer_nr: usize,
    ) {
        let mesh = &storage.meshes[mesh_idx];
        let prev_extruder = planner.get_extruder();
        if planner.set_extruder(mesh.extruder_nr()) {
            self.add_wipe_tower(storage, planner, layer_nr, prev_extruder);
        }

        let Some(layer) = mesh.layers.get(layer_nr) else {
            return;
        };

        let mut part_map: Vec<usize> = Vec::with_capacity(layer.parts.len());
        let mut optimizer = PathOrderOptimizer::new(self.gcode.get_start_position_xy());
        for (part_nr, part) in layer.parts.iter().enumerate() {
            let entry: Option<&Polygon> = part
                .insets
                .first()
                .and_then(|inset| inset.first())
                .or_else(|| part.outline.first());
            if let Some(polygon) = entry {
                optimizer.add_polygon(polygon);
                part_map.push(part_nr);
            }
        }
        optimizer.optimize();

        let skin_alternate_rotation = self.settings.get_bool("skin_alternate_rotation")
            && (self.settings.get_count("top_layers") >= 4
                || self.settings.get_count("bottom_layers") >= 4);

        // On a rewriter seam this layer only repositions the head; the
        // mesh contributes no extrusion.
        let seam_layer = storage.meshes[0].layers[layer_nr].is_new_layer;

        for &order_idx in &optimizer.poly_order {
            let part = &layer.parts[part_map[order_idx]];
            if seam_layer {
                continue;
            }

            let mut fill_angle = 45;
            if layer_nr & 1 == 1 {
                fill_angle += 90;
            }
            let extrusion_width = self.settings.get_microns("infill_line_width");
            let sparse_line_distance = self.settings.get_microns("infill_line_distance");
            let infill_overlap = self.settings.get_percentage("fill_overlap");

            self.process_multi_layer_infill(
                planner,
                mesh,
                part,
                sparse_line_distance,
                infill_overlap,
                fill_angle,
                extrusion_width,
            );
            self.process_single_layer_infill(
                planner,
                mesh,
                part,
                sparse_line_distance,
                infill_overlap,
                fill_angle,
                extrusion_width,
            );
            self.process_insets(planner, mesh, part, layer_nr);

            if skin_alternate_rotation && (layer_nr / 2) & 1 == 1 {
                fill_angle -= 45;
            }
            self.process_skin(
                planner,
                mesh,
                part,
                layer_nr,
                infill_overlap,
                fill_angle,
                extrusion_width,
            );
        }
    }

    /// Magic polygon mode: emit every outline and open polyline as raw
    /// two-point segments under the outer wall config, one optimised
    /// pass, no insets or fill.
    pub(super) fn add_mesh_layer_magic_polygon_mode(
        &mut self,
        storage: &SliceDataStorage,
        mesh_idx: usize,
        planner: &mut GCodePlanner,
        layer_nr: usize,
    ) {
        let mesh = &storage.meshes[mesh_idx];
        let prev_extruder = planner.get_extruder();
        if planner.set_extruder(mesh.extruder_nr()) {
            self.add_wipe_tower(storage, planner, layer_nr, prev_extruder);
        }

        let Some(layer) = mesh.layers.get(layer_nr) else {
            return;
        };

        let mut segments = Polygons::new();
        for part in &layer.parts {
            for outline in part.outline.iter() {
                push_segments(&mut segments, outline, true);
            }
        }
        for open_line in layer.open_lines.iter() {
            push_segments(&mut segments, open_line, false);
        }

        let config = if mesh.settings.get_bool("magic_spiralize") {
            spiralized(&mesh.inset0_config)
        } else {
            mesh.inset0_config.clone()
        };
        planner.add_polygons_by_optimizer(&segments, &config);
    }

    #[allow(clippy::too_many_arguments)]
    fn process_multi_layer_infill(
        &self,
        planner: &mut GCodePlanner,
        mesh: &SliceMeshStorage,
        part: &SliceLayerPart,
        sparse_line_distance: Coord,
        infill_overlap: f64,
        fill_angle: i32,
        extrusion_width: Coord,
    ) {
        if sparse_line_distance <= 0 {
            return;
        }
        let pattern = match self.settings.get_fill_pattern("fill_pattern") {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!("{err}; skipping sparse infill");
                return;
            }
        };

        // Thicker combined lines print first, deepest combine last.
        for n in 1..part.sparse_outline.len() {
            let outline = &part.sparse_outline[n];
            let config = &mesh.infill_config[n.min(MAX_INFILL_COMBINE - 1)];
            match pattern {
                FillPattern::Grid => {
                    let lines = generate_grid_infill(
                        outline,
                        0,
                        extrusion_width,
                        sparse_line_distance * 2,
                        infill_overlap,
                        fill_angle as f64,
                    );
                    planner.add_lines_by_optimizer(&lines, config);
                }
                FillPattern::Lines => {
                    let lines = generate_line_infill(
                        outline,
                        0,
                        extrusion_width,
                        sparse_line_distance,
                        infill_overlap,
                        fill_angle as f64,
                    );
                    planner.add_lines_by_optimizer(&lines, config);
                }
                FillPattern::Triangles => {
                    let lines = generate_triangle_infill(
                        outline,
                        0,
                        extrusion_width,
                        sparse_line_distance * 3,
                        infill_overlap,
                        0.0,
                    );
                    planner.add_lines_by_optimizer(&lines, config);
                }
                FillPattern::Concentric => {
                    let polygons = generate_concentric_infill(outline, sparse_line_distance);
                    planner.add_polygons_by_optimizer(&polygons, config);
                }
                FillPattern::ZigZag => {
                    let polygons = generate_zigzag_infill(
                        outline,
                        extrusion_width,
                        sparse_line_distance,
                        infill_overlap,
                        fill_angle as f64,
                        false,
                    );
                    planner.add_polygons_by_optimizer(&polygons, config);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_single_layer_infill(
        &self,
        planner: &mut GCodePlanner,
        mesh: &SliceMeshStorage,
        part: &SliceLayerPart,
        sparse_line_distance: Coord,
        infill_overlap: f64,
        fill_angle: i32,
        extrusion_width: Coord,
    ) {
        let mut infill_polygons = Polygons::new();
        let mut infill_lines = Polygons::new();

        if sparse_line_distance > 0 {
            if let Some(outline) = part.sparse_outline.first() {
                match self.settings.get_fill_pattern("fill_pattern") {
                    Ok(FillPattern::Grid) => {
                        infill_lines = generate_grid_infill(
                            outline,
                            0,
                            extrusion_width,
                            sparse_line_distance * 2,
                            infill_overlap,
                            fill_angle as f64,
                        );
                    }
                    Ok(FillPattern::Lines) => {
                        infill_lines = generate_line_infill(
                            outline,
                            0,
                            extrusion_width,
                            sparse_line_distance,
                            infill_overlap,
                            fill_angle as f64,
                        );
                    }
                    Ok(FillPattern::Triangles) => {
                        infill_lines = generate_triangle_infill(
                            outline,
                            0,
                            extrusion_width,
                            sparse_line_distance * 3,
                            infill_overlap,
                            0.0,
                        );
                    }
                    Ok(FillPattern::Concentric) => {
                        infill_polygons =
                            generate_concentric_infill(outline, sparse_line_distance);
                    }
                    Ok(FillPattern::ZigZag) => {
                        infill_lines = generate_zigzag_infill(
                            outline,
                            extrusion_width,
                            sparse_line_distance,
                            infill_overlap,
                            fill_angle as f64,
                            false,
                        );
                    }
                    Err(err) => {
                        warn!("{err}; skipping sparse infill");
                    }
                }
            }
        }

        planner.add_polygons_by_optimizer(&infill_polygons, &mesh.infill_config[0]);
        planner.add_lines_by_optimizer(&infill_lines, &mesh.infill_config[0]);
    }

    /// Walk the walls from innermost to outermost so the outer wall
    /// prints onto already-anchored material.
    fn process_insets(
        &self,
        planner: &mut GCodePlanner,
        mesh: &SliceMeshStorage,
        part: &SliceLayerPart,
        layer_nr: usize,
    ) {
        if self.settings.get_count("wall_line_count") <= 0 {
            return;
        }

        let mut inset0_config = mesh.inset0_config.clone();
        if self.settings.get_bool("magic_spiralize") {
            let bottom_layers = self.settings.get_count("bottom_layers");
            if layer_nr as i32 >= bottom_layers {
                inset0_config.spiralize = true;
            }
            if layer_nr as i32 == bottom_layers && !part.insets.is_empty() {
                // Final non-spiral bottom shell under the vase wall.
                planner.add_polygons_by_optimizer(&part.insets[0], &mesh.insetx_config);
            }
        }

        for inset_nr in (0..part.insets.len()).rev() {
            if inset_nr == 0 {
                planner.add_polygons_by_optimizer(&part.insets[inset_nr], &inset0_config);
            } else {
                planner.add_polygons_by_optimizer(&part.insets[inset_nr], &mesh.insetx_config);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_skin(
        &self,
        planner: &mut GCodePlanner,
        mesh: &SliceMeshStorage,
        part: &SliceLayerPart,
        layer_nr: usize,
        infill_overlap: f64,
        fill_angle: i32,
        extrusion_width: Coord,
    ) {
        let fill_gaps = self.settings.get_string("fill_perimeter_gaps") != "Nowhere";
        let mut skin_polygons = Polygons::new();
        let mut skin_lines = Polygons::new();

        for skin_part in &part.skin_parts {
            let bridge = if layer_nr > 0 {
                bridge_angle(&skin_part.outline, &mesh.layers[layer_nr - 1])
            } else {
                -1
            };

            if bridge > -1 {
                // 100% density across the gap at the bridge direction.
                let lines = generate_line_infill(
                    &skin_part.outline,
                    0,
                    extrusion_width,
                    extrusion_width,
                    infill_overlap,
                    bridge as f64,
                );
                skin_lines.add_all(&lines);
                continue;
            }

            match self.settings.get_top_bottom_pattern("top_bottom_pattern") {
                Ok(TopBottomPattern::Lines) => {
                    for skin_perimeter in &skin_part.insets {
                        // Inward order, directly through the planner.
                        planner.add_polygons_by_optimizer(skin_perimeter, &mesh.skin_config);
                    }
                    if let Some(innermost) = skin_part.insets.last() {
                        let lines = generate_line_infill(
                            innermost,
                            -extrusion_width / 2,
                            extrusion_width,
                            extrusion_width,
                            infill_overlap,
                            fill_angle as f64,
                        );
                        skin_lines.add_all(&lines);
                        if fill_gaps {
                            let gap_lines = generate_line_infill(
                                &skin_part.perimeter_gaps,
                                0,
                                extrusion_width,
                                extrusion_width,
                                0.0,
                                fill_angle as f64,
                            );
                            skin_lines.add_all(&gap_lines);
                        }
                    } else {
                        let lines = generate_line_infill(
                            &skin_part.outline,
                            0,
                            extrusion_width,
                            extrusion_width,
                            infill_overlap,
                            fill_angle as f64,
                        );
                        skin_lines.add_all(&lines);
                    }
                }
                Ok(TopBottomPattern::Concentric) => {
                    let in_outline =
                        crate::clipper::offset_polygons(&skin_part.outline, -extrusion_width / 2);
                    if fill_gaps {
                        let rings = generate_concentric_infill(&in_outline, extrusion_width);
                        skin_polygons.add_all(&rings);
                    }
                }
                Err(err) => {
                    warn!("{err}; skipping skin region");
                }
            }
        }

        if fill_gaps {
            let gap_lines = generate_line_infill(
                &part.perimeter_gaps,
                0,
                extrusion_width,
                extrusion_width,
                0.0,
                fill_angle as f64,
            );
            skin_lines.add_all(&gap_lines);
        }

        planner.add_polygons_by_optimizer(&skin_polygons, &mesh.skin_config);
        planner.add_lines_by_optimizer(&skin_lines, &mesh.skin_config);
    }
}

/// Explode a polyline into individual two-point segments, closing the
/// loop for outlines.
fn push_segments(segments: &mut Polygons, line: &Polygon, closed: bool) {
    for window in line.windows(2) {
        segments.add(Polygon::from_points(vec![window[0], window[1]]));
    }
    if closed && line.len() > 1 {
        segments.add(Polygon::from_points(vec![
            line[line.len() - 1],
            line[0],
        ]));
    }
}
