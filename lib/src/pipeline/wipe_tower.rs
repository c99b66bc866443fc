//! Wipe tower emission after an extruder change.

use super::FffEmitter;
use crate::clipper::offset_polygons;
use crate::gcode::GCodePlanner;
use crate::geometry::Polygons;
use crate::storage::SliceDataStorage;

impl FffEmitter {
    /// Print the wipe/prime tower for the freshly selected nozzle, then
    /// travel over the wipe point to physically wipe the previous one.
    ///
    /// The tower is drawn as successive inward offsets of the stored
    /// outline, emitted outermost-first. Odd layers shift the first wall
    /// inward by half a line so alternate layers interleave; above layer
    /// 0 every second wall is skipped (double offset step) to keep the
    /// tower sparse enough to print fast.
    pub(super) fn add_wipe_tower(
        &mut self,
        storage: &SliceDataStorage,
        planner: &mut GCodePlanner,
        layer_nr: usize,
        prev_extruder: usize,
    ) {
        if self.settings.get_microns("wipe_tower_size") < 1 {
            return;
        }

        let mut offset = -self.settings.get_microns("wall_line_width_x");
        if layer_nr > 0 {
            offset *= 2;
        }

        let mut insets: Vec<Polygons> = Vec::new();
        if layer_nr % 2 == 1 {
            insets.push(offset_polygons(&storage.wipe_tower, offset / 2));
        } else {
            insets.push(storage.wipe_tower.clone());
        }
        loop {
            let next = offset_polygons(insets.last().unwrap(), offset);
            if next.is_empty() {
                break;
            }
            insets.push(next);
        }

        for inset in &insets {
            planner.add_polygons_by_optimizer(inset, &storage.meshes[0].insetx_config);
        }

        let wipe_point = storage.wipe_point - self.gcode.get_extruder_offset(prev_extruder)
            + self.gcode.get_extruder_offset(planner.get_extruder());
        planner.add_travel(wipe_point);
    }
}
