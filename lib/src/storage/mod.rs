//! Sliced model storage consumed by the emission pipeline.
//!
//! The slicing front-end owns this data and hands it over read-mostly:
//! the only mutations the emission core performs are the per-layer path
//! config updates and the optional storage rewriter pre-passes.

mod rewriters;

pub use rewriters::{merge_meshes, stack_layer_parts};

use crate::config::{GCodePathConfig, PathRole, RetractionConfig};
use crate::geometry::{Point3, Polygon, Polygons};
use crate::settings::SettingsStore;
use crate::MAX_INFILL_COMBINE;
use std::sync::Arc;

/// A solid top/bottom region of one layer part.
#[derive(Clone, Debug, Default)]
pub struct SkinPart {
    /// Outline of the skin region.
    pub outline: Polygons,
    /// Skin perimeters, outermost first.
    pub insets: Vec<Polygons>,
    /// Small gaps between skin perimeters to fill densely.
    pub perimeter_gaps: Polygons,
}

/// One connected part of a slice layer.
#[derive(Clone, Debug, Default)]
pub struct SliceLayerPart {
    /// Outer boundary of the part (contours plus holes).
    pub outline: Polygons,
    /// Wall polygons, `insets[0]` being the outermost wall.
    pub insets: Vec<Polygons>,
    /// Solid skin regions.
    pub skin_parts: Vec<SkinPart>,
    /// Sparse infill regions indexed by combine depth:
    /// `sparse_outline[0]` is filled on this layer alone,
    /// `sparse_outline[k]` is filled with lines thickened to also cover
    /// `k` previous layers.
    pub sparse_outline: Vec<Polygons>,
    /// Gaps between walls to fill densely.
    pub perimeter_gaps: Polygons,
}

/// One Z slice of a mesh.
#[derive(Clone, Debug, Default)]
pub struct SliceLayer {
    /// Connected parts of this slice.
    pub parts: Vec<SliceLayerPart>,
    /// Unclosed outline segments; printed only in magic polygon mode.
    pub open_lines: Polygons,
    /// Set by the storage rewriters where the head must restart at a new
    /// physical print position.
    pub is_new_layer: bool,
}

/// Per-mesh slice data plus the per-region path configs rebuilt each
/// layer.
#[derive(Clone, Debug)]
pub struct SliceMeshStorage {
    /// Settings handle for this mesh (shared, read-only).
    pub settings: Arc<SettingsStore>,
    /// Slices, bottom-up.
    pub layers: Vec<SliceLayer>,
    /// Outer wall config.
    pub inset0_config: GCodePathConfig,
    /// Inner walls config.
    pub insetx_config: GCodePathConfig,
    /// Skin config.
    pub skin_config: GCodePathConfig,
    /// Infill configs per combine depth.
    pub infill_config: [GCodePathConfig; MAX_INFILL_COMBINE],
}

impl SliceMeshStorage {
    /// Create mesh storage over the given settings handle.
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self {
            settings,
            layers: Vec::new(),
            inset0_config: GCodePathConfig::new(PathRole::WallOuter),
            insetx_config: GCodePathConfig::new(PathRole::WallInner),
            skin_config: GCodePathConfig::new(PathRole::Skin),
            infill_config: std::array::from_fn(|_| GCodePathConfig::new(PathRole::Infill)),
        }
    }

    /// The extruder this mesh prints with.
    pub fn extruder_nr(&self) -> usize {
        self.settings.get_index("extruder_nr").max(0) as usize
    }
}

/// Generated support areas.
#[derive(Clone, Debug, Default)]
pub struct SupportStorage {
    /// Whether support was generated upstream at all.
    pub generated: bool,
    /// Support area per layer, same indexing as mesh layers.
    pub support_areas_per_layer: Vec<Polygons>,
}

/// Everything the emission core consumes for one print job.
#[derive(Clone, Debug)]
pub struct SliceDataStorage {
    /// Sliced meshes. After `merge_meshes` only mesh 0 remains.
    pub meshes: Vec<SliceMeshStorage>,
    /// Support areas.
    pub support: SupportStorage,
    /// Skirt polygons, printed at layer 0.
    pub skirt: Polygons,
    /// Ooze shield outline per layer.
    pub ooze_shield: Vec<Polygons>,
    /// Wipe tower outline.
    pub wipe_tower: Polygons,
    /// Point the previous nozzle is wiped at after an extruder switch.
    pub wipe_point: crate::geometry::Point,
    /// Raft outline, when raft adhesion is enabled.
    pub raft_outline: Polygons,
    /// Model bounding extremes in micrometers.
    pub model_min: Point3,
    pub model_max: Point3,
    /// Shared retraction parameters.
    pub retraction_config: RetractionConfig,
    /// Skirt and ooze-shield walking config.
    pub skirt_config: GCodePathConfig,
    /// Support fill config.
    pub support_config: GCodePathConfig,
}

impl SliceDataStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self {
            meshes: Vec::new(),
            support: SupportStorage::default(),
            skirt: Polygons::new(),
            ooze_shield: Vec::new(),
            wipe_tower: Polygons::new(),
            wipe_point: crate::geometry::Point::zero(),
            raft_outline: Polygons::new(),
            model_min: Point3::new(0, 0, 0),
            model_max: Point3::new(0, 0, 0),
            retraction_config: RetractionConfig::default(),
            skirt_config: GCodePathConfig::new(PathRole::Skin),
            support_config: GCodePathConfig::new(PathRole::Support),
        }
    }

    /// Number of layers to emit, taken from mesh 0.
    pub fn total_layers(&self) -> usize {
        self.meshes.first().map_or(0, |mesh| mesh.layers.len())
    }

    /// Union of all part outlines of all meshes at one layer; the comb
    /// boundary the planner travels within.
    pub fn layer_outlines(&self, layer_nr: usize) -> Polygons {
        let mut outlines = Polygons::new();
        for mesh in &self.meshes {
            if let Some(layer) = mesh.layers.get(layer_nr) {
                for part in &layer.parts {
                    outlines.add_all(&part.outline);
                }
            }
        }
        outlines
    }
}

impl Default for SliceDataStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience constructor for a single-contour layer part.
impl SliceLayerPart {
    /// Build a part from its outline with the given number of insets,
    /// each shrunk by one line width. Used heavily by tests.
    pub fn from_outline(outline: Polygons, inset_count: usize, line_width: crate::Coord) -> Self {
        let mut insets = Vec::with_capacity(inset_count);
        for n in 0..inset_count {
            let delta = -(line_width / 2 + line_width * n as crate::Coord);
            let inset = crate::clipper::offset_polygons(&outline, delta);
            if inset.is_empty() {
                break;
            }
            insets.push(inset);
        }
        Self {
            outline,
            insets,
            ..Default::default()
        }
    }

    /// First point of the outermost wall, if any.
    pub fn start_vertex(&self) -> Option<crate::geometry::Point> {
        self.insets
            .first()
            .and_then(|inset| inset.first())
            .and_then(|poly: &Polygon| poly.first().copied())
    }
}
