//! # layercode
//!
//! Layer planning and G-code emission core for fused-filament printing.
//!
//! This library takes an already-sliced model (layered polygonal storage
//! with insets, skin regions, sparse-infill outlines, support areas, skirt,
//! ooze shield, wipe tower and raft outline) and turns it into a
//! deterministic stream of machine motion commands:
//! - Per-layer planning: skirt, ooze shield, support, mesh ordering
//! - Per-region toolpath composition: insets, skin (with bridging), infill
//! - Multi-extruder sequencing with wipe-tower insertion
//! - Cooling control coupling layer duration to fan speed
//! - Raft prelude and storage rewriters for one-at-a-time printing
//!
//! ## Example
//!
//! ```rust,ignore
//! use layercode::pipeline::FffEmitter;
//! use layercode::settings::SettingsStore;
//!
//! let settings = SettingsStore::with_defaults();
//! let mut emitter = FffEmitter::new(settings);
//! emitter.write_gcode(&mut storage)?;
//! emitter.into_gcode().write_to_file("output.gcode")?;
//! ```

pub mod clipper;
pub mod config;
pub mod geometry;
pub mod gcode;
pub mod infill;
pub mod pipeline;
pub mod settings;
pub mod storage;

use thiserror::Error;

/// Integer coordinate type. One unit = 1 micrometer.
pub type Coord = i64;

/// Floating-point coordinate type, in millimeters.
pub type CoordF = f64;

/// Scaling factor between millimeters and internal integer micrometers.
pub const SCALING_FACTOR: CoordF = 1000.0;

/// Maximum number of extruders a machine can expose.
pub const MAX_EXTRUDERS: usize = 16;

/// Number of infill combine depths carried per mesh.
///
/// `infill_config[n]` covers sparse regions whose extrusion is combined
/// with `n` previous layers; its line width is the base width times `n+1`.
pub const MAX_INFILL_COMBINE: usize = 3;

/// Convert millimeters to scaled integer micrometers.
#[inline]
pub fn scale(mm: CoordF) -> Coord {
    (mm * SCALING_FACTOR).round() as Coord
}

/// Convert scaled integer micrometers back to millimeters.
#[inline]
pub fn unscale(microns: Coord) -> CoordF {
    microns as CoordF / SCALING_FACTOR
}

/// Top-level error type for G-code emission.
#[derive(Debug, Error)]
pub enum Error {
    /// The stacked or merged job is taller than the clearance under the
    /// gantry; printing it would crash the head into finished objects.
    #[error(
        "object height {model_max_z}um exceeds machine gantry clearance {gantry_distance}um"
    )]
    GantryClearance {
        model_max_z: Coord,
        gantry_distance: Coord,
    },

    /// A settings lookup failed in a context that cannot continue.
    #[error("settings error: {0}")]
    Settings(#[from] settings::SettingsError),

    /// Underlying I/O failure while writing G-code output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for emission operations.
pub type Result<T> = std::result::Result<T, Error>;

// Re-export commonly used types
pub use config::{CoastingConfig, GCodePathConfig, PathRole, RetractionConfig};
pub use gcode::{GCode, GCodePlanner, GCodeWriter};
pub use geometry::{Point, Point3, Polygon, Polygons};
pub use pipeline::{ClientSession, FffEmitter};
pub use settings::SettingsStore;
pub use storage::{SliceDataStorage, SliceLayer, SliceLayerPart, SliceMeshStorage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_roundtrip() {
        assert_eq!(scale(1.0), 1000);
        assert_eq!(scale(0.4), 400);
        assert!((unscale(scale(12.345)) - 12.345).abs() < 1e-9);
    }

    #[test]
    fn test_scale_negative() {
        assert_eq!(scale(-2.5), -2500);
        assert_eq!(unscale(-2500), -2.5);
    }
}
