//! Per-region extrusion parameters and shared retraction/coasting configs.
//!
//! A [`GCodePathConfig`] bundles everything the planner needs to turn a
//! polygon into extrusion moves: line width, speed, flow, filament
//! diameter and layer height. One config exists per region kind (outer
//! wall, inner walls, skin, infill per combine depth, support, skirt,
//! raft phases) and is rebuilt every layer because it depends on the
//! layer thickness.

use crate::{unscale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Region kind a path config belongs to, printed as `;TYPE:` comments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathRole {
    WallOuter,
    WallInner,
    Skin,
    Support,
    Infill,
    /// Non-extruding travel; never surfaces as a type comment.
    Move,
}

impl PathRole {
    /// Tag written to the G-code stream for this region kind.
    pub fn as_comment(&self) -> &'static str {
        match self {
            PathRole::WallOuter => "WALL-OUTER",
            PathRole::WallInner => "WALL-INNER",
            PathRole::Skin => "SKIN",
            PathRole::Support => "SUPPORT",
            PathRole::Infill => "FILL",
            PathRole::Move => "MOVE",
        }
    }
}

impl fmt::Display for PathRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_comment())
    }
}

/// Extrusion parameters for one printable region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GCodePathConfig {
    /// Region kind tag.
    pub role: PathRole,
    /// Extruded line width in micrometers. Zero means travel.
    pub line_width: Coord,
    /// Print speed in mm/s; mutated by the initial-layers ramp.
    pub speed: CoordF,
    /// Material flow in percent.
    pub flow: CoordF,
    /// Filament diameter in micrometers.
    pub filament_diameter: Coord,
    /// Layer thickness in micrometers.
    pub layer_height: Coord,
    /// Continuously ramp Z while tracing this config's outlines.
    pub spiralize: bool,
}

impl GCodePathConfig {
    /// Create a config for the given region kind with inert parameters.
    pub fn new(role: PathRole) -> Self {
        Self {
            role,
            line_width: 0,
            speed: 0.0,
            flow: 100.0,
            filament_diameter: 0,
            layer_height: 0,
            spiralize: false,
        }
    }

    /// Fill in the per-layer extrusion parameters in one call.
    ///
    /// `speed` is clamped to a positive minimum and `line_width` to at
    /// least one micrometer so downstream volume math stays finite.
    pub fn configure(
        &mut self,
        line_width: Coord,
        speed: CoordF,
        filament_diameter: Coord,
        flow: CoordF,
        layer_height: Coord,
    ) {
        self.line_width = line_width.max(1);
        self.speed = speed.max(0.1);
        self.filament_diameter = filament_diameter;
        self.flow = flow;
        self.layer_height = layer_height;
    }

    /// Apply the initial-layers speed ramp.
    ///
    /// The effective speed interpolates linearly from `first_layer_speed`
    /// at layer 0 to the configured speed at `slowdown_layers`.
    pub fn smooth_speed(&mut self, first_layer_speed: CoordF, layer_nr: i32, slowdown_layers: i32) {
        if slowdown_layers <= 0 {
            return;
        }
        let layer_nr = layer_nr.min(slowdown_layers) as CoordF;
        let max = slowdown_layers as CoordF;
        self.speed = self.speed * layer_nr / max + first_layer_speed * (max - layer_nr) / max;
    }

    /// Extruded volume per traveled millimeter, in cubic millimeters.
    pub fn extrusion_mm3_per_mm(&self) -> CoordF {
        unscale(self.line_width) * unscale(self.layer_height) * (self.flow / 100.0)
    }

    /// Filament length fed per traveled millimeter, in millimeters.
    pub fn extrusion_per_mm(&self) -> CoordF {
        let diameter = unscale(self.filament_diameter);
        if diameter <= 0.0 {
            return 0.0;
        }
        let filament_area = PI * (diameter / 2.0) * (diameter / 2.0);
        self.extrusion_mm3_per_mm() / filament_area
    }

    /// Whether this config produces extrusion at all.
    #[inline]
    pub fn is_travel(&self) -> bool {
        self.line_width == 0 || self.role == PathRole::Move
    }
}

/// Filament retraction parameters, owned by the slice storage and cloned
/// into the planner. Path configs deliberately carry no back-reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetractionConfig {
    /// Retraction distance in millimeters of filament.
    pub amount: CoordF,
    /// Extra filament primed after a retraction, in millimeters.
    pub prime_amount: CoordF,
    /// Retraction speed in mm/s.
    pub speed: CoordF,
    /// Prime speed in mm/s.
    pub prime_speed: CoordF,
    /// Z hop performed while retracted, in micrometers.
    pub zhop: Coord,
}

/// Coasting parameters: end extrusion moves early and let residual
/// nozzle pressure deposit the tail.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoastingConfig {
    pub enable: bool,
    /// Volume coasted at the end of a move, in cubic millimeters.
    pub volume_move: CoordF,
    /// Speed ratio applied while coasting into a travel.
    pub speed_move: CoordF,
    /// Minimum extruded volume before move-coasting applies.
    pub min_volume_move: CoordF,
    /// Volume coasted ahead of a retraction, in cubic millimeters.
    pub volume_retract: CoordF,
    /// Speed ratio applied while coasting into a retraction.
    pub speed_retract: CoordF,
    /// Minimum extruded volume before retract-coasting applies.
    pub min_volume_retract: CoordF,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skin_config() -> GCodePathConfig {
        let mut config = GCodePathConfig::new(PathRole::Skin);
        config.configure(400, 60.0, 2_850, 100.0, 200);
        config
    }

    #[test]
    fn test_configure_clamps() {
        let mut config = GCodePathConfig::new(PathRole::Infill);
        config.configure(0, -5.0, 2_850, 100.0, 100);
        assert!(config.speed > 0.0);
        assert!(config.line_width > 0);
    }

    #[test]
    fn test_smooth_speed_ramp() {
        let mut config = skin_config();
        config.smooth_speed(20.0, 0, 4);
        assert!((config.speed - 20.0).abs() < 1e-9);

        let mut config = skin_config();
        config.smooth_speed(20.0, 2, 4);
        assert!((config.speed - 40.0).abs() < 1e-9);

        let mut config = skin_config();
        config.smooth_speed(20.0, 4, 4);
        assert!((config.speed - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_extrusion_volume() {
        let config = skin_config();
        // 0.4mm wide, 0.2mm high, 100% flow
        assert!((config.extrusion_mm3_per_mm() - 0.08).abs() < 1e-9);

        let mut thin = skin_config();
        thin.flow = 50.0;
        assert!((thin.extrusion_mm3_per_mm() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_extrusion_per_mm_uses_filament_area() {
        let config = skin_config();
        let filament_area = PI * (2.85 / 2.0) * (2.85 / 2.0);
        let expected = 0.08 / filament_area;
        assert!((config.extrusion_per_mm() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_role_comments() {
        assert_eq!(PathRole::WallOuter.as_comment(), "WALL-OUTER");
        assert_eq!(PathRole::Infill.as_comment(), "FILL");
    }
}
