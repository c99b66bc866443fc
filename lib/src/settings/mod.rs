//! Flat settings store with typed, unit-converting accessors.
//!
//! Print settings live in a flat key→string map (the shape the slicing
//! front-end hands over). The accessors convert on the way out: lengths
//! to integer micrometers, speeds to mm/s, temperatures to degrees
//! Celsius, percentages, cubic millimeters, indices and counts.
//!
//! Missing or malformed numeric keys resolve to zero with a logged
//! warning; unknown enum values surface as [`SettingsError`] so dispatch
//! sites can skip the affected region and continue.

use crate::{scale, Coord};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Error type for settings lookups.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("setting {key} has unrecognized value {value:?}")]
    UnknownEnumValue { key: String, value: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings JSON must be an object of key/value pairs")]
    NotAnObject,
}

/// Pattern used for sparse infill regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillPattern {
    Grid,
    Lines,
    Triangles,
    Concentric,
    ZigZag,
}

/// Pattern used for support fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportPattern {
    Grid,
    Lines,
    ZigZag,
}

/// Pattern used for solid top/bottom skin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopBottomPattern {
    Lines,
    Concentric,
}

/// Build-plate adhesion helper selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdhesionType {
    None,
    Brim,
    Raft,
    Skirt,
}

/// G-code dialect emitted by the motion writer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GCodeFlavor {
    /// Standard RepRap-style G-code with linear E values.
    #[default]
    RepRap,
    /// Ultimaker volumetric dialect: E in mm3, G10/G11 retraction,
    /// metadata prefix block.
    UltiGCode,
    /// Bits-from-Bytes dialect with M227 auto-retraction.
    Bfb,
}

impl fmt::Display for GCodeFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GCodeFlavor::RepRap => write!(f, "RepRap"),
            GCodeFlavor::UltiGCode => write!(f, "UltiGCode"),
            GCodeFlavor::Bfb => write!(f, "BFB"),
        }
    }
}

/// Flat key→string settings store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SettingsStore {
    values: HashMap<String, String>,
}

impl SettingsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a baseline profile.
    ///
    /// Lengths are in millimeters, speeds in mm/s, temperatures in
    /// degrees Celsius, percentages 0-100.
    pub fn with_defaults() -> Self {
        let mut s = Self::new();
        for (key, value) in [
            ("layer_height", "0.1"),
            ("layer_height_0", "0.3"),
            ("wall_line_count", "2"),
            ("wall_line_width_0", "0.4"),
            ("wall_line_width_x", "0.4"),
            ("skin_line_width", "0.4"),
            ("infill_line_width", "0.4"),
            ("infill_line_distance", "2.0"),
            ("fill_pattern", "Lines"),
            ("fill_overlap", "15"),
            ("fill_perimeter_gaps", "Everywhere"),
            ("top_bottom_pattern", "Lines"),
            ("top_layers", "4"),
            ("bottom_layers", "4"),
            ("skin_alternate_rotation", "false"),
            ("wall_overlap_avoid_enabled", "false"),
            ("speed_travel", "150"),
            ("speed_layer_0", "20"),
            ("speed_slowdown_layers", "2"),
            ("speed_wall_0", "30"),
            ("speed_wall_x", "60"),
            ("speed_topbottom", "30"),
            ("speed_infill", "80"),
            ("speed_support", "60"),
            ("material_diameter", "2.85"),
            ("material_flow", "100"),
            ("material_print_temperature", "210"),
            ("material_bed_temperature", "60"),
            ("machine_start_gcode", "G28 ;home\nG1 Z15 F9000\n"),
            ("machine_end_gcode", "M104 S0\nM140 S0\nG28 X0 Y0\nM84\n"),
            ("machine_gcode_flavor", "RepRap"),
            ("machine_nozzle_gantry_distance", "55"),
            ("retraction_amount", "4.5"),
            ("retraction_extra_prime_amount", "0"),
            ("retraction_retract_speed", "25"),
            ("retraction_prime_speed", "25"),
            ("retraction_hop", "0"),
            ("retraction_min_travel", "1.5"),
            ("retraction_combing", "true"),
            ("travel_avoid_other_parts", "true"),
            ("coasting_enable", "false"),
            ("coasting_volume_move", "0.064"),
            ("coasting_speed_move", "0.9"),
            ("coasting_min_volume_move", "0.1"),
            ("coasting_volume_retract", "0.032"),
            ("coasting_speed_retract", "0.9"),
            ("coasting_min_volume_retract", "0.05"),
            ("skirt_speed", "30"),
            ("skirt_line_width", "0.4"),
            ("support_extruder_nr", "0"),
            ("support_line_width", "0.4"),
            ("support_line_distance", "2.0"),
            ("support_pattern", "ZigZag"),
            ("support_connect_zigzags", "true"),
            ("adhesion_type", "Skirt"),
            ("raft_base_speed", "20"),
            ("raft_base_line_width", "1.0"),
            ("raft_base_thickness", "0.3"),
            ("raft_base_fan_speed", "0"),
            ("raft_line_spacing", "3.0"),
            ("raft_interface_speed", "20"),
            ("raft_interface_line_width", "0.4"),
            ("raft_interface_line_spacing", "1.0"),
            ("raft_interface_thickness", "0.27"),
            ("raft_surface_layers", "2"),
            ("raft_surface_speed", "20"),
            ("raft_surface_line_width", "0.4"),
            ("raft_surface_line_spacing", "3.0"),
            ("raft_surface_thickness", "0.27"),
            ("raft_airgap", "0.35"),
            ("raft_airgap_layer_0", "0.35"),
            ("cool_min_layer_time", "5"),
            ("cool_min_layer_time_fan_speed_max", "10"),
            ("cool_fan_speed_min", "100"),
            ("cool_fan_speed_max", "100"),
            ("cool_fan_full_layer", "2"),
            ("cool_min_speed", "10"),
            ("cool_lift_head", "false"),
            ("wipe_tower_size", "0"),
            ("magic_spiralize", "false"),
            ("magic_polygon_mode", "false"),
            ("extruder_nr", "0"),
        ] {
            s.set(key, value);
        }
        s
    }

    /// Load a store from a JSON object of key/value pairs.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or(SettingsError::NotAnObject)?;
        let mut store = Self::new();
        for (key, val) in object {
            let text = match val {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            store.set(key.as_str(), text);
        }
        Ok(store)
    }

    /// Set a key to a raw string value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Whether the key is present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn get_f64(&self, key: &str) -> f64 {
        match self.raw(key) {
            Some(text) => match text.trim().parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    warn!("setting {key} is not a number: {text:?}");
                    0.0
                }
            },
            None => {
                warn!("setting {key} is missing, using 0");
                0.0
            }
        }
    }

    /// Length setting in integer micrometers (stored in mm).
    pub fn get_microns(&self, key: &str) -> Coord {
        scale(self.get_f64(key))
    }

    /// Speed setting in millimeters per second.
    pub fn get_mm_per_second(&self, key: &str) -> f64 {
        self.get_f64(key)
    }

    /// Time setting in seconds.
    pub fn get_seconds(&self, key: &str) -> f64 {
        self.get_f64(key)
    }

    /// Temperature setting in degrees Celsius.
    pub fn get_celsius(&self, key: &str) -> f64 {
        self.get_f64(key)
    }

    /// Percentage setting, 0-100.
    pub fn get_percentage(&self, key: &str) -> f64 {
        self.get_f64(key)
    }

    /// Percentage setting as a 0.0-1.0 fraction.
    pub fn get_fraction(&self, key: &str) -> f64 {
        self.get_f64(key) / 100.0
    }

    /// Volume setting in cubic millimeters.
    pub fn get_cubic_millimeters(&self, key: &str) -> f64 {
        self.get_f64(key)
    }

    /// Zero-based index setting (extruder numbers and the like).
    pub fn get_index(&self, key: &str) -> i32 {
        self.get_f64(key) as i32
    }

    /// Count setting (layer counts and the like).
    pub fn get_count(&self, key: &str) -> i32 {
        self.get_f64(key) as i32
    }

    /// Boolean setting; accepts "true"/"false" and "1"/"0".
    pub fn get_bool(&self, key: &str) -> bool {
        match self.raw(key) {
            Some(text) => matches!(text.trim(), "true" | "True" | "1"),
            None => false,
        }
    }

    /// Raw string setting; empty string when missing.
    pub fn get_string(&self, key: &str) -> &str {
        self.raw(key).unwrap_or("")
    }

    fn enum_value<T>(
        &self,
        key: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, SettingsError> {
        let text = self.get_string(key);
        parse(text).ok_or_else(|| SettingsError::UnknownEnumValue {
            key: key.to_string(),
            value: text.to_string(),
        })
    }

    /// Infill pattern setting.
    pub fn get_fill_pattern(&self, key: &str) -> Result<FillPattern, SettingsError> {
        self.enum_value(key, |text| match text {
            "Grid" => Some(FillPattern::Grid),
            "Lines" => Some(FillPattern::Lines),
            "Triangles" => Some(FillPattern::Triangles),
            "Concentric" => Some(FillPattern::Concentric),
            "ZigZag" => Some(FillPattern::ZigZag),
            _ => None,
        })
    }

    /// Support pattern setting.
    pub fn get_support_pattern(&self, key: &str) -> Result<SupportPattern, SettingsError> {
        self.enum_value(key, |text| match text {
            "Grid" => Some(SupportPattern::Grid),
            "Lines" => Some(SupportPattern::Lines),
            "ZigZag" => Some(SupportPattern::ZigZag),
            _ => None,
        })
    }

    /// Top/bottom skin pattern setting.
    pub fn get_top_bottom_pattern(&self, key: &str) -> Result<TopBottomPattern, SettingsError> {
        self.enum_value(key, |text| match text {
            "Lines" => Some(TopBottomPattern::Lines),
            "Concentric" => Some(TopBottomPattern::Concentric),
            _ => None,
        })
    }

    /// Adhesion type setting; missing key means no adhesion helper.
    pub fn get_adhesion_type(&self, key: &str) -> AdhesionType {
        match self.get_string(key) {
            "Brim" => AdhesionType::Brim,
            "Raft" => AdhesionType::Raft,
            "Skirt" => AdhesionType::Skirt,
            _ => AdhesionType::None,
        }
    }

    /// G-code flavor setting; defaults to RepRap.
    pub fn get_gcode_flavor(&self, key: &str) -> GCodeFlavor {
        match self.get_string(key) {
            "UltiGCode" => GCodeFlavor::UltiGCode,
            "BFB" => GCodeFlavor::Bfb,
            _ => GCodeFlavor::RepRap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let mut s = SettingsStore::new();
        s.set("layer_height", "0.2");
        s.set("speed_infill", "80");
        s.set("material_flow", "95");
        s.set("top_layers", "6");
        s.set("retraction_combing", "true");

        assert_eq!(s.get_microns("layer_height"), 200);
        assert_eq!(s.get_mm_per_second("speed_infill"), 80.0);
        assert_eq!(s.get_percentage("material_flow"), 95.0);
        assert!((s.get_fraction("material_flow") - 0.95).abs() < 1e-9);
        assert_eq!(s.get_count("top_layers"), 6);
        assert!(s.get_bool("retraction_combing"));
    }

    #[test]
    fn test_missing_key_is_zero() {
        let s = SettingsStore::new();
        assert_eq!(s.get_microns("no_such_key"), 0);
        assert!(!s.get_bool("no_such_key"));
        assert_eq!(s.get_string("no_such_key"), "");
        assert!(!s.has("no_such_key"));
    }

    #[test]
    fn test_enum_parsing() {
        let mut s = SettingsStore::new();
        s.set("fill_pattern", "ZigZag");
        s.set("support_pattern", "Lines");
        s.set("top_bottom_pattern", "Concentric");
        s.set("adhesion_type", "Raft");

        assert_eq!(s.get_fill_pattern("fill_pattern").unwrap(), FillPattern::ZigZag);
        assert_eq!(
            s.get_support_pattern("support_pattern").unwrap(),
            SupportPattern::Lines
        );
        assert_eq!(
            s.get_top_bottom_pattern("top_bottom_pattern").unwrap(),
            TopBottomPattern::Concentric
        );
        assert_eq!(s.get_adhesion_type("adhesion_type"), AdhesionType::Raft);
    }

    #[test]
    fn test_enum_unknown_value() {
        let mut s = SettingsStore::new();
        s.set("fill_pattern", "Voronoi");
        assert!(matches!(
            s.get_fill_pattern("fill_pattern"),
            Err(SettingsError::UnknownEnumValue { .. })
        ));
    }

    #[test]
    fn test_from_json() {
        let s = SettingsStore::from_json(r#"{"layer_height": "0.15", "top_layers": 3}"#).unwrap();
        assert_eq!(s.get_microns("layer_height"), 150);
        assert_eq!(s.get_count("top_layers"), 3);
    }

    #[test]
    fn test_defaults_profile() {
        let s = SettingsStore::with_defaults();
        assert_eq!(s.get_microns("layer_height"), 100);
        assert_eq!(s.get_gcode_flavor("machine_gcode_flavor"), GCodeFlavor::RepRap);
        assert_eq!(s.get_adhesion_type("adhesion_type"), AdhesionType::Skirt);
        assert!(s.get_fill_pattern("fill_pattern").is_ok());
    }
}
