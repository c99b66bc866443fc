//! Layer time-based fan control and speed adjustment parameters.
//!
//! Couples the planned duration of a layer to the part-cooling fan:
//! layers faster than the minimum layer time are stretched by the
//! planner's speed scaling and get full fan; slower layers interpolate
//! down to the minimum fan speed. The fan additionally ramps in over the
//! first layers so the initial layers bond to the bed unchilled.

use crate::settings::SettingsStore;
use crate::CoordF;

/// Cooling parameters for one print job.
#[derive(Debug, Clone, PartialEq)]
pub struct CoolingSettings {
    /// Minimum layer time in seconds; faster layers are slowed down.
    pub min_layer_time: CoordF,
    /// Layer time under which the fan interpolates toward maximum.
    pub min_layer_time_fan_speed_max: CoordF,
    /// Fan speed floor in percent.
    pub fan_speed_min: CoordF,
    /// Fan speed ceiling in percent.
    pub fan_speed_max: CoordF,
    /// The fan reaches full strength at this layer; below it the speed
    /// scales with the layer index (layer 0 gets no fan).
    pub fan_full_layer: i32,
    /// Speed floor for the slowdown, in mm/s.
    pub min_speed: CoordF,
    /// Lift the head and dwell when the slowdown cannot stretch the
    /// layer far enough.
    pub lift_head: bool,
}

impl CoolingSettings {
    /// Read the cooling parameters from settings.
    pub fn from_settings(settings: &SettingsStore) -> Self {
        Self {
            min_layer_time: settings.get_seconds("cool_min_layer_time"),
            min_layer_time_fan_speed_max: settings
                .get_seconds("cool_min_layer_time_fan_speed_max"),
            fan_speed_min: settings.get_percentage("cool_fan_speed_min"),
            fan_speed_max: settings.get_percentage("cool_fan_speed_max"),
            fan_full_layer: settings.get_count("cool_fan_full_layer"),
            min_speed: settings.get_mm_per_second("cool_min_speed"),
            lift_head: settings.get_bool("cool_lift_head"),
        }
    }
}

impl Default for CoolingSettings {
    fn default() -> Self {
        Self {
            min_layer_time: 5.0,
            min_layer_time_fan_speed_max: 10.0,
            fan_speed_min: 100.0,
            fan_speed_max: 100.0,
            fan_full_layer: 2,
            min_speed: 10.0,
            lift_head: false,
        }
    }
}

/// Fan speed in percent for a layer of the given pre-scaling duration.
///
/// Below the minimum layer time the fan runs at maximum; between the two
/// thresholds it interpolates linearly; above the fan-speed-max window it
/// sits at the minimum. The first `fan_full_layer` layers scale the
/// result by `layer_nr / fan_full_layer`.
pub fn fan_speed_for_layer(
    cooling: &CoolingSettings,
    layer_nr: i32,
    total_layer_time: CoordF,
) -> CoordF {
    let mut fan_speed = cooling.fan_speed_min;
    if total_layer_time < cooling.min_layer_time {
        fan_speed = cooling.fan_speed_max;
    } else if total_layer_time < cooling.min_layer_time_fan_speed_max {
        let min_time = cooling.min_layer_time;
        let max_time = cooling.min_layer_time_fan_speed_max;
        fan_speed = cooling.fan_speed_max
            - (cooling.fan_speed_max - cooling.fan_speed_min) * (total_layer_time - min_time)
                / (max_time - min_time);
    }
    if layer_nr < cooling.fan_full_layer && cooling.fan_full_layer > 0 {
        fan_speed = fan_speed * layer_nr as CoordF / cooling.fan_full_layer as CoordF;
    }
    fan_speed
}
