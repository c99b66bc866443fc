//! G-code generation: output container, motion writer, layer planner,
//! path ordering and cooling control.

pub mod cooling;
mod generator;
mod order;
mod planner;
mod writer;

pub use cooling::{CoolingSettings, fan_speed_for_layer};
pub use generator::GCode;
pub use order::{LineOrderOptimizer, PathOrderOptimizer};
pub use planner::GCodePlanner;
pub use writer::GCodeWriter;
