mod config;
mod controller;
mod curve;

pub use config::ThermalConfig;
pub use controller::{AutoDutyController, AutoDutyDecision};
pub use curve::{auto_duty, control_temperature, logistic_duty};
