//! Fan control for Clevo laptops.
//!
//! The embedded controller (EC) on these machines exposes temperature and
//! fan telemetry through a small register bank and accepts fan duty commands
//! over the legacy port-mapped EC interface. This crate replaces the stock
//! firmware fan curve with a logistic one, driven from a privileged worker
//! process that shares its readings with an unprivileged control process.

pub mod config;
pub mod control;
pub mod duty;
pub mod ec;
pub mod error;
pub mod gpu;
pub mod shared;
pub mod supervisor;
pub mod telemetry;
pub mod thermal;
pub mod tracing;
pub mod worker;
