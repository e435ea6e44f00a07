//! Process-level runtime: environment-driven configuration, tracing and run
//! counters, and the scheduler-driven runner.

pub mod config;
pub mod runner;
pub mod telemetry;
