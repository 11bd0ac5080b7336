/// Simulation clock for timestep management.
pub mod clock;
pub mod controller;
/// Simulable site and its per-run context.
pub mod ev_system;
pub mod kpi;
/// Append-only per-entity ledger.
pub mod recorder;
/// Time-indexed schedule inputs.
pub mod schedule;
/// Site meter for per-step demand limit tracking.
pub mod site_meter;
pub mod types;

pub use controller::{Controller, Strategy};
pub use ev_system::{EvSystem, RunOutcome, SimContext};
pub use recorder::{Entity, Record, TimeseriesRecorder};
pub use schedule::{Schedule, ScheduleRow};
