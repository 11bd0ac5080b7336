//! EV fleet charging simulator for a single site under a demand limit.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
/// Fleet generation and charger pool sizing.
pub mod fleet;
pub mod io;
pub mod reporting;
pub mod runner;
/// Simulation core: schedule, controller, system, ledger and KPIs.
pub mod sim;

pub use error::{Result, SimError};
