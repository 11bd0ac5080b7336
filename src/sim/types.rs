//! Core simulation types: run settings, per-step results, and run summaries.

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::error::{Result, SimError};

/// Timing and seeding for generated scenarios.
///
/// Imported schedules carry their own timing; this struct is used when the
/// schedule and the fleet are synthesised.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ev_site_sim::sim::types::SimConfig;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let cfg = SimConfig::new(start, 48, 7, 42).unwrap();
/// assert_eq!(cfg.dt_hours(), 0.5);
/// assert_eq!(cfg.total_steps(), 336);
/// ```
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Timestamp of the first step.
    pub start: NaiveDateTime,
    /// Number of simulation steps per day.
    pub steps_per_day: usize,
    /// Number of days to simulate.
    pub days: usize,
    /// Master random seed for reproducibility.
    pub seed: u64,
}

impl SimConfig {
    /// Creates a new simulation configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] if `steps_per_day` or `days` is zero,
    /// or if a day does not split into whole minutes.
    pub fn new(start: NaiveDateTime, steps_per_day: usize, days: usize, seed: u64) -> Result<Self> {
        if steps_per_day == 0 || 1440 % steps_per_day != 0 {
            return Err(SimError::invalid_input(
                "simulation.steps_per_day",
                format!("must be > 0 and divide 1440 minutes, got {steps_per_day}"),
            ));
        }
        if days == 0 {
            return Err(SimError::invalid_input("simulation.days", "must be > 0"));
        }
        Ok(Self {
            start,
            steps_per_day,
            days,
            seed,
        })
    }

    /// Total number of simulation steps across all days.
    pub fn total_steps(&self) -> usize {
        self.steps_per_day * self.days
    }

    /// Width of one step.
    pub fn step(&self) -> TimeDelta {
        TimeDelta::minutes((1440 / self.steps_per_day) as i64)
    }

    /// Duration of one step in hours.
    pub fn dt_hours(&self) -> f64 {
        24.0 / self.steps_per_day as f64
    }
}

/// Site-level record of one simulation timestep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    /// Timestep index.
    pub timestep: usize,
    /// Start of the interval.
    pub timestamp: NaiveDateTime,
    /// Site demand limit (kW).
    pub demand_limit_kw: f64,
    /// Non-EV site load (kW).
    pub other_site_load_kw: f64,
    /// Total power allocated to chargers (kW).
    pub ev_load_kw: f64,
    /// EV plus non-EV load (kW).
    pub site_load_kw: f64,
    /// Limit minus non-EV load, floored at zero (kW).
    pub headroom_kw: f64,
    /// Energy price for the interval (currency/kWh).
    pub price_per_kwh: f64,
    /// Grid emission factor (gCO2/kWh).
    pub emission_factor_g_per_kwh: f64,
    /// Cost of EV grid energy in this step.
    pub ev_cost: f64,
    /// Emissions of EV grid energy in this step (gCO2).
    pub ev_emissions_g: f64,
    /// Vehicles plugged in during the step.
    pub connected_vehicles: usize,
    /// Vehicles that received a non-zero allocation.
    pub charging_vehicles: usize,
    /// Vehicles inside their window with no free charger.
    pub waiting_vehicles: usize,
    /// Whether the site load stayed within the demand limit.
    pub within_demand_limit: bool,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>4} {} | site={:>7.2} kW  limit={:>7.2} kW  other={:>7.2} kW  \
             ev={:>6.2} kW | price={:.3}  ef={:>6.1} g/kWh | ev(n={}, chg={}, wait={}) ok={}",
            self.timestep,
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.site_load_kw,
            self.demand_limit_kw,
            self.other_site_load_kw,
            self.ev_load_kw,
            self.price_per_kwh,
            self.emission_factor_g_per_kwh,
            self.connected_vehicles,
            self.charging_vehicles,
            self.waiting_vehicles,
            self.within_demand_limit,
        )
    }
}

/// A vehicle that left the site below its requested state of charge.
///
/// This is a recoverable outcome, reported in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmetTarget {
    pub vehicle_id: String,
    /// Timestep at which the vehicle departed (or the run ended).
    pub departure_step: usize,
    pub soc_kwh: f64,
    pub target_kwh: f64,
}

impl UnmetTarget {
    /// Missing stored energy (kWh).
    pub fn shortfall_kwh(&self) -> f64 {
        (self.target_kwh - self.soc_kwh).max(0.0)
    }
}

impl fmt::Display for UnmetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} departed at t={} with {:.2} kWh of {:.2} kWh target (short {:.2} kWh)",
            self.vehicle_id,
            self.departure_step,
            self.soc_kwh,
            self.target_kwh,
            self.shortfall_kwh()
        )
    }
}

/// Post-run summary for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSummary {
    pub id: String,
    /// Energy stored in the battery over the run (kWh).
    pub energy_delivered_kwh: f64,
    /// Grid energy drawn for it (kWh).
    pub energy_drawn_kwh: f64,
    pub final_soc_kwh: f64,
    pub target_soc_kwh: f64,
    pub target_met: bool,
}
