//! CSV import for schedules and vehicle rosters.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::devices::vehicle::VehicleSpec;
use crate::error::{Result, SimError};
use crate::sim::schedule::{Schedule, ScheduleRow};

/// Reads a schedule with columns
/// `timestamp,demand_limit_kw,price_per_kwh,emission_factor_g_per_kwh,other_site_load_kw`.
///
/// The step width is inferred from the first two rows.
///
/// # Errors
///
/// Returns [`SimError::Csv`] for malformed rows and
/// [`SimError::InvalidInput`] for gaps, uneven steps or invalid values.
pub fn read_schedule(reader: impl Read) -> Result<Schedule> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = rdr
        .deserialize::<ScheduleRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(rows = rows.len(), "schedule read");
    Schedule::from_rows(rows)
}

/// Reads a schedule CSV file.
///
/// # Errors
///
/// Returns [`SimError::Io`] if the file cannot be opened, otherwise as
/// [`read_schedule`].
pub fn load_schedule(path: &Path) -> Result<Schedule> {
    read_schedule(BufReader::new(File::open(path)?))
}

/// One roster row as it appears on disk.
#[derive(Debug, Deserialize)]
struct RosterRow {
    id: String,
    battery_capacity_kwh: f64,
    max_rate_kw: f64,
    arrival: NaiveDateTime,
    departure: NaiveDateTime,
    target_soc_fraction: f64,
    #[serde(default = "default_initial_soc")]
    initial_soc_fraction: f64,
    #[serde(default = "default_efficiency")]
    efficiency: f64,
    #[serde(default)]
    standby_loss_kw: f64,
    #[serde(default)]
    charger: Option<String>,
    #[serde(default)]
    car: Option<String>,
}

fn default_initial_soc() -> f64 {
    0.5
}

fn default_efficiency() -> f64 {
    1.0
}

/// Reads a vehicle roster with columns
/// `id,battery_capacity_kwh,max_rate_kw,arrival,departure,target_soc_fraction`
/// and optional `initial_soc_fraction`, `efficiency`, `standby_loss_kw`,
/// `charger`, `car`.
///
/// Arrival and departure timestamps resolve to the first schedule step at or
/// after them. A session that resolves to no step at all (shorter than one
/// step, or past the end of the schedule) is skipped with a warning.
///
/// # Errors
///
/// Returns [`SimError::Csv`] for malformed rows and
/// [`SimError::InvalidInput`] for a departure before arrival.
pub fn read_roster(reader: impl Read, schedule: &Schedule) -> Result<Vec<VehicleSpec>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut specs = Vec::new();
    for (i, row) in rdr.deserialize::<RosterRow>().enumerate() {
        let row = row?;
        // header is line 1
        let line = i + 2;
        if row.departure < row.arrival {
            return Err(SimError::invalid_input(
                format!("roster line {line}: vehicle[{}].departure", row.id),
                format!("{} is before arrival {}", row.departure, row.arrival),
            ));
        }
        let arrival = schedule.step_at_or_after(row.arrival);
        let departure = schedule.step_at_or_after(row.departure);
        if arrival >= departure {
            warn!(
                line,
                vehicle = %row.id,
                arrival = %row.arrival,
                departure = %row.departure,
                "session covers no schedule step, skipping"
            );
            continue;
        }
        let mut spec = VehicleSpec::new(
            row.id,
            row.battery_capacity_kwh,
            row.max_rate_kw,
            arrival,
            departure,
        )
        .with_soc(row.initial_soc_fraction, row.target_soc_fraction)
        .with_efficiency(row.efficiency)
        .with_standby_loss(row.standby_loss_kw);
        if let Some(cid) = row.charger.filter(|c| !c.is_empty()) {
            spec = spec.with_charger(cid);
        }
        if let Some(car) = row.car.filter(|c| !c.is_empty()) {
            spec = spec.with_car(car);
        }
        specs.push(spec);
    }
    debug!(sessions = specs.len(), "roster read");
    Ok(specs)
}

/// Reads a roster CSV file against `schedule`.
///
/// # Errors
///
/// Returns [`SimError::Io`] if the file cannot be opened, otherwise as
/// [`read_roster`].
pub fn load_roster(path: &Path, schedule: &Schedule) -> Result<Vec<VehicleSpec>> {
    read_roster(BufReader::new(File::open(path)?), schedule)
}
