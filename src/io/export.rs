//! CSV export for the ledger, step results and vehicle summaries.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::recorder::Record;
use crate::sim::types::{StepResult, VehicleSummary};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Column header for the per-entity ledger.
const LEDGER_HEADER: &str = "entity,id,timestep,timestamp,power_kw,soc_kwh,cost,emissions_g";

/// Column header for per-step site results.
const STEPS_HEADER: &str = "timestep,timestamp,demand_limit_kw,other_site_load_kw,ev_load_kw,\
                            site_load_kw,headroom_kw,price_per_kwh,emission_factor_g_per_kwh,\
                            ev_cost,ev_emissions_g,connected,charging,waiting,limit_ok";

/// Column header for per-vehicle summaries.
const VEHICLES_HEADER: &str =
    "id,energy_delivered_kwh,energy_drawn_kwh,final_soc_kwh,target_soc_kwh,target_met";

fn create(path: &Path) -> io::Result<io::BufWriter<File>> {
    Ok(io::BufWriter::new(File::create(path)?))
}

/// Writes the ledger as CSV to any writer, one row per record in commit order.
///
/// `soc_kwh` is empty for entities without a battery.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_ledger_csv(records: &[Record], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(LEDGER_HEADER.split(','))?;

    for r in records {
        wtr.write_record(&[
            r.entity.kind().to_string(),
            r.entity.id().to_string(),
            r.timestep.to_string(),
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.4}", r.power_kw),
            r.soc_kwh.map(|s| format!("{s:.4}")).unwrap_or_default(),
            format!("{:.4}", r.cost),
            format!("{:.4}", r.emissions_g),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports the ledger to a CSV file.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_ledger_csv(records: &[Record], path: &Path) -> io::Result<()> {
    write_ledger_csv(records, create(path)?)
}

/// Writes step results as CSV to any writer.
///
/// # Arguments
///
/// * `results` - Complete simulation step results
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_steps_csv(results: &[StepResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    // Header
    wtr.write_record(STEPS_HEADER.split(',').map(str::trim))?;

    // Data rows
    for r in results {
        wtr.write_record(&[
            r.timestep.to_string(),
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.4}", r.demand_limit_kw),
            format!("{:.4}", r.other_site_load_kw),
            format!("{:.4}", r.ev_load_kw),
            format!("{:.4}", r.site_load_kw),
            format!("{:.4}", r.headroom_kw),
            format!("{:.4}", r.price_per_kwh),
            format!("{:.4}", r.emission_factor_g_per_kwh),
            format!("{:.4}", r.ev_cost),
            format!("{:.4}", r.ev_emissions_g),
            r.connected_vehicles.to_string(),
            r.charging_vehicles.to_string(),
            r.waiting_vehicles.to_string(),
            r.within_demand_limit.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports step results to a CSV file at the given path.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_steps_csv(results: &[StepResult], path: &Path) -> io::Result<()> {
    write_steps_csv(results, create(path)?)
}

/// Writes vehicle summaries as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_vehicles_csv(vehicles: &[VehicleSummary], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(VEHICLES_HEADER.split(','))?;
    for v in vehicles {
        wtr.write_record(&[
            v.id.clone(),
            format!("{:.4}", v.energy_delivered_kwh),
            format!("{:.4}", v.energy_drawn_kwh),
            format!("{:.4}", v.final_soc_kwh),
            format!("{:.4}", v.target_soc_kwh),
            v.target_met.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports vehicle summaries to a CSV file.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_vehicles_csv(vehicles: &[VehicleSummary], path: &Path) -> io::Result<()> {
    write_vehicles_csv(vehicles, create(path)?)
}
