//! Scenario assembly and run entry points.

use std::f64::consts::PI;

use chrono::Timelike;
use tracing::info;

use crate::config::ScenarioConfig;
use crate::devices::site_load::SiteLoad;
use crate::devices::vehicle::VehicleSpec;
use crate::error::Result;
use crate::fleet;
use crate::sim::controller::Strategy;
use crate::sim::ev_system::{EvSystem, RunOutcome};
use crate::sim::schedule::{Schedule, ScheduleRow};

/// Hour of the day at which the demo emission factor peaks.
const EMISSION_PEAK_HOUR: f64 = 19.0;

/// Centre of the midday solar dip in the emission factor.
const SOLAR_NOON_HOUR: f64 = 13.0;

/// Hours either side of solar noon over which the dip fades out.
const SOLAR_HALF_WIDTH_H: f64 = 3.0;

/// Builds a synthetic schedule from the `[simulation]` and `[site]` sections.
///
/// Non-EV load is a seeded daily sinusoid with noise. The demand limit
/// switches between an off-peak and a peak band. Price has three bands:
/// peak, a cheap midday band, and off-peak for the rest of the day. The
/// emission factor is a daily cosine peaking in the evening, minus a solar
/// dip centred on early afternoon.
///
/// # Errors
///
/// Returns [`SimError::InvalidInput`](crate::error::SimError::InvalidInput)
/// for invalid timing or non-finite site values.
pub fn demo_schedule(cfg: &ScenarioConfig) -> Result<Schedule> {
    let sim = cfg.sim_config()?;
    let site = &cfg.site;
    let mut load = SiteLoad::new(
        site.base_load_kw,      /* base_kw */
        site.load_amplitude_kw, /* amp_kw */
        0.0,                    /* phase_rad */
        site.load_noise_std_kw, /* noise_std */
        sim.steps_per_day,      /* steps_per_day */
        sim.seed,               /* seed */
    );

    let step = sim.step();
    let rows = (0..sim.total_steps())
        .map(|t| {
            let timestamp = sim.start + step * t as i32;
            let hour = timestamp.hour();
            let peak = hour >= site.peak_start_hour && hour < site.peak_end_hour;
            let midday = hour >= site.midday_start_hour && hour < site.midday_end_hour;
            let (limit, price) = if peak {
                (site.peak_demand_limit_kw, site.peak_price_per_kwh)
            } else if midday {
                (site.offpeak_demand_limit_kw, site.midday_price_per_kwh)
            } else {
                (site.offpeak_demand_limit_kw, site.offpeak_price_per_kwh)
            };
            let hour_frac = hour as f64 + timestamp.minute() as f64 / 60.0;
            let solar = ((hour_frac - SOLAR_NOON_HOUR) * PI / (2.0 * SOLAR_HALF_WIDTH_H))
                .cos()
                .max(0.0);
            let emission = site.emission_mean_g_per_kwh
                + site.emission_amplitude_g_per_kwh
                    * (2.0 * PI * (hour_frac - EMISSION_PEAK_HOUR) / 24.0).cos()
                - site.emission_solar_dip_g_per_kwh * solar;
            ScheduleRow::new(
                timestamp,
                limit,
                price,
                emission.max(0.0),
                load.demand_kw(t),
            )
        })
        .collect();
    Schedule::new(rows, step)
}

/// Assembles an [`EvSystem`] from a scenario and optional imported inputs.
///
/// Without a schedule the demo schedule is used; without a roster the fleet
/// is generated. An imported roster gets `chargers.count` pool chargers, or
/// one per session when the count is unset.
///
/// # Errors
///
/// Propagates schedule, fleet and roster validation errors.
pub fn build_system(
    cfg: &ScenarioConfig,
    schedule: Option<Schedule>,
    roster: Option<Vec<VehicleSpec>>,
) -> Result<EvSystem> {
    let schedule = match schedule {
        Some(s) => s,
        None => demo_schedule(cfg)?,
    };

    let (vehicles, chargers) = match roster {
        Some(vehicles) => {
            let chargers = fleet::chargers(&cfg.chargers, vehicles.len());
            (vehicles, chargers)
        }
        None => fleet::generate(
            &cfg.fleet,
            &cfg.chargers,
            &schedule,
            cfg.simulation.seed.wrapping_add(1),
        )?,
    };

    info!(
        steps = schedule.len(),
        sessions = vehicles.len(),
        chargers = chargers.len(),
        "scenario assembled"
    );
    EvSystem::new(schedule, vehicles, chargers, cfg.simulation.strategy)
}

/// Runs the whole schedule under `strategy` on a fresh context.
///
/// # Errors
///
/// Propagates the first fatal step error.
pub fn run_strategy(system: &EvSystem, strategy: Strategy) -> Result<RunOutcome> {
    let horizon = system.schedule().len();
    if strategy == system.strategy() {
        system.run(horizon)
    } else {
        system.with_strategy(strategy).run(horizon)
    }
}

/// Runs every strategy over identical inputs, uncontrolled first.
///
/// # Errors
///
/// Propagates the first failing run.
pub fn compare_strategies(system: &EvSystem) -> Result<Vec<RunOutcome>> {
    Strategy::ALL
        .iter()
        .map(|&s| run_strategy(system, s))
        .collect()
}
