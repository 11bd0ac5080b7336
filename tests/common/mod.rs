//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use ev_site_sim::config::ScenarioConfig;
use ev_site_sim::sim::schedule::{Schedule, ScheduleRow};

/// 2024-01-01 (a Monday) at the given hour.
pub fn ts(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Hourly schedule with one row per entry of `prices`.
///
/// `emissions` must have the same length; limit and non-EV load are flat.
pub fn hourly_schedule(limit_kw: f64, other_kw: f64, prices: &[f64], emissions: &[f64]) -> Schedule {
    assert_eq!(prices.len(), emissions.len());
    let rows = prices
        .iter()
        .zip(emissions)
        .enumerate()
        .map(|(i, (&p, &e))| ScheduleRow::new(ts(0) + TimeDelta::hours(i as i64), limit_kw, p, e, other_kw))
        .collect();
    Schedule::new(rows, TimeDelta::hours(1)).unwrap()
}

/// `n` hourly rows with constant limit, price 0.20 and 100 g/kWh.
pub fn flat_schedule(n: usize, limit_kw: f64) -> Schedule {
    hourly_schedule(limit_kw, 0.0, &vec![0.2; n], &vec![100.0; n])
}

/// Baseline preset shortened to `days` at hourly resolution.
pub fn short_baseline(days: usize) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::baseline();
    cfg.simulation.days = days;
    cfg.simulation.step_minutes = 60;
    cfg
}

/// Constrained preset shortened to `days` at hourly resolution.
pub fn short_constrained(days: usize) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::constrained();
    cfg.simulation.days = days;
    cfg.simulation.step_minutes = 60;
    cfg
}
