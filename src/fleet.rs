//! Synthetic fleet generation and charger pool sizing.

use chrono::{Datelike, NaiveDate};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::config::{ChargersConfig, FleetConfig};
use crate::devices::charger::ChargerSpec;
use crate::devices::vehicle::VehicleSpec;
use crate::error::{Result, SimError};
use crate::sim::schedule::Schedule;

/// A physical car of the generated fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    /// `EV_1`, `EV_2`, ...
    pub id: String,
    pub battery_capacity_kwh: f64,
}

/// Charger id for the k-th charger (1-based).
pub fn charger_id(k: usize) -> String {
    format!("Charger_{k}")
}

/// Draws `fleet.vehicles` cars with battery sizes uniform in the configured
/// range, rounded to 0.01 kWh.
///
/// # Arguments
///
/// * `fleet` - Fleet parameters
/// * `seed` - Random seed; the same seed always yields the same fleet
///
/// # Errors
///
/// Returns [`SimError::InvalidInput`] if the battery range is empty or not positive.
pub fn generate_cars(fleet: &FleetConfig, seed: u64) -> Result<Vec<Car>> {
    let (min, max) = (fleet.battery_min_kwh, fleet.battery_max_kwh);
    if !(min > 0.0 && min <= max && max.is_finite()) {
        return Err(SimError::invalid_input(
            "fleet.battery_min_kwh",
            format!("need 0 < min <= max, got [{min}, {max}]"),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let cars = (1..=fleet.vehicles)
        .map(|k| {
            let raw = if min < max {
                rng.random_range(min..=max)
            } else {
                min
            };
            Car {
                id: format!("EV_{k}"),
                battery_capacity_kwh: (raw * 100.0).round() / 100.0,
            }
        })
        .collect();
    Ok(cars)
}

/// Expands cars into one connection session per working day of the schedule.
///
/// Arrival and departure clock times are resolved to the first step at or
/// after them. Days whose window falls outside the schedule are skipped.
/// Every session carries its car's id, so the ledger tracks the car.
/// With `pinned` set, every session of car `k` is pinned to `Charger_k`.
pub fn sessions(
    cars: &[Car],
    fleet: &FleetConfig,
    schedule: &Schedule,
    pinned: bool,
) -> Vec<VehicleSpec> {
    if schedule.is_empty() {
        return Vec::new();
    }
    let target = (fleet.initial_soc + fleet.charge_amount).min(1.0);

    let days: Vec<NaiveDate> = schedule
        .start()
        .date()
        .iter_days()
        .take_while(|d| *d <= schedule.end().date())
        .filter(|d| fleet.working_days.contains(&d.weekday()))
        .collect();

    let mut specs = Vec::with_capacity(cars.len() * days.len());
    for day in &days {
        let arrival = schedule.step_at_or_after(day.and_time(fleet.arrival));
        let departure = schedule.step_at_or_after(day.and_time(fleet.departure));
        if arrival >= departure {
            debug!(%day, "no steps inside the working window, skipping day");
            continue;
        }
        for (k, car) in cars.iter().enumerate() {
            let mut spec = VehicleSpec::new(
                format!("{}_{}", car.id, day.format("%Y%m%d")),
                car.battery_capacity_kwh,
                fleet.max_rate_kw,
                arrival,
                departure,
            )
            .with_soc(fleet.initial_soc, target)
            .with_efficiency(fleet.efficiency)
            .with_standby_loss(fleet.standby_loss_kw)
            .with_car(&car.id);
            if pinned {
                spec = spec.with_charger(charger_id(k + 1));
            }
            specs.push(spec);
        }
    }
    specs
}

/// Sizes the charger pool: one per car when `count` is unset, otherwise a
/// shared pool of `count` chargers.
pub fn chargers(cfg: &ChargersConfig, cars: usize) -> Vec<ChargerSpec> {
    let n = cfg.count.unwrap_or(cars);
    (1..=n)
        .map(|k| ChargerSpec {
            id: charger_id(k),
            rating_kw: cfg.rating_kw,
            charger_type: cfg.charger_type,
            capital_cost: cfg.capital_cost,
            maintenance_fraction: cfg.maintenance_fraction,
            lifetime_years: cfg.lifetime_years,
        })
        .collect()
}

/// Generates the full roster and charger set for a schedule.
///
/// # Errors
///
/// Returns [`SimError::InvalidInput`] for an invalid battery range.
pub fn generate(
    fleet: &FleetConfig,
    charger_cfg: &ChargersConfig,
    schedule: &Schedule,
    seed: u64,
) -> Result<(Vec<VehicleSpec>, Vec<ChargerSpec>)> {
    let cars = generate_cars(fleet, seed)?;
    let pinned = charger_cfg.count.is_none();
    let roster = sessions(&cars, fleet, schedule, pinned);
    let pool = chargers(charger_cfg, cars.len());
    debug!(
        cars = cars.len(),
        sessions = roster.len(),
        chargers = pool.len(),
        pinned,
        "fleet generated"
    );
    Ok((roster, pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::schedule::ScheduleRow;
    use chrono::{NaiveDateTime, TimeDelta};

    fn monday() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn week_schedule(days: usize) -> Schedule {
        let rows = (0..days * 24)
            .map(|h| ScheduleRow::new(monday() + TimeDelta::hours(h as i64), 100.0, 0.2, 100.0, 0.0))
            .collect();
        Schedule::new(rows, TimeDelta::hours(1)).unwrap()
    }

    #[test]
    fn cars_are_seeded_and_rounded() {
        let fleet = FleetConfig::default();
        let a = generate_cars(&fleet, 7).unwrap();
        let b = generate_cars(&fleet, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert_eq!(a[0].id, "EV_1");
        for car in &a {
            assert!(car.battery_capacity_kwh >= 60.0 && car.battery_capacity_kwh <= 120.0);
            let cents = car.battery_capacity_kwh * 100.0;
            assert!((cents - cents.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn fixed_battery_size() {
        let fleet = FleetConfig {
            battery_min_kwh: 75.0,
            battery_max_kwh: 75.0,
            ..FleetConfig::default()
        };
        let cars = generate_cars(&fleet, 1).unwrap();
        assert!(cars.iter().all(|c| c.battery_capacity_kwh == 75.0));
    }

    #[test]
    fn inverted_battery_range_is_invalid() {
        let fleet = FleetConfig {
            battery_min_kwh: 90.0,
            battery_max_kwh: 60.0,
            ..FleetConfig::default()
        };
        assert!(matches!(
            generate_cars(&fleet, 1),
            Err(SimError::InvalidInput { .. })
        ));
    }

    #[test]
    fn one_session_per_working_day() {
        let fleet = FleetConfig {
            vehicles: 2,
            ..FleetConfig::default()
        };
        let schedule = week_schedule(7);
        let cars = generate_cars(&fleet, 3).unwrap();
        let specs = sessions(&cars, &fleet, &schedule, true);
        // Mon-Fri for two cars
        assert_eq!(specs.len(), 10);
        let first = &specs[0];
        assert_eq!(first.id, "EV_1_20240101");
        assert_eq!(first.car_id(), "EV_1");
        assert_eq!(specs[2].car_id(), "EV_1");
        assert_eq!(first.arrival, 8);
        assert_eq!(first.departure, 17);
        assert_eq!(first.charger.as_deref(), Some("Charger_1"));
        assert!((first.target_soc_fraction - 0.65).abs() < 1e-12);
        assert_eq!(specs[2].arrival, 24 + 8);
    }

    #[test]
    fn target_is_capped_at_full() {
        let fleet = FleetConfig {
            vehicles: 1,
            initial_soc: 0.9,
            charge_amount: 0.3,
            ..FleetConfig::default()
        };
        let schedule = week_schedule(1);
        let cars = generate_cars(&fleet, 3).unwrap();
        let specs = sessions(&cars, &fleet, &schedule, false);
        assert_eq!(specs[0].target_soc_fraction, 1.0);
        assert!(specs[0].charger.is_none());
    }

    #[test]
    fn pool_sizing() {
        let one_each = chargers(&ChargersConfig::default(), 4);
        assert_eq!(one_each.len(), 4);
        assert_eq!(one_each[3].id, "Charger_4");

        let pool = chargers(
            &ChargersConfig {
                count: Some(2),
                ..ChargersConfig::default()
            },
            4,
        );
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn generate_pins_only_without_pool() {
        let schedule = week_schedule(1);
        let (roster, _) = generate(
            &FleetConfig::default(),
            &ChargersConfig {
                count: Some(3),
                ..ChargersConfig::default()
            },
            &schedule,
            5,
        )
        .unwrap();
        assert!(roster.iter().all(|v| v.charger.is_none()));

        let (roster, pool) =
            generate(&FleetConfig::default(), &ChargersConfig::default(), &schedule, 5).unwrap();
        assert!(roster.iter().all(|v| v.charger.is_some()));
        assert_eq!(pool.len(), 10);
    }
}
