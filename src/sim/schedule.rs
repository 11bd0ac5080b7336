//! Time-indexed external inputs: demand limit, price, emission factor, site load.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// One interval of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// Start of the interval.
    pub timestamp: NaiveDateTime,
    /// Maximum total site power (kW).
    pub demand_limit_kw: f64,
    /// Energy price (currency/kWh).
    pub price_per_kwh: f64,
    /// Grid carbon intensity (gCO2/kWh).
    pub emission_factor_g_per_kwh: f64,
    /// Non-EV site load (kW).
    pub other_site_load_kw: f64,
}

impl ScheduleRow {
    pub fn new(
        timestamp: NaiveDateTime,
        demand_limit_kw: f64,
        price_per_kwh: f64,
        emission_factor_g_per_kwh: f64,
        other_site_load_kw: f64,
    ) -> Self {
        Self {
            timestamp,
            demand_limit_kw,
            price_per_kwh,
            emission_factor_g_per_kwh,
            other_site_load_kw,
        }
    }

    /// Power available to EV charging: limit minus non-EV load, never negative.
    pub fn headroom_kw(&self) -> f64 {
        (self.demand_limit_kw - self.other_site_load_kw).max(0.0)
    }

    fn validate(&self, index: usize) -> Result<()> {
        let field = |name: &str| format!("schedule[{index}].{name}");
        let checks = [
            ("demand_limit_kw", self.demand_limit_kw, true),
            ("price_per_kwh", self.price_per_kwh, false),
            ("emission_factor_g_per_kwh", self.emission_factor_g_per_kwh, true),
            ("other_site_load_kw", self.other_site_load_kw, true),
        ];
        for (name, value, non_negative) in checks {
            if !value.is_finite() {
                return Err(SimError::invalid_input(field(name), "must be finite"));
            }
            if non_negative && value < 0.0 {
                return Err(SimError::invalid_input(
                    field(name),
                    format!("must be >= 0, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// Ordered, gap-free sequence of equal-width intervals.
///
/// Immutable once built; every run over the same schedule sees the same inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    rows: Vec<ScheduleRow>,
    step: TimeDelta,
}

impl Schedule {
    /// Builds a schedule with an explicit interval width.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] if the step is not positive, the
    /// rows are empty, any value is out of range, or consecutive timestamps
    /// are not exactly `step` apart.
    pub fn new(rows: Vec<ScheduleRow>, step: TimeDelta) -> Result<Self> {
        if step <= TimeDelta::zero() {
            return Err(SimError::invalid_input("schedule.step", "must be > 0"));
        }
        if rows.is_empty() {
            return Err(SimError::invalid_input("schedule", "must contain at least one row"));
        }
        for (i, row) in rows.iter().enumerate() {
            row.validate(i)?;
        }
        for (i, pair) in rows.windows(2).enumerate() {
            let gap = pair[1].timestamp - pair[0].timestamp;
            if gap != step {
                return Err(SimError::invalid_input(
                    format!("schedule[{}].timestamp", i + 1),
                    format!(
                        "expected {} after {}, got {}",
                        pair[0].timestamp + step,
                        pair[0].timestamp,
                        pair[1].timestamp
                    ),
                ));
            }
        }
        Ok(Self { rows, step })
    }

    /// Builds a schedule inferring the step from the first two rows.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] for fewer than two rows, plus every
    /// failure of [`Schedule::new`].
    pub fn from_rows(rows: Vec<ScheduleRow>) -> Result<Self> {
        if rows.len() < 2 {
            return Err(SimError::invalid_input(
                "schedule",
                "at least two rows are needed to infer the step",
            ));
        }
        let step = rows[1].timestamp - rows[0].timestamp;
        Self::new(rows, step)
    }

    /// Number of timesteps covered.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ScheduleRow] {
        &self.rows
    }

    /// Row for `timestep`, if covered.
    pub fn row(&self, timestep: usize) -> Option<&ScheduleRow> {
        self.rows.get(timestep)
    }

    pub fn step(&self) -> TimeDelta {
        self.step
    }

    /// Interval width in hours.
    pub fn dt_hours(&self) -> f64 {
        self.step.num_seconds() as f64 / 3600.0
    }

    /// Timestamp of the first interval.
    pub fn start(&self) -> NaiveDateTime {
        self.rows[0].timestamp
    }

    /// End of the last interval.
    pub fn end(&self) -> NaiveDateTime {
        self.rows[self.rows.len() - 1].timestamp + self.step
    }

    /// Index of the first interval starting at or after `ts`.
    ///
    /// Returns `len()` when `ts` lies past the last interval start.
    pub fn step_at_or_after(&self, ts: NaiveDateTime) -> usize {
        self.rows.partition_point(|r| r.timestamp < ts)
    }

    /// Checks that the schedule covers `horizon` timesteps.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ScheduleMismatch`] when it is shorter.
    pub fn ensure_covers(&self, horizon: usize) -> Result<()> {
        if horizon > self.rows.len() {
            return Err(SimError::ScheduleMismatch {
                requested: horizon,
                available: self.rows.len(),
            });
        }
        Ok(())
    }
}
