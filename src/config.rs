//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Deserialize;
use thiserror::Error;

use crate::devices::charger::{
    ChargerType, DEFAULT_CAPITAL_COST, DEFAULT_LIFETIME_YEARS, DEFAULT_MAINTENANCE_FRACTION,
};
use crate::error::Result as SimResult;
use crate::sim::controller::Strategy;
use crate::sim::types::SimConfig;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulation timing and control strategy.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Site demand limits, tariff, emissions and non-EV load.
    #[serde(default)]
    pub site: SiteConfig,
    /// Generated vehicle fleet.
    #[serde(default)]
    pub fleet: FleetConfig,
    /// Charger pool.
    #[serde(default)]
    pub chargers: ChargersConfig,
}

/// Simulation timing and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Timestamp of the first step (`YYYY-MM-DDTHH:MM:SS`).
    pub start: NaiveDateTime,
    /// Number of days to simulate (must be > 0).
    pub days: usize,
    /// Step width in minutes (must divide a day).
    pub step_minutes: u32,
    /// Master random seed.
    pub seed: u64,
    /// Charging strategy.
    pub strategy: Strategy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            days: 7,
            step_minutes: 30,
            seed: 42,
            strategy: Strategy::Basic,
        }
    }
}

/// Synthetic site inputs used when no schedule CSV is supplied.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Demand limit outside the peak window (kW).
    pub offpeak_demand_limit_kw: f64,
    /// Demand limit inside the peak window (kW).
    pub peak_demand_limit_kw: f64,
    /// First hour of the peak window (inclusive).
    pub peak_start_hour: u32,
    /// Last hour of the peak window (exclusive).
    pub peak_end_hour: u32,
    /// First hour of the cheap midday band (inclusive).
    pub midday_start_hour: u32,
    /// Last hour of the cheap midday band (exclusive).
    pub midday_end_hour: u32,
    /// Mean non-EV load (kW).
    pub base_load_kw: f64,
    /// Daily swing of the non-EV load (kW).
    pub load_amplitude_kw: f64,
    /// Noise on the non-EV load (kW).
    pub load_noise_std_kw: f64,
    /// Energy price outside the peak window (currency/kWh).
    pub offpeak_price_per_kwh: f64,
    /// Energy price inside the peak window (currency/kWh).
    pub peak_price_per_kwh: f64,
    /// Energy price inside the midday band (currency/kWh); the peak price wins
    /// where the two overlap.
    pub midday_price_per_kwh: f64,
    /// Mean grid emission factor (gCO2/kWh).
    pub emission_mean_g_per_kwh: f64,
    /// Daily swing of the emission factor (gCO2/kWh).
    pub emission_amplitude_g_per_kwh: f64,
    /// Depth of the midday solar dip in the emission factor (gCO2/kWh).
    pub emission_solar_dip_g_per_kwh: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            offpeak_demand_limit_kw: 150.0,
            peak_demand_limit_kw: 120.0,
            peak_start_hour: 16,
            peak_end_hour: 20,
            midday_start_hour: 11,
            midday_end_hour: 14,
            base_load_kw: 40.0,
            load_amplitude_kw: 15.0,
            load_noise_std_kw: 2.0,
            offpeak_price_per_kwh: 0.15,
            peak_price_per_kwh: 0.35,
            midday_price_per_kwh: 0.10,
            emission_mean_g_per_kwh: 200.0,
            emission_amplitude_g_per_kwh: 60.0,
            emission_solar_dip_g_per_kwh: 120.0,
        }
    }
}

/// Fleet generation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    /// Number of vehicles.
    pub vehicles: usize,
    /// Smallest battery (kWh).
    pub battery_min_kwh: f64,
    /// Largest battery (kWh).
    pub battery_max_kwh: f64,
    /// State of charge on arrival (0.0–1.0).
    pub initial_soc: f64,
    /// Charge added per session as a fraction of capacity.
    pub charge_amount: f64,
    /// Vehicle charge power limit (kW).
    pub max_rate_kw: f64,
    /// Charging efficiency (0.0–1.0].
    pub efficiency: f64,
    /// Standby loss while parked (kWh per hour).
    pub standby_loss_kw: f64,
    /// Daily arrival time.
    pub arrival: NaiveTime,
    /// Daily departure time.
    pub departure: NaiveTime,
    /// Days of the week the fleet is on site.
    pub working_days: Vec<Weekday>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            vehicles: 10,
            battery_min_kwh: 60.0,
            battery_max_kwh: 120.0,
            initial_soc: 0.5,
            charge_amount: 0.15,
            max_rate_kw: 7.0,
            efficiency: 1.0,
            standby_loss_kw: 0.0,
            arrival: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            departure: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }
}

/// Charger pool parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChargersConfig {
    /// Size of a shared pool; unset means one dedicated charger per vehicle.
    pub count: Option<usize>,
    /// Charger rating (kW).
    pub rating_kw: f64,
    /// Charging level.
    pub charger_type: ChargerType,
    /// Capital cost per charger.
    pub capital_cost: f64,
    /// Annual maintenance as a fraction of capital cost.
    pub maintenance_fraction: f64,
    /// Lifetime in years.
    pub lifetime_years: u32,
}

impl Default for ChargersConfig {
    fn default() -> Self {
        Self {
            count: None,
            rating_kw: 7.0,
            charger_type: ChargerType::Level2,
            capital_cost: DEFAULT_CAPITAL_COST,
            maintenance_fraction: DEFAULT_MAINTENANCE_FRACTION,
            lifetime_years: DEFAULT_LIFETIME_YEARS,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.days"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: one week, ten vehicles, one charger each.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the constrained preset: a larger fleet sharing a small pool
    /// under a tight demand limit, optimised for cost.
    ///
    /// The morning headroom cannot serve the whole pool at full rate, while
    /// the day as a whole has room to spare, so the strategies disagree on
    /// when to charge.
    pub fn constrained() -> Self {
        Self {
            simulation: SimulationConfig {
                strategy: Strategy::CostOptimized,
                ..SimulationConfig::default()
            },
            site: SiteConfig {
                offpeak_demand_limit_kw: 90.0,
                peak_demand_limit_kw: 70.0,
                base_load_kw: 45.0,
                ..SiteConfig::default()
            },
            fleet: FleetConfig {
                vehicles: 20,
                charge_amount: 0.2,
                ..FleetConfig::default()
            },
            chargers: ChargersConfig {
                count: Some(8),
                ..ChargersConfig::default()
            },
        }
    }

    /// Returns the annual preset: a full year at hourly resolution.
    pub fn annual() -> Self {
        Self {
            simulation: SimulationConfig {
                days: 365,
                step_minutes: 60,
                ..SimulationConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "constrained", "annual"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "constrained" => Ok(Self::constrained()),
            "annual" => Ok(Self::annual()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Steps per simulated day.
    pub fn steps_per_day(&self) -> usize {
        match self.simulation.step_minutes {
            0 => 0,
            m => (1440 / m) as usize,
        }
    }

    /// Timing for generated schedules.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`](crate::error::SimError::InvalidInput)
    /// for zero days or a step that does not divide a day.
    pub fn sim_config(&self) -> SimResult<SimConfig> {
        let s = &self.simulation;
        SimConfig::new(s.start, self.steps_per_day(), s.days, s.seed)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.days == 0 {
            errors.push(ConfigError::new("simulation.days", "must be > 0"));
        }
        if s.step_minutes == 0 || 1440 % s.step_minutes != 0 {
            errors.push(ConfigError::new(
                "simulation.step_minutes",
                format!("must divide 1440, got {}", s.step_minutes),
            ));
        }

        let site = &self.site;
        for (field, value) in [
            ("site.offpeak_demand_limit_kw", site.offpeak_demand_limit_kw),
            ("site.peak_demand_limit_kw", site.peak_demand_limit_kw),
            ("site.base_load_kw", site.base_load_kw),
            ("site.load_noise_std_kw", site.load_noise_std_kw),
            ("site.emission_mean_g_per_kwh", site.emission_mean_g_per_kwh),
            (
                "site.emission_solar_dip_g_per_kwh",
                site.emission_solar_dip_g_per_kwh,
            ),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(ConfigError::new(field, "must be >= 0"));
            }
        }
        if site.peak_start_hour > site.peak_end_hour || site.peak_end_hour > 24 {
            errors.push(ConfigError::new(
                "site.peak_start_hour",
                "must satisfy peak_start_hour <= peak_end_hour <= 24",
            ));
        }
        if site.midday_start_hour > site.midday_end_hour || site.midday_end_hour > 24 {
            errors.push(ConfigError::new(
                "site.midday_start_hour",
                "must satisfy midday_start_hour <= midday_end_hour <= 24",
            ));
        }
        for (field, value) in [
            ("site.offpeak_price_per_kwh", site.offpeak_price_per_kwh),
            ("site.peak_price_per_kwh", site.peak_price_per_kwh),
            ("site.midday_price_per_kwh", site.midday_price_per_kwh),
        ] {
            if !value.is_finite() {
                errors.push(ConfigError::new(field, "must be finite"));
            }
        }

        let f = &self.fleet;
        if !(f.battery_min_kwh > 0.0 && f.battery_min_kwh <= f.battery_max_kwh) {
            errors.push(ConfigError::new(
                "fleet.battery_min_kwh",
                "must be > 0 and <= fleet.battery_max_kwh",
            ));
        }
        if !(0.0..=1.0).contains(&f.initial_soc) {
            errors.push(ConfigError::new("fleet.initial_soc", "must be in [0.0, 1.0]"));
        }
        if !(f.charge_amount >= 0.0) {
            errors.push(ConfigError::new("fleet.charge_amount", "must be >= 0"));
        }
        if !(f.max_rate_kw > 0.0) {
            errors.push(ConfigError::new("fleet.max_rate_kw", "must be > 0"));
        }
        if !(f.efficiency > 0.0 && f.efficiency <= 1.0) {
            errors.push(ConfigError::new("fleet.efficiency", "must be in (0.0, 1.0]"));
        }
        if !(f.standby_loss_kw >= 0.0) {
            errors.push(ConfigError::new("fleet.standby_loss_kw", "must be >= 0"));
        }
        if f.arrival >= f.departure {
            errors.push(ConfigError::new(
                "fleet.arrival",
                "must be before fleet.departure",
            ));
        }

        let c = &self.chargers;
        if c.count == Some(0) {
            errors.push(ConfigError::new("chargers.count", "must be > 0 when set"));
        }
        if !(c.rating_kw > 0.0) {
            errors.push(ConfigError::new("chargers.rating_kw", "must be > 0"));
        }
        if !(c.capital_cost >= 0.0) {
            errors.push(ConfigError::new("chargers.capital_cost", "must be >= 0"));
        }
        if !(c.maintenance_fraction >= 0.0) {
            errors.push(ConfigError::new(
                "chargers.maintenance_fraction",
                "must be >= 0",
            ));
        }
        if c.lifetime_years == 0 {
            errors.push(ConfigError::new("chargers.lifetime_years", "must be > 0"));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = ScenarioConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
        assert_eq!(cfg.steps_per_day(), 48);
    }

    #[test]
    fn from_preset_unknown() {
        let e = ScenarioConfig::from_preset("nonexistent").unwrap_err();
        assert!(e.message.contains("unknown preset"));
        assert!(e.to_string().starts_with("config error: preset"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
start = "2024-06-03T00:00:00"
days = 2
step_minutes = 15
seed = 99
strategy = "emission_optimized"

[site]
offpeak_demand_limit_kw = 80.0
peak_demand_limit_kw = 60.0
peak_start_hour = 17
peak_end_hour = 21

[fleet]
vehicles = 4
arrival = "07:30:00"
departure = "16:00:00"
working_days = ["Mon", "Wed"]

[chargers]
count = 2
rating_kw = 11.0
charger_type = "level3"
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.days, 2);
        assert_eq!(cfg.steps_per_day(), 96);
        assert_eq!(cfg.simulation.strategy, Strategy::EmissionOptimized);
        assert_eq!(cfg.fleet.working_days, vec![Weekday::Mon, Weekday::Wed]);
        assert_eq!(cfg.chargers.count, Some(2));
        assert_eq!(cfg.chargers.charger_type, ChargerType::Level3);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[simulation]
days = 3
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let toml = r#"
[simulation]
strategy = "cheapest"
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_uneven_step() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.step_minutes = 7;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.step_minutes"));
    }

    #[test]
    fn validation_catches_invalid_soc() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.fleet.initial_soc = 1.5;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "fleet.initial_soc"));
    }

    #[test]
    fn validation_catches_inverted_battery_range() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.fleet.battery_min_kwh = 130.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "fleet.battery_min_kwh"));
    }

    #[test]
    fn validation_reports_every_error() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.days = 0;
        cfg.chargers.rating_kw = 0.0;
        cfg.chargers.count = Some(0);
        assert_eq!(cfg.validate().len(), 3);
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn constrained_is_tighter_than_baseline() {
        let base = ScenarioConfig::baseline();
        let tight = ScenarioConfig::constrained();
        assert!(tight.site.peak_demand_limit_kw < base.site.peak_demand_limit_kw);
        assert!(tight.chargers.count.is_some());
        assert!(tight.fleet.vehicles > base.fleet.vehicles);
    }

    #[test]
    fn inverted_midday_band_is_invalid() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.site.midday_start_hour = 15;
        cfg.site.midday_end_hour = 12;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "site.midday_start_hour"));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.seed, 99);
        assert_eq!(cfg.simulation.step_minutes, 30);
        assert_eq!(cfg.fleet.vehicles, 10);
    }

    #[test]
    fn sim_config_matches_step_minutes() {
        let cfg = ScenarioConfig::annual();
        let sim = cfg.sim_config().unwrap();
        assert_eq!(sim.steps_per_day, 24);
        assert_eq!(sim.total_steps(), 365 * 24);
    }
}
