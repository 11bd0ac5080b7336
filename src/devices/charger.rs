use serde::{Deserialize, Serialize};

use crate::devices::vehicle::Vehicle;
use crate::error::{Result, SimError};

/// Default specific capital cost per charger (currency units).
pub const DEFAULT_CAPITAL_COST: f64 = 12_000.0;
/// Default annual maintenance cost as a fraction of capital cost.
pub const DEFAULT_MAINTENANCE_FRACTION: f64 = 0.01;
/// Default charger lifetime in years.
pub const DEFAULT_LIFETIME_YEARS: u32 = 30;

/// Charging level of a site charger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargerType {
    /// Slow AC charging from a standard outlet.
    Level1,
    /// Dedicated AC wallbox.
    #[default]
    Level2,
    /// DC fast charging.
    Level3,
}

impl ChargerType {
    /// Typical power rating for the level (kW).
    pub fn typical_rating_kw(self) -> f64 {
        match self {
            ChargerType::Level1 => 2.3,
            ChargerType::Level2 => 7.0,
            ChargerType::Level3 => 50.0,
        }
    }
}

/// Static description of a charger: rating and economics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerSpec {
    pub id: String,
    pub rating_kw: f64,
    pub charger_type: ChargerType,
    pub capital_cost: f64,
    pub maintenance_fraction: f64,
    pub lifetime_years: u32,
}

impl ChargerSpec {
    /// Level 2 charger with default economics and the given rating.
    pub fn new(id: impl Into<String>, rating_kw: f64) -> Self {
        Self {
            id: id.into(),
            rating_kw,
            charger_type: ChargerType::Level2,
            capital_cost: DEFAULT_CAPITAL_COST,
            maintenance_fraction: DEFAULT_MAINTENANCE_FRACTION,
            lifetime_years: DEFAULT_LIFETIME_YEARS,
        }
    }

    /// Checks rating and economics.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] for a non-positive rating, negative
    /// costs, or a zero lifetime.
    pub fn validate(&self) -> Result<()> {
        let field = |name: &str| format!("charger[{}].{name}", self.id);
        if self.id.is_empty() {
            return Err(SimError::invalid_input("charger.id", "must not be empty"));
        }
        if !(self.rating_kw.is_finite() && self.rating_kw > 0.0) {
            return Err(SimError::invalid_input(field("rating_kw"), "must be > 0"));
        }
        if !(self.capital_cost.is_finite() && self.capital_cost >= 0.0) {
            return Err(SimError::invalid_input(field("capital_cost"), "must be >= 0"));
        }
        if !(self.maintenance_fraction.is_finite() && self.maintenance_fraction >= 0.0) {
            return Err(SimError::invalid_input(
                field("maintenance_fraction"),
                "must be >= 0",
            ));
        }
        if self.lifetime_years == 0 {
            return Err(SimError::invalid_input(field("lifetime_years"), "must be > 0"));
        }
        Ok(())
    }

    /// Annual maintenance cost (currency units per year).
    pub fn annual_maintenance_cost(&self) -> f64 {
        self.capital_cost * self.maintenance_fraction
    }
}

/// A site charging point holding at most one vehicle at a time.
#[derive(Debug, Clone)]
pub struct Charger {
    spec: ChargerSpec,
    occupant: Option<String>,
}

impl Charger {
    /// Creates a free charger from its spec.
    ///
    /// # Errors
    ///
    /// Propagates [`ChargerSpec::validate`] failures.
    pub fn new(spec: ChargerSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            occupant: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn rating_kw(&self) -> f64 {
        self.spec.rating_kw
    }

    pub fn spec(&self) -> &ChargerSpec {
        &self.spec
    }

    /// Id of the connected vehicle, if any.
    pub fn occupant(&self) -> Option<&str> {
        self.occupant.as_deref()
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }

    /// Assigns `vehicle` to this charger.
    ///
    /// Reconnecting the vehicle that is already assigned is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AlreadyOccupied`] if a different vehicle holds the charger.
    pub fn connect(&mut self, vehicle: &Vehicle) -> Result<()> {
        match &self.occupant {
            Some(current) if current != vehicle.id() => Err(SimError::AlreadyOccupied {
                charger: self.spec.id.clone(),
                occupant: current.clone(),
                vehicle: vehicle.id().to_string(),
            }),
            _ => {
                self.occupant = Some(vehicle.id().to_string());
                Ok(())
            }
        }
    }

    /// Releases the charger. Idempotent.
    pub fn disconnect(&mut self) {
        self.occupant = None;
    }

    /// Delivers `power_kw` for `duration_h` hours into the connected vehicle's battery.
    ///
    /// Returns the energy stored in the battery (kWh), which may be less than
    /// `power_kw * duration_h * efficiency` when the battery fills up.
    ///
    /// # Errors
    ///
    /// * [`SimError::NotConnected`] if `vehicle` is not the charger's occupant.
    /// * [`SimError::InvalidInput`] if the power is negative or above the rating.
    pub fn deliver(&self, vehicle: &mut Vehicle, power_kw: f64, duration_h: f64) -> Result<f64> {
        if self.occupant.as_deref() != Some(vehicle.id()) {
            return Err(SimError::NotConnected {
                charger: self.spec.id.clone(),
                vehicle: vehicle.id().to_string(),
            });
        }
        if power_kw > self.spec.rating_kw + 1e-9 {
            return Err(SimError::invalid_input(
                format!("charger[{}].power_kw", self.spec.id),
                format!("{power_kw} exceeds rating {}", self.spec.rating_kw),
            ));
        }
        vehicle.battery_mut().charge(power_kw, duration_h)
    }
}
