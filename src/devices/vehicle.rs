use serde::{Deserialize, Serialize};

use crate::devices::battery::Battery;
use crate::error::{Result, SimError};
use crate::sim::types::UnmetTarget;

/// Energy shortfall (kWh) below which a departure still counts as on target.
pub const TARGET_TOLERANCE_KWH: f64 = 1e-6;

/// One row of the vehicle roster: a single connection session at the site.
///
/// `arrival` and `departure` are timestep indices; the vehicle is
/// connectable during `[arrival, departure)`. Sessions sharing a `car` are
/// the same physical vehicle on different visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpec {
    /// Unique vehicle (session) identifier.
    pub id: String,
    /// Usable battery capacity (kWh, > 0).
    pub battery_capacity_kwh: f64,
    /// Maximum charge power the vehicle accepts (kW).
    pub max_rate_kw: f64,
    /// First connectable timestep.
    pub arrival: usize,
    /// Timestep at which the vehicle leaves (exclusive).
    pub departure: usize,
    /// State of charge on arrival as a fraction of capacity.
    pub initial_soc_fraction: f64,
    /// Requested state of charge at departure as a fraction of capacity.
    pub target_soc_fraction: f64,
    /// Charging efficiency (0 < eta <= 1).
    pub efficiency: f64,
    /// Standby loss while parked (kWh per hour).
    pub standby_loss_kw: f64,
    /// Charger this session is pinned to, if any.
    pub charger: Option<String>,
    /// Physical car this session belongs to; the session id when unset.
    pub car: Option<String>,
}

impl VehicleSpec {
    /// Creates a session spec that arrives half full and wants a full battery.
    pub fn new(
        id: impl Into<String>,
        battery_capacity_kwh: f64,
        max_rate_kw: f64,
        arrival: usize,
        departure: usize,
    ) -> Self {
        Self {
            id: id.into(),
            battery_capacity_kwh,
            max_rate_kw,
            arrival,
            departure,
            initial_soc_fraction: 0.5,
            target_soc_fraction: 1.0,
            efficiency: 1.0,
            standby_loss_kw: 0.0,
            charger: None,
            car: None,
        }
    }

    /// Sets initial and target state of charge fractions.
    pub fn with_soc(mut self, initial_fraction: f64, target_fraction: f64) -> Self {
        self.initial_soc_fraction = initial_fraction;
        self.target_soc_fraction = target_fraction;
        self
    }

    /// Sets the charging efficiency.
    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    /// Sets the standby loss (kWh per hour).
    pub fn with_standby_loss(mut self, loss_kw: f64) -> Self {
        self.standby_loss_kw = loss_kw;
        self
    }

    /// Pins the session to a charger.
    pub fn with_charger(mut self, charger: impl Into<String>) -> Self {
        self.charger = Some(charger.into());
        self
    }

    /// Assigns the session to a physical car.
    pub fn with_car(mut self, car: impl Into<String>) -> Self {
        self.car = Some(car.into());
        self
    }

    /// Id of the physical car: `car` if set, else the session id.
    pub fn car_id(&self) -> &str {
        self.car.as_deref().unwrap_or(&self.id)
    }
}

/// Connection lifecycle of a vehicle.
///
/// `Unconnected -> Connected -> (Charging | Idle)* -> Departed`.
/// `Departed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Not yet plugged in (before arrival, or waiting for a free charger).
    Unconnected,
    /// Plugged in during this step, no allocation applied yet.
    Connected,
    /// Received energy in the last step.
    Charging,
    /// Plugged in but received nothing in the last step.
    Idle,
    /// Left the site; excluded from all further allocation.
    Departed,
}

/// A vehicle with its battery, connection window and charging target.
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: String,
    car: String,
    battery: Battery,
    arrival: usize,
    departure: usize,
    target_soc_kwh: f64,
    pinned_charger: Option<String>,
    state: ConnectionState,
    charger: Option<String>,
    energy_stored_kwh: f64,
    energy_drawn_kwh: f64,
}

impl Vehicle {
    /// Builds a vehicle from its roster row.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] when the window is empty, a SoC
    /// fraction is outside `[0, 1]`, or the battery parameters are invalid.
    pub fn from_spec(spec: &VehicleSpec) -> Result<Self> {
        let field = |name: &str| format!("vehicle[{}].{name}", spec.id);

        if spec.id.is_empty() {
            return Err(SimError::invalid_input("vehicle.id", "must not be empty"));
        }
        if spec.arrival >= spec.departure {
            return Err(SimError::invalid_input(
                field("arrival"),
                format!(
                    "must be < departure ({} >= {})",
                    spec.arrival, spec.departure
                ),
            ));
        }
        for (name, value) in [
            ("initial_soc_fraction", spec.initial_soc_fraction),
            ("target_soc_fraction", spec.target_soc_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::invalid_input(
                    field(name),
                    format!("must be in [0, 1], got {value}"),
                ));
            }
        }
        if !(spec.max_rate_kw.is_finite() && spec.max_rate_kw > 0.0) {
            return Err(SimError::invalid_input(field("max_rate_kw"), "must be > 0"));
        }

        let capacity = spec.battery_capacity_kwh;
        let battery = Battery::new(
            capacity,
            capacity * spec.initial_soc_fraction,
            spec.efficiency,
            spec.max_rate_kw,
        )
        .and_then(|b| b.with_standby_loss(spec.standby_loss_kw))
        .map_err(|e| match e {
            SimError::InvalidInput { field: f, message } => {
                SimError::invalid_input(field(&f), message)
            }
            other => other,
        })?;

        Ok(Self {
            id: spec.id.clone(),
            car: spec.car_id().to_string(),
            battery,
            arrival: spec.arrival,
            departure: spec.departure,
            target_soc_kwh: capacity * spec.target_soc_fraction,
            pinned_charger: spec.charger.clone(),
            state: ConnectionState::Unconnected,
            charger: None,
            energy_stored_kwh: 0.0,
            energy_drawn_kwh: 0.0,
        })
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Physical car the session belongs to.
    pub fn car_id(&self) -> &str {
        &self.car
    }

    /// First connectable timestep.
    pub fn arrival(&self) -> usize {
        self.arrival
    }

    /// Departure timestep (exclusive end of the window).
    pub fn departure(&self) -> usize {
        self.departure
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Charger the vehicle is plugged into.
    pub fn charger(&self) -> Option<&str> {
        self.charger.as_deref()
    }

    /// Charger the session is pinned to by the roster.
    pub fn pinned_charger(&self) -> Option<&str> {
        self.pinned_charger.as_deref()
    }

    /// The vehicle's battery.
    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    pub(crate) fn battery_mut(&mut self) -> &mut Battery {
        &mut self.battery
    }

    /// Requested state of charge at departure (kWh).
    pub fn target_soc_kwh(&self) -> f64 {
        self.target_soc_kwh
    }

    /// Energy stored in the battery over the run (kWh).
    pub fn energy_stored_kwh(&self) -> f64 {
        self.energy_stored_kwh
    }

    /// Grid energy drawn over the run (kWh).
    pub fn energy_drawn_kwh(&self) -> f64 {
        self.energy_drawn_kwh
    }

    /// Stored energy still missing to reach the target (kWh).
    pub fn energy_need_kwh(&self) -> f64 {
        (self.target_soc_kwh - self.battery.state_of_charge()).max(0.0)
    }

    /// Returns `true` when the battery holds at least the target energy.
    pub fn target_met(&self) -> bool {
        self.battery.state_of_charge() >= self.target_soc_kwh - TARGET_TOLERANCE_KWH
    }

    /// Returns `true` when `timestep` lies inside `[arrival, departure)`.
    pub fn is_connectable(&self, timestep: usize) -> bool {
        timestep >= self.arrival && timestep < self.departure
    }

    /// Returns `true` while plugged into a charger.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Charging | ConnectionState::Idle
        )
    }

    /// Plugs the vehicle into `charger`.
    ///
    /// Only an `Unconnected` vehicle can connect; any other state is left untouched
    /// and `false` is returned.
    pub(crate) fn connect(&mut self, charger: &str) -> bool {
        if self.state != ConnectionState::Unconnected {
            return false;
        }
        self.state = ConnectionState::Connected;
        self.charger = Some(charger.to_string());
        true
    }

    /// Books the outcome of one step's allocation.
    pub(crate) fn record_step(&mut self, stored_kwh: f64, drawn_kwh: f64) {
        if !self.is_connected() {
            return;
        }
        self.energy_stored_kwh += stored_kwh;
        self.energy_drawn_kwh += drawn_kwh;
        self.state = if stored_kwh > 0.0 {
            ConnectionState::Charging
        } else {
            ConnectionState::Idle
        };
    }

    /// Moves the vehicle to `Departed` at `timestep`.
    ///
    /// Returns an [`UnmetTarget`] when it leaves below its requested state of
    /// charge. Departing twice is a no-op returning `None`.
    pub(crate) fn depart(&mut self, timestep: usize) -> Option<UnmetTarget> {
        if self.state == ConnectionState::Departed {
            return None;
        }
        self.state = ConnectionState::Departed;
        self.charger = None;

        if self.target_met() {
            None
        } else {
            Some(UnmetTarget {
                vehicle_id: self.id.clone(),
                departure_step: timestep,
                soc_kwh: self.battery.state_of_charge(),
                target_kwh: self.target_soc_kwh,
            })
        }
    }
}
