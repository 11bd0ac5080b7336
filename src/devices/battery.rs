use crate::error::{Result, SimError};

/// Traction battery of an electric vehicle.
///
/// `Battery` tracks its state of charge in kWh and enforces the charge
/// power limit, the charging efficiency, and the capacity ceiling. It only
/// charges; discharge to the grid is not modelled.
///
/// # Invariant
///
/// `0.0 <= soc_kwh <= capacity_kwh` after every update.
#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    /// Usable capacity in kilowatt-hours.
    capacity_kwh: f64,

    /// Stored energy in kilowatt-hours.
    soc_kwh: f64,

    /// Charging efficiency (0..=1.0), grid energy to stored energy.
    efficiency: f64,

    /// Maximum charge power accepted by the vehicle in kilowatts.
    max_charge_kw: f64,

    /// Standby loss while parked in kWh per hour.
    standby_loss_kw: f64,
}

impl Battery {
    /// Creates a new battery.
    ///
    /// # Arguments
    ///
    /// * `capacity_kwh` - Usable capacity (must be > 0)
    /// * `soc_kwh` - Initial stored energy (0..=capacity)
    /// * `efficiency` - Charging efficiency (0 < eta <= 1)
    /// * `max_charge_kw` - Maximum accepted charge power (must be >= 0)
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] if any parameter is out of range.
    pub fn new(capacity_kwh: f64, soc_kwh: f64, efficiency: f64, max_charge_kw: f64) -> Result<Self> {
        if !(capacity_kwh.is_finite() && capacity_kwh > 0.0) {
            return Err(SimError::invalid_input("battery.capacity_kwh", "must be > 0"));
        }
        if !(soc_kwh.is_finite() && (0.0..=capacity_kwh).contains(&soc_kwh)) {
            return Err(SimError::invalid_input(
                "battery.soc_kwh",
                format!("must be in [0, {capacity_kwh}], got {soc_kwh}"),
            ));
        }
        if !(efficiency > 0.0 && efficiency <= 1.0) {
            return Err(SimError::invalid_input(
                "battery.efficiency",
                format!("must be in (0, 1], got {efficiency}"),
            ));
        }
        if !(max_charge_kw.is_finite() && max_charge_kw >= 0.0) {
            return Err(SimError::invalid_input("battery.max_charge_kw", "must be >= 0"));
        }

        Ok(Self {
            capacity_kwh,
            soc_kwh,
            efficiency,
            max_charge_kw,
            standby_loss_kw: 0.0,
        })
    }

    /// Sets the standby loss applied by [`Battery::apply_standby_loss`].
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] if the loss is negative or not finite.
    pub fn with_standby_loss(mut self, loss_kw: f64) -> Result<Self> {
        if !(loss_kw.is_finite() && loss_kw >= 0.0) {
            return Err(SimError::invalid_input("battery.standby_loss_kw", "must be >= 0"));
        }
        self.standby_loss_kw = loss_kw;
        Ok(self)
    }

    /// Charges the battery with `power_kw` for `duration_h` hours.
    ///
    /// The stored energy is `power * duration * efficiency`, clamped so the
    /// state of charge never exceeds capacity. Returns the energy actually
    /// stored, which is less than requested when the battery fills up
    /// mid-interval. A full battery simply stores nothing.
    ///
    /// The charge power limit is not applied here; callers pass an already
    /// capped setpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] for negative or non-finite power or duration.
    pub fn charge(&mut self, power_kw: f64, duration_h: f64) -> Result<f64> {
        if !(power_kw.is_finite() && power_kw >= 0.0) {
            return Err(SimError::invalid_input(
                "charge.power_kw",
                format!("must be >= 0, got {power_kw}"),
            ));
        }
        if !(duration_h.is_finite() && duration_h >= 0.0) {
            return Err(SimError::invalid_input(
                "charge.duration_h",
                format!("must be >= 0, got {duration_h}"),
            ));
        }

        let requested_kwh = power_kw * duration_h * self.efficiency;
        let stored_kwh = requested_kwh.min(self.headroom_kwh());
        self.soc_kwh = (self.soc_kwh + stored_kwh).clamp(0.0, self.capacity_kwh);
        Ok(stored_kwh)
    }

    /// Drains the standby loss for `duration_h` hours and returns the energy lost.
    pub fn apply_standby_loss(&mut self, duration_h: f64) -> f64 {
        let lost = (self.standby_loss_kw * duration_h).min(self.soc_kwh).max(0.0);
        self.soc_kwh -= lost;
        lost
    }

    /// Current stored energy in kWh.
    pub fn state_of_charge(&self) -> f64 {
        self.soc_kwh
    }

    /// Usable capacity in kWh.
    pub fn capacity_kwh(&self) -> f64 {
        self.capacity_kwh
    }

    /// Charging efficiency.
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    /// Maximum accepted charge power in kW.
    pub fn max_charge_kw(&self) -> f64 {
        self.max_charge_kw
    }

    /// Energy that can still be stored before the battery is full (kWh).
    pub fn headroom_kwh(&self) -> f64 {
        (self.capacity_kwh - self.soc_kwh).max(0.0)
    }
}
