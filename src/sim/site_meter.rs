/// Site connection meter that sums EV and non-EV load for one step.
///
/// Load convention: all contributions are positive consumption.
#[derive(Debug, Clone)]
pub struct SiteMeter {
    demand_limit_kw: f64,
    other_load_kw: f64,
    ev_load_kw: f64,
}

/// Tolerance on the demand limit check, absorbing float rounding in allocation sums.
const LIMIT_EPS_KW: f64 = 1e-6;

impl SiteMeter {
    /// Creates a meter with no limit.
    pub fn new() -> Self {
        Self {
            demand_limit_kw: f64::INFINITY,
            other_load_kw: 0.0,
            ev_load_kw: 0.0,
        }
    }

    /// Starts a new step with the given limit and non-EV load.
    pub fn reset(&mut self, demand_limit_kw: f64, other_load_kw: f64) {
        self.demand_limit_kw = demand_limit_kw;
        self.other_load_kw = other_load_kw;
        self.ev_load_kw = 0.0;
    }

    /// Adds one charger's draw.
    pub fn add_ev_kw(&mut self, kw: f64) {
        self.ev_load_kw += kw;
    }

    pub fn ev_load_kw(&self) -> f64 {
        self.ev_load_kw
    }

    pub fn other_load_kw(&self) -> f64 {
        self.other_load_kw
    }

    pub fn demand_limit_kw(&self) -> f64 {
        self.demand_limit_kw
    }

    /// EV plus non-EV load.
    pub fn total_kw(&self) -> f64 {
        self.ev_load_kw + self.other_load_kw
    }

    /// Returns `true` when total load is within the demand limit.
    ///
    /// A step whose non-EV load alone exceeds the limit passes as long as no
    /// EV load was added on top of it.
    pub fn within_limit(&self) -> bool {
        self.total_kw() <= self.demand_limit_kw + LIMIT_EPS_KW || self.ev_load_kw <= 0.0
    }
}

impl Default for SiteMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_meter_has_no_limit() {
        let mut meter = SiteMeter::new();
        meter.add_ev_kw(1e6);
        assert!(meter.within_limit());
    }

    #[test]
    fn test_aggregate_ev_load() {
        let mut meter = SiteMeter::new();
        meter.reset(10.0, 2.0);
        meter.add_ev_kw(3.5);
        meter.add_ev_kw(1.5);
        assert!((meter.ev_load_kw() - 5.0).abs() < 1e-12);
        assert!((meter.total_kw() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_clears_ev_load() {
        let mut meter = SiteMeter::new();
        meter.reset(10.0, 2.0);
        meter.add_ev_kw(4.0);
        meter.reset(8.0, 1.0);
        assert_eq!(meter.ev_load_kw(), 0.0);
        assert_eq!(meter.demand_limit_kw(), 8.0);
    }

    #[test]
    fn test_within_limit() {
        let mut meter = SiteMeter::new();
        meter.reset(10.0, 3.0);
        meter.add_ev_kw(7.0);
        assert!(meter.within_limit());
        meter.add_ev_kw(0.5);
        assert!(!meter.within_limit());
    }

    #[test]
    fn test_other_load_over_limit_without_ev_passes() {
        let mut meter = SiteMeter::new();
        meter.reset(10.0, 12.0);
        assert!(meter.within_limit());
        meter.add_ev_kw(1.0);
        assert!(!meter.within_limit());
    }
}
