use rand::{Rng, SeedableRng, rngs::StdRng};

/// Synthetic non-EV site load: a daily sinusoid plus Gaussian noise.
///
/// Used to build demo schedules when no metered site load is supplied.
///
/// # Examples
///
/// ```
/// use ev_site_sim::devices::site_load::SiteLoad;
///
/// let mut load = SiteLoad::new(
///     40.0,  // base_kw
///     15.0,  // amp_kw
///     0.0,   // phase_rad
///     0.0,   // noise_std
///     48,    // steps_per_day
///     42,    // seed
/// );
/// assert!(load.demand_kw(24) >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct SiteLoad {
    /// Mean site demand in kilowatts
    pub base_kw: f64,

    /// Amplitude of the daily swing in kilowatts
    pub amp_kw: f64,

    /// Phase offset in radians
    pub phase_rad: f64,

    /// Standard deviation of the Gaussian noise in kilowatts
    pub noise_std: f64,

    /// Steps per simulated day
    pub steps_per_day: usize,

    rng: StdRng,
}

impl SiteLoad {
    /// Creates a new site load generator.
    ///
    /// # Arguments
    ///
    /// * `base_kw` - Mean demand in kilowatts
    /// * `amp_kw` - Daily amplitude in kilowatts
    /// * `phase_rad` - Phase offset in radians
    /// * `noise_std` - Noise standard deviation in kilowatts
    /// * `steps_per_day` - Steps per simulated day (clamped to at least 1)
    /// * `seed` - Random seed for reproducible noise
    pub fn new(
        base_kw: f64,
        amp_kw: f64,
        phase_rad: f64,
        noise_std: f64,
        steps_per_day: usize,
        seed: u64,
    ) -> Self {
        Self {
            base_kw,
            amp_kw,
            phase_rad,
            noise_std,
            steps_per_day: steps_per_day.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Site demand at `timestep` in kilowatts, never negative.
    ///
    /// The sinusoid peaks in the early afternoon when `phase_rad` is zero.
    pub fn demand_kw(&mut self, timestep: usize) -> f64 {
        let day_pos = (timestep % self.steps_per_day) as f64 / self.steps_per_day as f64;
        let angle = 2.0 * std::f64::consts::PI * (day_pos - 0.3) + self.phase_rad;
        let sinus = angle.sin();

        let noise = if self.noise_std > 0.0 {
            // Box-Muller
            let u1: f64 = self.rng.random::<f64>().clamp(1e-9, 1.0);
            let u2: f64 = self.rng.random::<f64>();
            let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            z0 * self.noise_std
        } else {
            0.0
        };

        (self.base_kw + self.amp_kw * sinus + noise).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_noise_is_pure_sinusoid() {
        let mut load = SiteLoad::new(10.0, 5.0, 0.0, 0.0, 24, 1);
        let values: Vec<f64> = (0..24).map(|t| load.demand_kw(t)).collect();
        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        assert!(max <= 15.0 + 1e-9);
        assert!(min >= 5.0 - 1e-9);
    }

    #[test]
    fn test_repeats_daily() {
        let mut load = SiteLoad::new(10.0, 5.0, 0.0, 0.0, 24, 1);
        assert!((load.demand_kw(3) - load.demand_kw(27)).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_noise() {
        let mut a = SiteLoad::new(10.0, 5.0, 0.0, 2.0, 24, 7);
        let mut b = SiteLoad::new(10.0, 5.0, 0.0, 2.0, 24, 7);
        for t in 0..48 {
            assert_eq!(a.demand_kw(t), b.demand_kw(t));
        }
    }

    #[test]
    fn test_never_negative() {
        let mut load = SiteLoad::new(0.5, 5.0, 0.0, 3.0, 24, 3);
        for t in 0..240 {
            assert!(load.demand_kw(t) >= 0.0);
        }
    }
}
