//! Per-step charging power allocation under the site demand limit.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::schedule::{Schedule, ScheduleRow};

/// Slack used when comparing summed power against headroom.
const POWER_EPS_KW: f64 = 1e-9;

/// Charging control strategy, fixed for the lifetime of an [`EvSystem`](super::ev_system::EvSystem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Every vehicle charges at its full permissible rate; the demand limit is ignored.
    Uncontrolled,
    /// Feasibility only: fill headroom greedily in arrival order.
    #[default]
    Basic,
    /// Under contention, shift charging towards low emission-factor intervals.
    EmissionOptimized,
    /// Under contention, shift charging towards low-price intervals.
    CostOptimized,
}

impl Strategy {
    /// All strategies, baseline first.
    pub const ALL: [Strategy; 4] = [
        Strategy::Uncontrolled,
        Strategy::Basic,
        Strategy::EmissionOptimized,
        Strategy::CostOptimized,
    ];

    /// Short name used in reports and file names.
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Uncontrolled => "uncontrolled",
            Strategy::Basic => "basic",
            Strategy::EmissionOptimized => "emission_optimized",
            Strategy::CostOptimized => "cost_optimized",
        }
    }

    /// Whether allocations are held within the site demand limit.
    pub fn respects_demand_limit(self) -> bool {
        !matches!(self, Strategy::Uncontrolled)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One connected (charger, vehicle) pair asking for power this step.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub charger_id: String,
    pub vehicle_id: String,
    /// min(charger rating, vehicle max charge rate) in kW.
    pub rate_limit_kw: f64,
    /// Stored energy still missing to reach the target (kWh).
    pub need_kwh: f64,
    /// Charging efficiency of the vehicle.
    pub efficiency: f64,
    pub arrival: usize,
    pub departure: usize,
}

impl ChargeRequest {
    /// Highest power this request may draw for one step of `dt_hours`.
    pub fn cap_kw(&self, dt_hours: f64) -> f64 {
        if dt_hours <= 0.0 || self.need_kwh <= 0.0 {
            return 0.0;
        }
        self.rate_limit_kw
            .min(self.need_kwh / (self.efficiency * dt_hours))
            .max(0.0)
    }
}

/// Power assigned to one charger for the current step.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub charger_id: String,
    pub vehicle_id: String,
    pub power_kw: f64,
}

/// Computes per-charger allocations for a single timestep.
#[derive(Debug, Clone, Copy, Default)]
pub struct Controller {
    strategy: Strategy,
}

impl Controller {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Allocates power to every request at `timestep`.
    ///
    /// The result has one entry per request, in request order. For every
    /// strategy but [`Strategy::Uncontrolled`], the summed allocation never
    /// exceeds the row's headroom (limit minus non-EV load). Each allocation
    /// is bounded by [`ChargeRequest::cap_kw`].
    ///
    /// # Arguments
    ///
    /// * `timestep` - Current step, which must be covered by `schedule`
    /// * `schedule` - Full schedule, used for look-ahead by the optimizing strategies
    /// * `requests` - Connected pairs with their current need
    pub fn allocate(
        &self,
        timestep: usize,
        schedule: &Schedule,
        requests: &[ChargeRequest],
    ) -> Vec<Allocation> {
        let dt = schedule.dt_hours();
        let caps: Vec<f64> = requests.iter().map(|r| r.cap_kw(dt)).collect();
        let headroom = schedule.row(timestep).map_or(0.0, |r| r.headroom_kw());

        let powers = match self.strategy {
            Strategy::Uncontrolled => caps,
            _ if caps.iter().sum::<f64>() <= headroom + POWER_EPS_KW => caps,
            Strategy::Basic => greedy_fill(requests, &caps, headroom),
            Strategy::EmissionOptimized => {
                look_ahead(timestep, schedule, requests, |row| {
                    row.emission_factor_g_per_kwh
                })
            }
            Strategy::CostOptimized => {
                look_ahead(timestep, schedule, requests, |row| row.price_per_kwh)
            }
        };

        requests
            .iter()
            .zip(powers)
            .map(|(r, power_kw)| Allocation {
                charger_id: r.charger_id.clone(),
                vehicle_id: r.vehicle_id.clone(),
                power_kw,
            })
            .collect()
    }
}

/// Serves requests at full cap in (arrival, vehicle id) order until headroom runs out.
fn greedy_fill(requests: &[ChargeRequest], caps: &[f64], headroom_kw: f64) -> Vec<f64> {
    let mut order: Vec<usize> = (0..requests.len()).collect();
    order.sort_by(|&a, &b| {
        requests[a]
            .arrival
            .cmp(&requests[b].arrival)
            .then_with(|| requests[a].vehicle_id.cmp(&requests[b].vehicle_id))
    });

    let mut remaining = headroom_kw.max(0.0);
    let mut powers = vec![0.0; requests.len()];
    for i in order {
        let p = caps[i].min(remaining);
        powers[i] = p;
        remaining -= p;
        if remaining <= POWER_EPS_KW {
            break;
        }
    }
    powers
}

/// A (vehicle, interval) slot the look-ahead can fill.
struct Candidate {
    request: usize,
    timestep: usize,
    metric: f64,
}

/// Plans every connected vehicle over the rest of its window and returns the
/// current step's share of that plan.
///
/// Slots are filled in ascending `metric` order, ties broken by earliest
/// departure, then vehicle id, then earlier interval. Each interval's headroom
/// and each vehicle's remaining need are consumed as slots are filled, so
/// the demand limit holds at every interval the plan touches. The plan is
/// rebuilt from scratch every step.
fn look_ahead(
    timestep: usize,
    schedule: &Schedule,
    requests: &[ChargeRequest],
    metric: impl Fn(&ScheduleRow) -> f64,
) -> Vec<f64> {
    let dt = schedule.dt_hours();
    let horizon_end = requests
        .iter()
        .map(|r| r.departure.min(schedule.len()))
        .max()
        .unwrap_or(timestep)
        .max(timestep + 1);

    let mut headroom: Vec<f64> = (timestep..horizon_end)
        .map(|tau| schedule.row(tau).map_or(0.0, |r| r.headroom_kw()))
        .collect();

    let mut candidates = Vec::new();
    for (i, r) in requests.iter().enumerate() {
        for tau in timestep..r.departure.min(schedule.len()) {
            if let Some(row) = schedule.row(tau) {
                candidates.push(Candidate {
                    request: i,
                    timestep: tau,
                    metric: metric(row),
                });
            }
        }
    }
    candidates.sort_by(|a, b| {
        let ra = &requests[a.request];
        let rb = &requests[b.request];
        a.metric
            .total_cmp(&b.metric)
            .then_with(|| ra.departure.cmp(&rb.departure))
            .then_with(|| ra.vehicle_id.cmp(&rb.vehicle_id))
            .then_with(|| a.timestep.cmp(&b.timestep))
    });

    let mut need: Vec<f64> = requests.iter().map(|r| r.need_kwh.max(0.0)).collect();
    let mut powers = vec![0.0; requests.len()];

    for c in candidates {
        let r = &requests[c.request];
        let slot = c.timestep - timestep;
        if need[c.request] <= 0.0 || headroom[slot] <= POWER_EPS_KW {
            continue;
        }
        let p = r
            .rate_limit_kw
            .min(headroom[slot])
            .min(need[c.request] / (r.efficiency * dt))
            .max(0.0);
        if p <= 0.0 {
            continue;
        }
        headroom[slot] -= p;
        need[c.request] -= p * r.efficiency * dt;
        if c.timestep == timestep {
            powers[c.request] = p;
        }
    }
    powers
}
