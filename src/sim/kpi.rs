//! Post-hoc KPI computation from simulation results.

use std::fmt;

use serde::Serialize;

use super::types::{StepResult, UnmetTarget, VehicleSummary};

/// Share of the highest demand intervals averaged for the peak-demand figure.
pub const TOP_DEMAND_FRACTION: f64 = 0.01;

/// Aggregate EV charging indicators of a complete run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    /// Grid energy drawn by all chargers (kWh).
    pub ev_energy_drawn_kwh: f64,
    /// Energy stored in vehicle batteries (kWh).
    pub ev_energy_stored_kwh: f64,
    /// Cost of EV grid energy.
    pub ev_cost: f64,
    /// Emissions of EV grid energy (kgCO2).
    pub ev_emissions_kg: f64,
    /// Highest EV load in any step (kW).
    pub peak_ev_load_kw: f64,
    /// Highest total site load in any step (kW).
    pub peak_site_load_kw: f64,
    /// Steps where site load exceeded the demand limit.
    pub limit_violation_count: usize,
    pub vehicles: usize,
    pub vehicles_target_met: usize,
    pub unmet_targets: usize,
    /// Summed shortfall of all unmet targets (kWh).
    pub total_shortfall_kwh: f64,
}

impl KpiReport {
    /// Computes the report from step results and per-vehicle summaries.
    ///
    /// # Arguments
    ///
    /// * `results` - Committed step results
    /// * `vehicles` - Per-vehicle summaries
    /// * `unmet` - Unmet-target records
    /// * `dt_hours` - Timestep duration in hours
    pub fn from_results(
        results: &[StepResult],
        vehicles: &[VehicleSummary],
        unmet: &[UnmetTarget],
        dt_hours: f64,
    ) -> Self {
        let mut ev_kwh = 0.0;
        let mut ev_cost = 0.0;
        let mut ev_emissions_g = 0.0;
        let mut peak_ev = 0.0_f64;
        let mut peak_site = 0.0_f64;
        let mut violations = 0;

        for r in results {
            ev_kwh += r.ev_load_kw * dt_hours;
            ev_cost += r.ev_cost;
            ev_emissions_g += r.ev_emissions_g;
            peak_ev = peak_ev.max(r.ev_load_kw);
            peak_site = peak_site.max(r.site_load_kw);
            if !r.within_demand_limit {
                violations += 1;
            }
        }

        Self {
            ev_energy_drawn_kwh: ev_kwh,
            ev_energy_stored_kwh: vehicles
                .iter()
                .fold(0.0, |acc, v| acc + v.energy_delivered_kwh),
            ev_cost,
            ev_emissions_kg: ev_emissions_g / 1_000.0,
            peak_ev_load_kw: peak_ev,
            peak_site_load_kw: peak_site,
            limit_violation_count: violations,
            vehicles: vehicles.len(),
            vehicles_target_met: vehicles.iter().filter(|v| v.target_met).count(),
            unmet_targets: unmet.len(),
            // fold from +0.0: an empty f64 sum is -0.0
            total_shortfall_kwh: unmet.iter().fold(0.0, |acc, u| acc + u.shortfall_kwh()),
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Total EV energy:       {:.2} kWh", self.ev_energy_drawn_kwh)?;
        writeln!(f, "Energy stored:         {:.2} kWh", self.ev_energy_stored_kwh)?;
        writeln!(f, "EV energy cost:        {:.2}", self.ev_cost)?;
        writeln!(f, "EV emissions:          {:.2} kgCO2", self.ev_emissions_kg)?;
        writeln!(f, "Peak EV load:          {:.2} kW", self.peak_ev_load_kw)?;
        writeln!(f, "Peak site load:        {:.2} kW", self.peak_site_load_kw)?;
        writeln!(f, "Limit violations:      {}", self.limit_violation_count)?;
        writeln!(
            f,
            "Targets met:           {}/{}",
            self.vehicles_target_met, self.vehicles
        )?;
        write!(
            f,
            "Unmet targets:         {} ({:.2} kWh short)",
            self.unmet_targets, self.total_shortfall_kwh
        )
    }
}

/// How the chargers change the site's consumption, peak demand, carbon and cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteImpact {
    pub consumption_without_kwh: f64,
    pub consumption_with_kwh: f64,
    pub consumption_increase_kwh: f64,
    /// Mean of the top 1 % site demand intervals without EV load (kW).
    pub top_demand_without_kw: f64,
    /// Mean of the top 1 % site demand intervals with EV load (kW).
    pub top_demand_with_kw: f64,
    pub carbon_without_t: f64,
    pub carbon_with_t: f64,
    pub cost_without: f64,
    pub cost_with: f64,
    pub cost_increase: f64,
    pub charger_capital_cost: f64,
    pub charger_annual_maintenance: f64,
}

impl SiteImpact {
    /// Compares the site with and without its EV load.
    ///
    /// # Arguments
    ///
    /// * `results` - Committed step results
    /// * `dt_hours` - Timestep duration in hours
    /// * `capital_cost` - Installed charger capital cost
    /// * `annual_maintenance` - Charger maintenance per year
    pub fn from_results(
        results: &[StepResult],
        dt_hours: f64,
        capital_cost: f64,
        annual_maintenance: f64,
    ) -> Self {
        let mut kwh_without = 0.0;
        let mut kwh_with = 0.0;
        let mut g_without = 0.0;
        let mut g_with = 0.0;
        let mut cost_without = 0.0;
        let mut cost_with = 0.0;

        for r in results {
            let base = r.other_site_load_kw * dt_hours;
            let total = r.site_load_kw * dt_hours;
            kwh_without += base;
            kwh_with += total;
            g_without += base * r.emission_factor_g_per_kwh;
            g_with += total * r.emission_factor_g_per_kwh;
            cost_without += base * r.price_per_kwh;
            cost_with += total * r.price_per_kwh;
        }

        let without: Vec<f64> = results.iter().map(|r| r.other_site_load_kw).collect();
        let with: Vec<f64> = results.iter().map(|r| r.site_load_kw).collect();

        Self {
            consumption_without_kwh: kwh_without,
            consumption_with_kwh: kwh_with,
            consumption_increase_kwh: kwh_with - kwh_without,
            top_demand_without_kw: top_mean(&without, TOP_DEMAND_FRACTION),
            top_demand_with_kw: top_mean(&with, TOP_DEMAND_FRACTION),
            carbon_without_t: g_without / 1e6,
            carbon_with_t: g_with / 1e6,
            cost_without,
            cost_with,
            cost_increase: cost_with - cost_without,
            charger_capital_cost: capital_cost,
            charger_annual_maintenance: annual_maintenance,
        }
    }
}

/// Mean of the largest `fraction` of `values` (at least one value).
pub fn top_mean(values: &[f64], fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let n = ((values.len() as f64 * fraction - 1e-9).ceil() as usize).clamp(1, values.len());
    sorted[..n].iter().sum::<f64>() / n as f64
}

impl fmt::Display for SiteImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Site Impact ---")?;
        writeln!(f, "{:<28}{:>14}{:>14}{:>14}", "", "without EVs", "with EVs", "difference")?;
        writeln!(
            f,
            "{:<28}{:>14.2}{:>14.2}{:>14.2}",
            "Consumption (kWh)",
            self.consumption_without_kwh,
            self.consumption_with_kwh,
            self.consumption_increase_kwh
        )?;
        writeln!(
            f,
            "{:<28}{:>14.2}{:>14.2}{:>14.2}",
            "Top 1% mean demand (kW)",
            self.top_demand_without_kw,
            self.top_demand_with_kw,
            self.top_demand_with_kw - self.top_demand_without_kw
        )?;
        writeln!(
            f,
            "{:<28}{:>14.4}{:>14.4}{:>14.4}",
            "Carbon (t)",
            self.carbon_without_t,
            self.carbon_with_t,
            self.carbon_with_t - self.carbon_without_t
        )?;
        writeln!(
            f,
            "{:<28}{:>14.2}{:>14.2}{:>14.2}",
            "Energy cost", self.cost_without, self.cost_with, self.cost_increase
        )?;
        writeln!(f, "Charger capital cost:       {:.2}", self.charger_capital_cost)?;
        write!(
            f,
            "Charger maintenance / year: {:.2}",
            self.charger_annual_maintenance
        )
    }
}
