//! Human-readable run reports.

use std::fmt::Write;

use crate::sim::ev_system::RunOutcome;

/// Maximum number of unmet targets listed individually.
const MAX_UNMET_LISTED: usize = 10;

/// Full report of one run: KPIs, site impact and the worst unmet targets.
pub fn run_report(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Strategy:              {}", outcome.strategy);
    let _ = writeln!(out, "{}", outcome.kpi);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", outcome.site_impact);

    if !outcome.unmet_targets.is_empty() {
        let mut unmet: Vec<_> = outcome.unmet_targets.iter().collect();
        unmet.sort_by(|a, b| b.shortfall_kwh().total_cmp(&a.shortfall_kwh()));
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Unmet Targets ---");
        for u in unmet.iter().take(MAX_UNMET_LISTED) {
            let _ = writeln!(out, "{u}");
        }
        if unmet.len() > MAX_UNMET_LISTED {
            let _ = writeln!(out, "... and {} more", unmet.len() - MAX_UNMET_LISTED);
        }
    }
    out
}

/// Side-by-side comparison of several runs over the same inputs.
pub fn comparison_table(outcomes: &[RunOutcome]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Strategy Comparison ---");
    let _ = writeln!(
        out,
        "{:<20}{:>12}{:>10}{:>12}{:>12}{:>12}{:>8}{:>14}",
        "strategy",
        "energy kWh",
        "cost",
        "CO2 kg",
        "peak EV kW",
        "peak site",
        "viol.",
        "unmet (kWh)"
    );
    for o in outcomes {
        let k = &o.kpi;
        let _ = writeln!(
            out,
            "{:<20}{:>12.2}{:>10.2}{:>12.2}{:>12.2}{:>12.2}{:>8}{:>14}",
            o.strategy.label(),
            k.ev_energy_drawn_kwh,
            k.ev_cost,
            k.ev_emissions_kg,
            k.peak_ev_load_kw,
            k.peak_site_load_kw,
            k.limit_violation_count,
            format!("{} ({:.1})", k.unmet_targets, k.total_shortfall_kwh),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{ChargerSpec, VehicleSpec};
    use crate::sim::controller::Strategy;
    use crate::sim::ev_system::EvSystem;
    use crate::sim::schedule::{Schedule, ScheduleRow};
    use chrono::{NaiveDate, TimeDelta};

    fn system() -> EvSystem {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let rows = (0..4)
            .map(|i| ScheduleRow::new(start + TimeDelta::hours(i), 10.0, 0.2, 100.0, 0.0))
            .collect();
        EvSystem::new(
            Schedule::new(rows, TimeDelta::hours(1)).unwrap(),
            vec![VehicleSpec::new("EV_1", 40.0, 7.0, 0, 4).with_soc(0.25, 1.0)],
            vec![ChargerSpec::new("Charger_1", 7.0)],
            Strategy::Basic,
        )
        .unwrap()
    }

    #[test]
    fn report_lists_unmet_targets() {
        let outcome = system().run(4).unwrap();
        let report = run_report(&outcome);
        assert!(report.contains("Strategy:              basic"));
        assert!(report.contains("--- KPI Report ---"));
        assert!(report.contains("--- Site Impact ---"));
        assert!(report.contains("--- Unmet Targets ---"));
        assert!(report.contains("EV_1 departed at t=4"));
    }

    #[test]
    fn comparison_has_one_row_per_run() {
        let sys = system();
        let runs: Vec<RunOutcome> = Strategy::ALL
            .iter()
            .map(|&s| sys.with_strategy(s).run(4).unwrap())
            .collect();
        let table = comparison_table(&runs);
        // title + header + four strategies
        assert_eq!(table.lines().count(), 6);
        assert!(table.contains("cost_optimized"));
    }

    #[test]
    fn runs_without_shortfall_show_no_negative_zero() {
        let sys = EvSystem::new(
            system().schedule().clone(),
            vec![VehicleSpec::new("EV_1", 40.0, 7.0, 0, 4).with_soc(0.25, 0.5)],
            vec![ChargerSpec::new("Charger_1", 7.0)],
            Strategy::Basic,
        )
        .unwrap();
        let outcome = sys.run(4).unwrap();
        assert!(outcome.unmet_targets.is_empty());

        let table = comparison_table(std::slice::from_ref(&outcome));
        let row = table.lines().last().unwrap();
        assert!(row.ends_with("0 (0.0)"), "{row}");
        assert!(!table.contains("-0.0"));
        assert!(!run_report(&outcome).contains("-0.00"));
    }
}
