//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::sim::controller::Strategy;

/// Strategy selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Uncontrolled,
    Basic,
    Emission,
    Cost,
    /// Run every strategy and print a comparison.
    All,
}

impl StrategyArg {
    /// The single strategy selected, or `None` for `all`.
    pub fn strategy(self) -> Option<Strategy> {
        match self {
            StrategyArg::Uncontrolled => Some(Strategy::Uncontrolled),
            StrategyArg::Basic => Some(Strategy::Basic),
            StrategyArg::Emission => Some(Strategy::EmissionOptimized),
            StrategyArg::Cost => Some(Strategy::CostOptimized),
            StrategyArg::All => None,
        }
    }
}

/// EV fleet charging simulator for a single site under a demand limit.
#[derive(Debug, Parser)]
#[command(name = "ev-site-sim", version)]
pub struct Cli {
    /// Load scenario from a TOML config file
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (baseline, constrained, annual)
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Read the schedule from CSV instead of generating one
    #[arg(long, value_name = "PATH")]
    pub schedule: Option<PathBuf>,

    /// Read the vehicle roster from CSV instead of generating a fleet
    #[arg(long, value_name = "PATH")]
    pub roster: Option<PathBuf>,

    /// Override the scenario's charging strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Override random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Export per-step site results to CSV
    #[arg(long, value_name = "PATH")]
    pub telemetry_out: Option<PathBuf>,

    /// Export the per-entity ledger to CSV
    #[arg(long, value_name = "PATH")]
    pub ledger_out: Option<PathBuf>,

    /// Export per-vehicle summaries to CSV
    #[arg(long, value_name = "PATH")]
    pub vehicles_out: Option<PathBuf>,

    /// Print one line per simulated step
    #[arg(long)]
    pub print_steps: bool,

    /// Only log warnings and errors
    #[arg(long, short)]
    pub quiet: bool,

    /// Start REST API server after simulation
    #[cfg(feature = "api")]
    #[arg(long)]
    pub serve: bool,

    /// API server port
    #[cfg(feature = "api")]
    #[arg(long, default_value_t = 3000)]
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supports_scenario_cli() {
        let cli = Cli::try_parse_from(["ev-site-sim", "--scenario", "scenario.toml"]).unwrap();
        assert_eq!(
            cli.scenario.as_deref().and_then(|p| p.to_str()),
            Some("scenario.toml")
        );
        assert!(cli.preset.is_none());
    }

    #[test]
    fn supports_preset_and_overrides() {
        let cli = Cli::try_parse_from([
            "ev-site-sim",
            "--preset",
            "constrained",
            "--strategy",
            "emission",
            "--seed",
            "7",
            "--quiet",
        ])
        .unwrap();
        assert_eq!(cli.preset.as_deref(), Some("constrained"));
        assert_eq!(cli.strategy, Some(StrategyArg::Emission));
        assert_eq!(cli.seed, Some(7));
        assert!(cli.quiet);
    }

    #[test]
    fn scenario_and_preset_are_exclusive() {
        let res = Cli::try_parse_from([
            "ev-site-sim",
            "--scenario",
            "a.toml",
            "--preset",
            "baseline",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["ev-site-sim", "--strategy", "cheapest"]).is_err());
    }

    #[test]
    fn all_maps_to_no_single_strategy() {
        assert_eq!(StrategyArg::All.strategy(), None);
        assert_eq!(StrategyArg::Cost.strategy(), Some(Strategy::CostOptimized));
    }
}
