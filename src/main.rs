//! EV site simulator entry point: CLI wiring and config-driven system construction.

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ev_site_sim::cli::Cli;
use ev_site_sim::config::ScenarioConfig;
use ev_site_sim::io::export::{export_ledger_csv, export_steps_csv, export_vehicles_csv};
use ev_site_sim::io::import::{load_roster, load_schedule};
use ev_site_sim::reporting::{comparison_table, run_report};
use ev_site_sim::runner::{build_system, compare_strategies, demo_schedule, run_strategy};
use ev_site_sim::sim::ev_system::RunOutcome;

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads config: `--scenario` takes priority, then `--preset`, then baseline.
fn load_config(cli: &Cli) -> Result<ScenarioConfig> {
    let mut scenario = if let Some(path) = &cli.scenario {
        ScenarioConfig::from_toml_file(path)?
    } else if let Some(name) = &cli.preset {
        ScenarioConfig::from_preset(name)?
    } else {
        ScenarioConfig::baseline()
    };

    if let Some(seed) = cli.seed {
        scenario.simulation.seed = seed;
    }
    if let Some(strategy) = cli.strategy.and_then(|s| s.strategy()) {
        scenario.simulation.strategy = strategy;
    }
    Ok(scenario)
}

fn export(cli: &Cli, outcome: &RunOutcome) -> Result<()> {
    if let Some(path) = &cli.telemetry_out {
        export_steps_csv(&outcome.steps, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Telemetry written to {}", path.display());
    }
    if let Some(path) = &cli.ledger_out {
        export_ledger_csv(outcome.recorder.records(), path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Ledger written to {}", path.display());
    }
    if let Some(path) = &cli.vehicles_out {
        export_vehicles_csv(&outcome.vehicles, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Vehicle summaries written to {}", path.display());
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let scenario = load_config(cli)?;

    // Validate
    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let schedule = match &cli.schedule {
        Some(path) => load_schedule(path)
            .with_context(|| format!("failed to read schedule {}", path.display()))?,
        None => demo_schedule(&scenario)?,
    };
    let roster = match &cli.roster {
        Some(path) => Some(
            load_roster(path, &schedule)
                .with_context(|| format!("failed to read roster {}", path.display()))?,
        ),
        None => None,
    };
    let system = build_system(&scenario, Some(schedule), roster)?;

    let compare = cli.strategy.is_some_and(|s| s.strategy().is_none());
    let outcome = if compare {
        let mut runs = compare_strategies(&system)?;
        println!("{}", comparison_table(&runs));
        let configured = runs
            .iter()
            .position(|r| r.strategy == system.strategy())
            .unwrap_or(0);
        runs.swap_remove(configured)
    } else {
        run_strategy(&system, system.strategy())?
    };

    if cli.print_steps {
        for r in &outcome.steps {
            println!("{r}");
        }
    }

    println!("\n{}", run_report(&outcome));
    export(cli, &outcome)?;

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(ev_site_sim::api::AppState { outcome });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(ev_site_sim::api::serve(state, addr))
            .with_context(|| format!("API server on {addr} failed"))?;
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
