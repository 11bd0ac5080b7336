use std::process::Command;

#[derive(Debug)]
struct Kpis {
    ev_energy_kwh: f64,
    ev_cost: f64,
    limit_violations: f64,
}

#[test]
fn scenario_files_run_via_cli_and_produce_distinct_dynamics() {
    let baseline = parse_kpis(&run_ok(&["--scenario", "scenarios/baseline.toml"]));
    let pool = parse_kpis(&run_ok(&["--scenario", "scenarios/shared_pool.toml"]));
    let fast = parse_kpis(&run_ok(&["--scenario", "scenarios/fast_chargers.toml"]));

    assert!(
        (baseline.ev_energy_kwh - pool.ev_energy_kwh).abs() > 1.0,
        "expected baseline and shared_pool energy to differ: baseline={:.3}, shared_pool={:.3}",
        baseline.ev_energy_kwh,
        pool.ev_energy_kwh
    );
    assert!(
        (pool.ev_cost - fast.ev_cost).abs() > 0.01,
        "expected shared_pool and fast_chargers cost to differ: shared_pool={:.3}, fast_chargers={:.3}",
        pool.ev_cost,
        fast.ev_cost
    );
    assert_eq!(baseline.limit_violations, 0.0);
    assert_eq!(pool.limit_violations, 0.0);
}

#[test]
fn presets_run_via_cli() {
    for preset in ["baseline", "constrained", "annual"] {
        let stdout = run_ok(&["--preset", preset, "--quiet"]);
        let kpis = parse_kpis(&stdout);
        assert!(kpis.ev_energy_kwh > 0.0, "{preset} charged nothing");
        assert!(stdout.contains("--- Site Impact ---"));
    }
}

#[test]
fn strategy_all_prints_comparison() {
    let stdout = run_ok(&[
        "--scenario",
        "scenarios/shared_pool.toml",
        "--strategy",
        "all",
        "--quiet",
    ]);
    assert!(stdout.contains("--- Strategy Comparison ---"));
    for label in ["uncontrolled", "basic", "emission_optimized", "cost_optimized"] {
        assert!(
            stdout.lines().any(|l| l.starts_with(label)),
            "missing comparison row for {label}"
        );
    }
    // the detailed report follows the scenario's own strategy
    assert!(stdout.contains("Strategy:              cost_optimized"));
}

#[test]
fn exports_are_written() {
    let dir = std::env::temp_dir().join(format!("ev-site-sim-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let ledger = dir.join("ledger.csv");
    let steps = dir.join("steps.csv");
    let vehicles = dir.join("vehicles.csv");

    run_ok(&[
        "--scenario",
        "scenarios/fast_chargers.toml",
        "--quiet",
        "--ledger-out",
        ledger.to_str().unwrap(),
        "--telemetry-out",
        steps.to_str().unwrap(),
        "--vehicles-out",
        vehicles.to_str().unwrap(),
    ]);

    let ledger = std::fs::read_to_string(ledger).unwrap();
    assert!(ledger.starts_with("entity,id,timestep,timestamp,power_kw,soc_kwh,cost,emissions_g"));
    // two days of 15-minute steps
    let steps = std::fs::read_to_string(steps).unwrap();
    assert_eq!(steps.lines().count(), 1 + 2 * 96);
    let vehicles = std::fs::read_to_string(vehicles).unwrap();
    assert!(vehicles.lines().nth(1).is_some_and(|l| l.starts_with("EV_1_20240106,")));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn invalid_scenario_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_ev-site-sim"))
        .args(["--preset", "nonexistent"])
        .output()
        .expect("ev-site-sim process should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown preset"));
}

fn run_ok(args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_ev-site-sim"))
        .args(args)
        .output()
        .expect("ev-site-sim process should run");

    assert!(
        output.status.success(),
        "run failed for {args:?}: stderr={} ",
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8(output.stdout).expect("stdout should be valid UTF-8")
}

fn parse_kpis(stdout: &str) -> Kpis {
    Kpis {
        ev_energy_kwh: parse_metric(stdout, "Total EV energy:", "kWh"),
        ev_cost: parse_metric(stdout, "EV energy cost:", ""),
        limit_violations: parse_metric(stdout, "Limit violations:", ""),
    }
}

fn parse_metric(stdout: &str, label: &str, unit: &str) -> f64 {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with(label))
        .unwrap_or_else(|| panic!("missing KPI line `{label}` in output: {stdout}"));

    let raw = line
        .split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_else(|| panic!("invalid KPI format for line `{line}`"));

    let numeric = raw.strip_suffix(unit).unwrap_or(raw).trim();
    numeric
        .parse::<f64>()
        .unwrap_or_else(|_| panic!("failed parsing `{numeric}` from KPI line `{line}`"))
}
