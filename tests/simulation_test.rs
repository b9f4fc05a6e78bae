use std::process::{Command, Output};

fn run_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_route_learning_sim"))
        .args(args)
        .env("RUST_LOG", "warn,route_learning_sim=info")
        .output()
        .expect("Failed to execute simulation")
}

fn stat_value(stderr: &str, key: &str) -> f64 {
    let line = stderr
        .lines()
        .find(|line| line.contains(key))
        .unwrap_or_else(|| panic!("Could not find '{}' line", key));

    // Format: "[2026-01-01T00:00:00Z INFO route_learning_sim::simulation::stats] Completion rate: 100.0%"
    let parts: Vec<&str> = line.split(key).collect();
    let value = parts
        .get(1)
        .map(|s| s.trim().trim_end_matches('%'))
        .unwrap_or_else(|| panic!("Could not parse value from line: {}", line));
    value
        .trim()
        .parse()
        .unwrap_or_else(|_| panic!("Could not parse '{}' as number", value))
}

/// Test that the default experiment runs to completion
#[test]
fn test_default_experiment_runs() {
    let output = run_sim(&["--rounds", "2"]);

    assert!(
        output.status.success(),
        "Simulation failed to run. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
    assert!(stderr.contains("Round 0:"), "Missing round 0 summary");
    assert!(stderr.contains("Round 1:"), "Missing round 1 summary");
}

/// Test that simulation statistics are logged
#[test]
fn test_simulation_statistics_logged() {
    let output = run_sim(&["--rounds", "1"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    for key in [
        "Total vehicles spawned:",
        "Total vehicles completed:",
        "Active vehicles:",
        "Total roads:",
        "Completion rate:",
    ] {
        assert!(stderr.contains(key), "Missing '{}' statistic", key);
    }
}

/// Every released vehicle of the default scenario finishes its trip
#[test]
fn test_all_vehicles_complete() {
    let output = run_sim(&["--rounds", "1", "--seed", "7"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let spawned = stat_value(&stderr, "Total vehicles spawned:");
    let completed = stat_value(&stderr, "Total vehicles completed:");
    let rate = stat_value(&stderr, "Completion rate:");

    assert_eq!(spawned, 10.0);
    assert_eq!(completed, spawned);
    assert!((rate - 100.0).abs() < 1e-9, "Completion rate was {}%", rate);
}

#[test]
fn test_non_positive_delta_rejected() {
    let output = run_sim(&["--delta", "0"]);
    assert!(!output.status.success(), "A zero time step should be rejected");
}

#[test]
fn test_missing_scenario_file_rejected() {
    let output = run_sim(&["--scenario", "/nonexistent/scenario.json"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read scenario"), "stderr: {}", stderr);
}

/// A scenario file is honoured and the report lists one learner per vehicle
#[test]
fn test_scenario_file_and_report_output() {
    let dir = std::env::temp_dir().join(format!("route_learning_sim_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    let scenario_path = dir.join("scenario.json");
    let report_path = dir.join("report.json");

    let scenario = r#"{
        "roads": [
            { "start": [0, 0], "end": [100, 0], "stop_distance": 30, "wait_time": 1 },
            { "start": [100, 0], "end": [200, 0], "slow_factor": 0.5 },
            { "start": [100, 0], "end": [200, 50] }
        ],
        "connections": [[0, 1], [0, 2]],
        "origins": [0],
        "destinations": [1, 2],
        "generator": { "vehicle_rate": 30, "vehicle_limit": 4 }
    }"#;
    std::fs::write(&scenario_path, scenario).expect("Failed to write scenario");

    let output = run_sim(&[
        "--rounds",
        "2",
        "--scenario",
        scenario_path.to_str().unwrap(),
        "--output",
        report_path.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "Simulation failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["routes"].as_array().unwrap().len(), 2);
    assert_eq!(report["rounds"].as_array().unwrap().len(), 2);

    let learners = report["learners"].as_array().unwrap();
    assert_eq!(learners.len(), 4);
    for learner in learners {
        let total: f64 = learner["probabilities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p.as_f64().unwrap())
            .sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    // Two rounds of four vehicles each
    assert_eq!(report["records"].as_array().unwrap().len(), 8);

    let _ = std::fs::remove_dir_all(&dir);
}
