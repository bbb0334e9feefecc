use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn nbodysim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nbodysim"))
}

#[test]
fn runs_a_few_host_steps() {
    let output = nbodysim()
        .args(["--device", "cpu", "-n", "50", "--seed", "3", "--steps", "3"])
        .output()
        .expect("Failed to execute nbodysim");

    assert!(
        output.status.success(),
        "nbodysim exited with error: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[cfg(unix)]
#[test]
fn interrupt_ends_an_unbounded_run_cleanly() {
    use std::io::{BufRead, BufReader};
    use std::process::Stdio;
    use std::time::Duration;

    let mut child = nbodysim()
        .args(["--device", "cpu", "-n", "20", "--seed", "1"])
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn nbodysim");
    let mut lines = BufReader::new(child.stdout.take().expect("stdout is piped")).lines();

    let mut steps = 0;
    while steps < 3 {
        let line = lines
            .next()
            .expect("run ended before being interrupted")
            .expect("Failed to read stdout");
        if line.contains("Calc time") {
            steps += 1;
        }
    }
    std::thread::sleep(Duration::from_millis(200));

    let kill = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(kill.success());

    let rest: Vec<String> = lines.map_while(Result::ok).collect();
    let status = child.wait().expect("Failed to wait for nbodysim");
    assert!(status.success(), "interrupted run should exit cleanly");
    assert!(
        rest.iter().any(|line| line.contains("run finished")),
        "Missing final run summary"
    );
}

#[test]
fn help_lists_backends() {
    let output = nbodysim()
        .arg("--help")
        .output()
        .expect("Failed to execute nbodysim");

    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    assert!(help.contains("--device"), "Missing --device flag");
    assert!(help.contains("--benchmark"), "Missing --benchmark flag");
    assert!(help.contains("cpugpu"), "Missing backend choices");
}

#[test]
fn rejects_unknown_device() {
    let output = nbodysim()
        .args(["--device", "tpu", "--steps", "1"])
        .output()
        .expect("Failed to execute nbodysim");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("tpu"), "Error should name the bad value");
}

#[test]
fn reports_missing_config_file() {
    let output = nbodysim()
        .args(["--config", "/definitely/not/here.yaml", "--steps", "1"])
        .output()
        .expect("Failed to execute nbodysim");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load run configuration"));
}

#[test]
fn host_benchmark_writes_csv_log() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = dir.path().join("bench.yaml");
    fs::write(
        &config_path,
        "benchmark:\n  body_counts: [0, 4, 16]\n  short_sweep_len: 2\n  warmup_steps: 3\n  measured_steps: 2\n  floor_seconds: 0.0\ndataset:\n  seed: 11\n",
    )
    .expect("Failed to write config");
    let log_dir = dir.path().join("benchmarks");

    let output = nbodysim()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "--device",
            "cpu",
            "--benchmark",
            "short",
            "--output",
            log_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute nbodysim");
    assert!(
        output.status.success(),
        "nbodysim exited with error: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let logs: Vec<_> = fs::read_dir(&log_dir)
        .expect("Log directory was not created")
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1, "Expected exactly one CSV log");

    let csv = fs::read_to_string(&logs[0]).expect("Failed to read log");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4, "description, header and two rows");
    assert!(lines[0].contains("CPU ("), "Description should name the CPU");
    assert_eq!(
        lines[1],
        "nbody,calc_min,calc_max,calc_avg,fps_min,fps_max,fps_avg"
    );
    assert!(lines[2].starts_with("9,"));
    assert!(lines[3].starts_with("13,"));
    for row in &lines[2..] {
        let fields: Vec<f64> = row.split(',').map(|f| f.parse().unwrap()).collect();
        assert_eq!(fields.len(), 7);
        assert!(fields[1] <= fields[3] && fields[3] <= fields[2]);
    }
}
