#![cfg(unix)]

mod common;

use common::{quiet_config, sh_action, write_fake_driver};
use forgeflow_core::{Action, ActionExecutor, DistributedExecutor, ExecutorConfig};

fn remote(mut action: Action) -> Action {
    action.can_execute_remotely = true;
    action
}

fn driver_config(driver: std::path::PathBuf) -> ExecutorConfig {
    ExecutorConfig {
        driver_path: Some(driver),
        poll_interval_ms: 10,
        ..quiet_config(2)
    }
}

#[tokio::test]
async fn waves_follow_dependency_layers() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("driver.log");
    let driver = write_fake_driver(dir.path(), &log, 0);

    // B depends on A, so they must land in separate wave scripts, A first.
    let actions = vec![
        remote(sh_action(dir.path(), "touch a.done", &["a.o"], &[])),
        remote(sh_action(dir.path(), "touch b.done", &["b.o"], &["a.o"])),
    ];

    let exec = DistributedExecutor::new(driver_config(driver)).unwrap();
    let success = exec.execute(&actions).await.unwrap();
    assert!(success);

    let received = std::fs::read_to_string(&log).unwrap();
    let a_pos = received.find("touch a.done").expect("first wave present");
    let b_pos = received.find("touch b.done").expect("second wave present");
    assert!(a_pos < b_pos);
}

#[tokio::test]
async fn failed_wave_fails_every_claimed_action_and_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("driver.log");
    let driver = write_fake_driver(dir.path(), &log, 1);

    let actions = vec![
        remote(sh_action(dir.path(), "touch a.done", &["a.o"], &[])),
        remote(sh_action(dir.path(), "touch b.done", &["b.o"], &["a.o"])),
        remote(sh_action(dir.path(), "touch c.done", &["c.o"], &["a.o"])),
    ];

    let exec = DistributedExecutor::new(driver_config(driver)).unwrap();
    let success = exec.execute(&actions).await.unwrap();
    assert!(!success);

    // Dependents of the failed wave are never handed to the driver.
    let received = std::fs::read_to_string(&log).unwrap();
    assert!(received.contains("touch a.done"));
    assert!(!received.contains("touch b.done"));
    assert!(!received.contains("touch c.done"));
}

#[tokio::test]
async fn ineligible_actions_run_through_the_local_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("driver.log");
    let driver = write_fake_driver(dir.path(), &log, 0);

    // remote_eligible is false by default, so the driver is never invoked
    // and the commands actually run.
    let actions = vec![
        sh_action(dir.path(), "touch x.done", &["x.o"], &[]),
        sh_action(dir.path(), "test -f x.done && touch y.done", &[], &["x.o"]),
    ];

    let exec = DistributedExecutor::new(driver_config(driver)).unwrap();
    let success = exec.execute(&actions).await.unwrap();
    assert!(success);

    assert!(dir.path().join("x.done").is_file());
    assert!(dir.path().join("y.done").is_file());
    assert!(!log.exists(), "driver ran for an empty wave");
}

#[tokio::test]
async fn mixed_wave_runs_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("driver.log");
    let driver = write_fake_driver(dir.path(), &log, 0);

    let actions = vec![
        remote(sh_action(dir.path(), "touch far.done", &[], &[])),
        sh_action(dir.path(), "touch near.done", &[], &[]),
    ];

    let exec = DistributedExecutor::new(driver_config(driver)).unwrap();
    let success = exec.execute(&actions).await.unwrap();
    assert!(success);

    let received = std::fs::read_to_string(&log).unwrap();
    assert!(received.contains("touch far.done"));
    assert!(dir.path().join("near.done").is_file());
}

#[test]
fn missing_driver_is_reported_up_front() {
    let cfg = ExecutorConfig {
        driver_path: Some("/no/such/forgeflow-dist".into()),
        ..quiet_config(2)
    };
    assert!(!DistributedExecutor::is_available(&cfg));
    assert!(DistributedExecutor::new(cfg).is_err());
}
