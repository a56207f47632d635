#![cfg(unix)]

mod common;

use common::{quiet_config, sh_action};
use forgeflow_core::{ExecutorConfig, LocalExecutor};

/// A (no deps), B->A, C->A, D->{B,C}, E (no deps), cap 2.
#[tokio::test]
async fn diamond_runs_in_dependency_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    // Each dependent proves its prerequisites finished first by testing
    // for their marker files.
    let actions = vec![
        sh_action(path, "touch a.done", &["a.o"], &[]),
        sh_action(path, "test -f a.done && touch b.done", &["b.o"], &["a.o"]),
        sh_action(path, "test -f a.done && touch c.done", &["c.o"], &["a.o"]),
        sh_action(
            path,
            "test -f b.done && test -f c.done && touch d.done",
            &["d.bin"],
            &["b.o", "c.o"],
        ),
        sh_action(path, "touch e.done", &["e.o"], &[]),
    ];

    let (success, summary) = LocalExecutor::new(quiet_config(2))
        .execute_with_summary(&actions)
        .await
        .unwrap();

    assert!(success);
    assert_eq!(summary.executed, 5);
    assert_eq!(summary.failed, 0);
    assert!(summary.peak_concurrency <= 2);
    for marker in ["a.done", "b.done", "c.done", "d.done", "e.done"] {
        assert!(path.join(marker).is_file(), "{marker} missing");
    }
}

#[tokio::test]
async fn failed_action_skips_dependents_but_not_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let actions = vec![
        sh_action(path, "touch a.done", &["a.o"], &[]),
        sh_action(path, "exit 1", &["b.o"], &["a.o"]),
        sh_action(path, "test -f a.done && touch c.done", &["c.o"], &["a.o"]),
        sh_action(path, "touch d.done", &["d.bin"], &["b.o", "c.o"]),
    ];

    let (success, summary) = LocalExecutor::new(quiet_config(2))
        .execute_with_summary(&actions)
        .await
        .unwrap();

    assert!(!success);
    // C is independent of B and still runs; D never does.
    assert!(path.join("c.done").is_file());
    assert!(!path.join("d.done").exists());
    assert_eq!(summary.executed, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn independent_actions_saturate_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let actions: Vec<_> = (0..4)
        .map(|i| sh_action(path, &format!("touch f{i}.done"), &[], &[]))
        .collect();

    let (success, summary) = LocalExecutor::new(quiet_config(2))
        .execute_with_summary(&actions)
        .await
        .unwrap();

    assert!(success);
    assert_eq!(summary.executed, 4);
    assert_eq!(summary.peak_concurrency, 2);
}

#[tokio::test]
async fn peak_concurrency_matches_count_below_cap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let actions: Vec<_> = (0..2)
        .map(|i| sh_action(path, &format!("touch g{i}.done"), &[], &[]))
        .collect();

    let (_, summary) = LocalExecutor::new(quiet_config(16))
        .execute_with_summary(&actions)
        .await
        .unwrap();

    assert_eq!(summary.peak_concurrency, 2);
}

#[tokio::test]
async fn stop_on_error_suppresses_new_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    // Cap 1 serializes dispatch, so the failure is seen before anything
    // else starts.
    let actions = vec![
        sh_action(path, "exit 1", &[], &[]),
        sh_action(path, "touch late1.done", &[], &[]),
        sh_action(path, "touch late2.done", &[], &[]),
    ];

    let cfg = ExecutorConfig {
        stop_on_error: true,
        ..quiet_config(1)
    };
    let (success, summary) = LocalExecutor::new(cfg)
        .execute_with_summary(&actions)
        .await
        .unwrap();

    assert!(!success);
    assert_eq!(summary.executed, 1);
    assert_eq!(summary.skipped, 2);
    assert!(!path.join("late1.done").exists());
    assert!(!path.join("late2.done").exists());
}

#[tokio::test]
async fn empty_prerequisites_from_outside_the_list_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let actions = vec![sh_action(
        path,
        "touch solo.done",
        &["solo.o"],
        &["some/source.c", "some/header.h"],
    )];

    let (success, summary) = LocalExecutor::new(quiet_config(4))
        .execute_with_summary(&actions)
        .await
        .unwrap();

    assert!(success);
    assert_eq!(summary.executed, 1);
    assert!(path.join("solo.done").is_file());
}
