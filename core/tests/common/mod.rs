#![allow(dead_code)]

use std::path::{Path, PathBuf};

use forgeflow_core::{Action, ActionKind, ExecutorConfig};

/// Build an `/bin/sh -c` action with declared (virtual) produced and
/// prerequisite items. Graph edges come from the declarations; the script
/// provides the observable side effects.
pub fn sh_action(workdir: &Path, script: &str, produced: &[&str], prerequisites: &[&str]) -> Action {
    let mut action = Action::new(ActionKind::Compile, "/bin/sh", workdir);
    action.arguments = format!("-c '{script}'");
    action.produced = produced.iter().map(PathBuf::from).collect();
    action.prerequisites = prerequisites.iter().map(PathBuf::from).collect();
    action.status_description = script.to_string();
    action
}

/// Config with the visual counter off and a bounded local cap, suitable
/// for assertions on scheduling behavior. The multiplier is inflated so
/// `processor_cap` alone decides the concurrency, whatever the host's
/// CPU count.
pub fn quiet_config(processor_cap: usize) -> ExecutorConfig {
    ExecutorConfig {
        processor_cap,
        processor_multiplier: 64.0,
        progress: false,
        ..ExecutorConfig::default()
    }
}

/// Write a fake distributed-build driver: a shell script that appends
/// every received wave script's contents to `log`, then exits with
/// `exit_code`.
#[cfg(unix)]
pub fn write_fake_driver(dir: &Path, log: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let driver = dir.join("fake-driver.sh");
    let body = format!(
        "#!/bin/sh\ncat \"$1\" >> \"{}\"\nexit {}\n",
        log.display(),
        exit_code
    );
    std::fs::write(&driver, body).expect("driver script written");
    let mut perms = std::fs::metadata(&driver).expect("driver metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&driver, perms).expect("driver made executable");
    driver
}
