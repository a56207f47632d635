use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;

use forgeflow_core::{execute_actions, load_default, Action};

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            1
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> anyhow::Result<i32> {
    let args = args::Args::parse();
    init_tracing();

    let mut cfg = load_default()?;
    if args.stop_on_error {
        cfg.stop_on_error = true;
    }
    if let Some(n) = args.max_procs {
        cfg.processor_cap = n.max(1);
    }
    if let Some(driver) = args.driver {
        cfg.driver_path = Some(driver);
    }
    if args.detailed_stats {
        cfg.detailed_stats = true;
    }
    if args.quiet {
        cfg.progress = false;
    }

    let actions = load_manifest(&args.manifest)?;
    tracing::info!(
        manifest = %args.manifest.display(),
        actions = actions.len(),
        "manifest loaded"
    );

    let success = execute_actions(&actions, &cfg, args.executor.into()).await?;
    if !success {
        tracing::error!("build failed");
    }
    Ok(if success { 0 } else { 1 })
}

fn load_manifest(path: &std::path::Path) -> anyhow::Result<Vec<Action>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read manifest {}: {e}", path.display()))?;
    let actions: Vec<Action> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("invalid manifest {}: {e}", path.display()))?;
    Ok(actions)
}

fn init_tracing() {
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::new("info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
