use std::{env, path::PathBuf};

use anyhow::Context;
use orchestrator::{configs::FinetuneConfig, finetune};

const DEFAULT_CONFIG: &str = "simclr_config.json";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    let config = FinetuneConfig::from_path(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    let report = finetune(&config).context("fine-tuning failed")?;
    log::info!(
        "finished after {} epoch(s){}, best test acc {:.4}",
        report.epochs_run,
        if report.early_stopped { " (early stopped)" } else { "" },
        report.best_test_acc
    );

    Ok(())
}
