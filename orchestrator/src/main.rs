use std::{env, process::ExitCode};

use anyhow::{Context, bail};
use log::{error, info, warn};
use orchestrator::{build_runner, config::AppConfig};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let Some(path) = env::args().nth(1) else {
        bail!("usage: orchestrator <config.json>");
    };

    let config = AppConfig::load(&path).with_context(|| format!("loading {path}"))?;
    let mut runner = build_runner(&config).context("building the runner")?;
    let stop = runner.stop_handle();

    let mut job = tokio::task::spawn_blocking(move || runner.run());
    let summary = tokio::select! {
        joined = &mut job => joined?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping after the current step");
            stop.stop();
            job.await?
        }
    }?;

    info!(
        mode = summary.mode.as_str(),
        global_step = summary.global_step,
        steps = summary.steps,
        stopped_early = summary.stopped_early;
        "run finished"
    );
    if let Some(dir) = summary.export_dir {
        info!("exported to {}", dir.display());
    }

    Ok(())
}
