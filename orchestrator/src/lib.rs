pub mod callback;
pub mod config;
pub mod error;
pub mod inputter;
pub mod modeler;
pub mod registry;
pub mod runner;

use std::sync::Arc;

use callback::{CallbackArgs, CallbackPipeline, callbacks};
use config::AppConfig;
use inputter::InputterArgs;
use modeler::ModelerArgs;

pub use error::{OrchestratorError, Result};
pub use runner::{RunSummary, Runner, StopHandle};

/// Builds a runner out of an already validated `AppConfig`.
///
/// Every name in the configuration is resolved through the registries, an unknown one fails
/// before any variable is created.
///
/// # Errors
/// `Configuration` on unknown names, or whatever the inputter fails with while reading its data.
pub fn build_runner(config: &AppConfig) -> Result<Runner> {
    let network = registry::network(&config.network)?;

    let augmenter = config
        .augmenter
        .as_deref()
        .map(|name| registry::augmenters().resolve(name, &config.inputter_config))
        .transpose()?
        .map(Arc::from);

    let inputter = registry::inputters().resolve(
        &config.inputter,
        &InputterArgs {
            config: config.inputter_config.clone(),
            augmenter,
        },
    )?;

    let modeler = registry::modelers().resolve(
        &config.modeler,
        &ModelerArgs {
            config: config.modeler_config.clone(),
            network,
        },
    )?;

    let runner_config = &config.runner_config;
    let args = CallbackArgs::new(runner_config.clone(), config.inputter_config.clone());
    let callbacks = callbacks().resolve_list(runner_config.callbacks_for(config.general.mode), &args)?;

    log::info!(
        mode = config.general.mode.as_str(),
        devices = config.general.device_count.get(),
        batch_size_per_gpu = config.general.batch_size_per_gpu.get();
        "built {} / {} / {} with {} callback(s)",
        config.inputter,
        config.modeler,
        config.network,
        callbacks.len()
    );

    let seed = config.inputter_config.seed.unwrap_or_else(rand::random);
    Runner::new(
        runner_config.clone(),
        inputter,
        modeler,
        CallbackPipeline::new(callbacks),
        seed,
    )
}
