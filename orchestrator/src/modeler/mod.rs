mod base;
mod classification;
mod text;

pub use base::ModelerBase;
pub use classification::ImageClassification;
pub use text::TextGeneration;

use std::sync::Arc;

use machine_learning::{
    PiecewiseConstant, VariableSpec,
    network::{Network, NetworkParams},
};
use parameter_server::VariableStore;

use crate::{
    config::ModelerConfig,
    error::Result,
    inputter::{Batch, Inputter},
    runner::PerDeviceResult,
};

/// The state that exists once per run, whatever the device count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildContext {
    pub global_step: u64,
    /// Set in train mode only.
    pub schedule: Option<PiecewiseConstant>,
    /// The steps one pass over the dataset takes.
    pub steps_per_epoch: u64,
    pub max_steps: u64,
}

impl BuildContext {
    /// The learning rate at the current global step, if a schedule was built.
    pub fn learning_rate(&self) -> Option<f32> {
        self.schedule
            .as_ref()
            .map(|s| s.learning_rate(self.global_step))
    }
}

/// What one replica knows about the step it runs in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    pub global_step: u64,
    pub device: usize,
    pub learning_rate: Option<f32>,
}

/// Builds the loss, gradients and mode specific outputs around a network.
pub trait Modeler: Send + Sync {
    fn name(&self) -> &str;

    fn config(&self) -> &ModelerConfig;

    /// Reads the dataset dependent sizing from `inputter`.
    ///
    /// # Errors
    /// `DatasetUnavailable` if a size the network needs is unknown.
    fn get_dataset_info(&mut self, inputter: &dyn Inputter) -> Result<()>;

    /// Builds what exists once per run, leaving values that are already set untouched.
    fn create_nonreplicated_fn(&self, ctx: &mut BuildContext) -> Result<()>;

    /// Every variable a replica reads.
    fn variables(&self) -> Result<Vec<VariableSpec>>;

    /// Runs one replica.
    ///
    /// # Arguments
    /// * `store` - The shared variables, read only.
    /// * `batch` - This device's slice of the step's batch.
    /// * `step` - The global step, device and learning rate.
    fn model_fn(
        &self,
        store: &VariableStore,
        batch: &Batch,
        step: &StepContext,
    ) -> Result<PerDeviceResult>;

    fn network(&self) -> &Arc<dyn Network>;

    /// The sizing the network was built with, once dataset info was read.
    fn network_params(&self) -> Option<&NetworkParams>;

    /// The name of the served input.
    fn input_name(&self) -> &str {
        "inputs"
    }
}

/// What every modeler factory receives.
#[derive(Clone)]
pub struct ModelerArgs {
    pub config: ModelerConfig,
    pub network: Arc<dyn Network>,
}
