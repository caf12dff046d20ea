mod image;
mod pipeline;
mod samples;
mod shard;
mod text;

pub use image::{ImageClassificationCsv, SyntheticClassification};
pub use pipeline::{StepIter, export_batches, planned_steps};
pub use samples::Samples;
pub use shard::shard_range;
pub use text::{TextGeneration, Tokenizer, Vocabulary};

use std::sync::Arc;

use machine_learning::{Mode, Tensor, augment::Augmenter};

use crate::{config::InputterConfig, error::Result};

/// The inputs one device receives for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Tensor,
    /// Present in the modes that have ground truth.
    pub labels: Option<Tensor>,
    /// The amount of leading rows that hold real samples, the rest is padding.
    pub valid: usize,
}

/// Dataset dependent sizing the modeler reads before declaring any variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetInfo {
    pub num_samples: usize,
    /// The amount of label classes, or the vocabulary size for text.
    pub num_classes: usize,
    pub class_names: Vec<String>,
    /// The vocabulary, empty for non text datasets.
    pub items: Vec<String>,
    pub max_length: Option<usize>,
    /// The shape of one sample, without the batch axis.
    pub input_shape: Vec<usize>,
}

/// The batches of a whole run, one `Vec` per global step holding one batch per device.
pub type StepBatches = Box<dyn Iterator<Item = Result<Vec<Batch>>> + Send>;

/// Feeds a run with batches already split across devices.
pub trait Inputter: Send {
    fn name(&self) -> &str;

    fn config(&self) -> &InputterConfig;

    /// Everything the inputter knows about its dataset for the configured mode.
    fn dataset_info(&self) -> &DatasetInfo;

    fn num_samples(&self) -> usize {
        self.dataset_info().num_samples
    }

    /// The shape of one device's input batch.
    fn input_shape(&self) -> Vec<usize> {
        std::iter::once(self.config().general.batch_size_per_gpu.get())
            .chain(self.dataset_info().input_shape.iter().copied())
            .collect()
    }

    /// The amount of global steps `batches` yields.
    fn max_steps(&self) -> u64 {
        let config = self.config();
        planned_steps(self.num_samples(), &config.general, config.epochs)
    }

    /// Starts a fresh pass over the data for the configured mode.
    fn batches(&mut self) -> Result<StepBatches>;
}

/// Reads the file at `path`, reporting a missing file as an unavailable dataset.
pub(crate) fn read_dataset_file(path: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        crate::error::OrchestratorError::DatasetUnavailable(format!("can't read `{path}`: {e}"))
    })
}

/// The seed of an inputter's shuffling, random when none is configured.
pub(crate) fn resolve_seed(config: &InputterConfig) -> u64 {
    config.seed.unwrap_or_else(rand::random)
}

/// What every inputter factory receives.
#[derive(Clone)]
pub struct InputterArgs {
    pub config: InputterConfig,
    pub augmenter: Option<Arc<dyn Augmenter>>,
}

/// Runs `samples` through the step pipeline, or the single zero step in export mode.
pub(crate) fn step_batches(
    samples: &Arc<Samples>,
    info: &DatasetInfo,
    args: &InputterArgs,
    seed: u64,
) -> StepBatches {
    let general = args.config.general;
    match general.mode {
        Mode::Export => Box::new(std::iter::once(Ok(export_batches(
            &info.input_shape,
            &general,
        )))),
        _ => Box::new(StepIter::new(
            Arc::clone(samples),
            &general,
            args.config.epochs,
            seed,
            args.augmenter.clone(),
        )),
    }
}
