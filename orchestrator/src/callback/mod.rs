mod basic;
mod display;
mod pipeline;
mod scalar;
mod speed;
mod summary;

pub use basic::Basic;
pub use display::{DisplayImageClassification, DisplayObjectDetection, DisplayTextGeneration};
pub use pipeline::CallbackPipeline;
pub use scalar::ScalarLogger;
pub use speed::Speed;
pub use summary::{Summary, SummaryHistory, SummaryRecord};

use std::path::Path;

use machine_learning::Mode;

use crate::{
    config::{InputterConfig, RunnerConfig},
    error::BoxError,
    registry::Registry,
    runner::{ACCURACY, AggregatedResult, LOSS},
};

/// Whether the run goes on after a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flow {
    #[default]
    Continue,
    Stop,
}

/// What the runner tells callbacks about the run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub mode: Mode,
    pub global_step: u64,
    /// The steps completed in this run.
    pub step: u64,
    pub max_steps: u64,
    /// The samples one step consumes across every device.
    pub global_batch_size: usize,
    pub model_dir: &'a Path,
}

/// Lifecycle hooks invoked by the runner, every hook defaults to doing nothing.
pub trait Callback: Send {
    fn name(&self) -> &str;

    fn before_run(&mut self, _ctx: &RunContext) -> Result<(), BoxError> {
        Ok(())
    }

    /// Receives the aggregated outputs of the step that just completed.
    fn after_step(
        &mut self,
        _ctx: &RunContext,
        _outputs: &AggregatedResult,
    ) -> Result<Flow, BoxError> {
        Ok(Flow::Continue)
    }

    fn after_run(&mut self, _ctx: &RunContext) -> Result<(), BoxError> {
        Ok(())
    }
}

/// What every callback factory receives.
#[derive(Clone)]
pub struct CallbackArgs {
    pub runner: RunnerConfig,
    pub inputter: InputterConfig,
    pub history: SummaryHistory,
}

impl CallbackArgs {
    pub fn new(runner: RunnerConfig, inputter: InputterConfig) -> Self {
        Self {
            runner,
            inputter,
            history: SummaryHistory::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.runner.general.mode
    }
}

pub fn callbacks() -> Registry<dyn Callback, CallbackArgs> {
    Registry::<dyn Callback, CallbackArgs>::new("callback")
        .register("train_basic", |args| Ok(Box::new(Basic::new("train_basic", args))))
        .register("train_loss", |args| {
            Ok(Box::new(ScalarLogger::new("train_loss", LOSS, args)))
        })
        .register("train_accuracy", |args| {
            Ok(Box::new(ScalarLogger::new("train_accuracy", ACCURACY, args)))
        })
        .register("train_speed", |args| Ok(Box::new(Speed::new("train_speed", args))))
        .register("train_summary", |args| {
            Ok(Box::new(Summary::new("train_summary", args)))
        })
        .register("eval_basic", |args| Ok(Box::new(Basic::new("eval_basic", args))))
        .register("eval_loss", |args| {
            Ok(Box::new(ScalarLogger::new("eval_loss", LOSS, args)))
        })
        .register("eval_accuracy", |args| {
            Ok(Box::new(ScalarLogger::new("eval_accuracy", ACCURACY, args)))
        })
        .register("eval_speed", |args| Ok(Box::new(Speed::new("eval_speed", args))))
        .register("eval_summary", |args| {
            Ok(Box::new(Summary::new("eval_summary", args)))
        })
        .register("infer_basic", |args| Ok(Box::new(Basic::new("infer_basic", args))))
        .register("infer_display_image_classification", |args| {
            Ok(Box::new(DisplayImageClassification::new(args)))
        })
        .register("infer_display_text_generation", |args| {
            Ok(Box::new(DisplayTextGeneration::new(args)?))
        })
        .register("infer_display_object_detection", |_| {
            Ok(Box::new(DisplayObjectDetection::new()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_callback_resolves_under_its_own_name() {
        let registry = callbacks();
        let args = CallbackArgs::new(RunnerConfig::default(), InputterConfig::default());

        let names: Vec<_> = registry.names().collect();
        assert_eq!(names.len(), 14);

        for name in names {
            let callback = registry.resolve(name, &args).unwrap();
            assert_eq!(callback.name(), name);
        }
    }
}
