mod export;
mod outputs;
mod state;
mod stop;

pub use export::{
    ExportRequest, ExportedModel, SIGNATURE_NAME, ServedParams, Signature, export,
};
pub use outputs::{
    ACCURACY, AggregatedResult, GRADIENTS, LEARNING_RATE, LOSS, Output, PerDeviceResult, aggregate,
};
pub use state::RunnerState;
pub use stop::StopHandle;

use std::path::PathBuf;

use log::{debug, info, warn};
use machine_learning::{
    Mode,
    optimization::{OptimizerKind, OptimizerSlots},
};
use parameter_server::{
    Checkpoint, CheckpointStore, VariableScope, VariableStore, checkpoint::latest_checkpoint,
};
use rayon::prelude::*;

use crate::{
    callback::{CallbackPipeline, Flow, RunContext},
    config::RunnerConfig,
    error::{OrchestratorError, Result},
    inputter::{Batch, Inputter, export_batches},
    modeler::{BuildContext, Modeler, StepContext},
};

/// What a finished run reports.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: Mode,
    pub global_step: u64,
    /// The steps executed by this run.
    pub steps: u64,
    pub stopped_early: bool,
    /// The checkpoint the variables were restored from, if any.
    pub restored_from: Option<PathBuf>,
    /// The directory the model was exported to, in export mode.
    pub export_dir: Option<PathBuf>,
    /// The outputs of the last step.
    pub last_outputs: Option<AggregatedResult>,
}

/// Replicates the modeler across devices and drives the step loop.
///
/// The runner owns the only writable copy of the variables; replicas borrow it read only for
/// the length of a step, the optimizer writes it once every replica returned.
pub struct Runner {
    config: RunnerConfig,
    inputter: Box<dyn Inputter>,
    modeler: Box<dyn Modeler>,
    callbacks: CallbackPipeline,
    optimizer: OptimizerKind,
    store: VariableStore,
    ctx: BuildContext,
    state: RunnerState,
    stop: StopHandle,
}

impl Runner {
    /// Creates a new `Runner`.
    ///
    /// # Arguments
    /// * `config` - The runner's configuration.
    /// * `inputter` - Feeds the batches.
    /// * `modeler` - Builds each replica.
    /// * `callbacks` - Receive the lifecycle events, in order.
    /// * `seed` - Seeds the variable initialization.
    ///
    /// # Errors
    /// `Configuration` if the modeler names an unknown optimizer.
    pub fn new(
        config: RunnerConfig,
        inputter: Box<dyn Inputter>,
        modeler: Box<dyn Modeler>,
        callbacks: CallbackPipeline,
        seed: u64,
    ) -> Result<Self> {
        let optimizer = modeler
            .config()
            .optimizer
            .parse::<OptimizerKind>()
            .map_err(|e| OrchestratorError::Configuration(e.to_string()))?;

        Ok(Self {
            config,
            inputter,
            modeler,
            callbacks,
            optimizer,
            store: VariableStore::new(seed),
            ctx: BuildContext::default(),
            state: RunnerState::Init,
            stop: StopHandle::new(),
        })
    }

    /// A handle that stops the run before its next step.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn global_step(&self) -> u64 {
        self.ctx.global_step
    }

    /// Runs the configured mode to completion.
    ///
    /// # Errors
    /// Any error aborts the run; checkpoints already written stay on disk.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mode = self.config.general.mode;
        if mode == Mode::Tune {
            return Err(OrchestratorError::Configuration(
                "tune mode is driven by an external search, not by the runner".into(),
            ));
        }
        if self.state != RunnerState::Init {
            return Err(OrchestratorError::Configuration(format!(
                "a runner runs once, this one is {}",
                self.state
            )));
        }

        self.modeler.get_dataset_info(self.inputter.as_ref())?;

        let global = self.config.general.global_batch_size();
        self.ctx.steps_per_epoch = (self.inputter.num_samples() / global) as u64;
        self.ctx.max_steps = self.inputter.max_steps();
        self.modeler.create_nonreplicated_fn(&mut self.ctx)?;

        self.replicate()?;
        let restored_from = self.restore()?;
        self.transition(RunnerState::Restored);

        let mut summary = RunSummary {
            mode,
            global_step: self.ctx.global_step,
            steps: 0,
            stopped_early: false,
            restored_from,
            export_dir: None,
            last_outputs: None,
        };

        if mode == Mode::Export {
            summary.export_dir = Some(self.export()?);
            self.transition(RunnerState::Finalized);
            return Ok(summary);
        }

        self.run_loop(&mut summary)?;
        self.transition(RunnerState::Finalized);
        Ok(summary)
    }

    // -------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------

    /// Declares the modeler's variables once per device, creating them on the first device
    /// and reusing them on every other one.
    fn replicate(&mut self) -> Result<()> {
        let specs = self.modeler.variables()?;

        for device in 0..self.config.general.device_count.get() {
            let mut scope = VariableScope::new(&mut self.store, device);
            scope.declare_all(&specs)?;
            debug!(
                device = device,
                created = scope.created(),
                reused = scope.reused();
                "replicated {}",
                self.modeler.name()
            );
        }

        info!(
            variables = self.store.len(),
            params = self.store.numel();
            "built {} on {} device(s)",
            self.modeler.name(),
            self.config.general.device_count
        );
        Ok(())
    }

    /// Restores the latest checkpoint of `model_dir`, or the pretrained variables when training
    /// from scratch.
    fn restore(&mut self) -> Result<Option<PathBuf>> {
        let mode = self.config.general.mode;

        if let Some(path) = latest_checkpoint(&self.config.model_dir)? {
            let step = Checkpoint::read(&path)?.restore(&mut self.store)?;
            self.ctx.global_step = step;
            info!(step = step; "restored {}", path.display());
            return Ok(Some(path));
        }

        match (&self.config.pretrained_dir, mode) {
            (Some(dir), Mode::Train) => {
                let Some(path) = latest_checkpoint(dir)? else {
                    warn!("no checkpoint in {}, training from scratch", dir.display());
                    return Ok(None);
                };

                let report = Checkpoint::read(&path)?
                    .restore_filtered(&mut self.store, &self.config.skip_pretrained_var)?;
                if let Some(step) = report.step {
                    self.ctx.global_step = step;
                }

                info!(
                    restored = report.restored.len(),
                    skipped = report.skipped.len(),
                    missing = report.missing.len();
                    "restored pretrained variables from {}",
                    path.display()
                );
                Ok(Some(path))
            }
            (_, Mode::Train) => Ok(None),
            _ => {
                warn!(
                    "no checkpoint in {}, {mode} runs with initial values",
                    self.config.model_dir.display()
                );
                Ok(None)
            }
        }
    }

    fn transition(&mut self, next: RunnerState) {
        debug_assert!(self.state.can_become(next), "{} -> {next}", self.state);
        debug!("runner {} -> {next}", self.state);
        self.state = next;
    }

    // -------------------------------------------------------------------------
    // Step loop
    // -------------------------------------------------------------------------

    fn run_loop(&mut self, summary: &mut RunSummary) -> Result<()> {
        let mode = self.config.general.mode;
        let mut slots = OptimizerSlots::new(self.optimizer);
        let mut checkpoints = match mode {
            Mode::Train => Some(CheckpointStore::open(
                &self.config.model_dir,
                self.config.keep_checkpoint_max,
            )?),
            _ => None,
        };

        self.callbacks
            .before_run(&run_context(&self.config, &self.ctx, 0))?;

        let mut last_saved = self.ctx.global_step;
        for batches in self.inputter.batches()? {
            if self.stop.is_stopped() {
                info!(step = self.ctx.global_step; "stop requested");
                summary.stopped_early = true;
                break;
            }

            self.transition(RunnerState::Running);
            let batches = batches.map_err(|e| e.at_step(self.ctx.global_step, 0))?;
            let outputs = self.step(&batches, &mut slots)?;
            summary.steps += 1;

            let flow = self.callbacks.after_step(
                &run_context(&self.config, &self.ctx, summary.steps),
                &outputs,
            )?;
            summary.last_outputs = Some(outputs);

            if let Some(checkpoints) = &mut checkpoints
                && self.ctx.global_step % self.config.save_checkpoints_steps == 0
            {
                checkpoints.save(&self.store, self.ctx.global_step)?;
                last_saved = self.ctx.global_step;
            }

            if flow == Flow::Stop {
                info!(step = self.ctx.global_step; "a callback stopped the run");
                summary.stopped_early = true;
                break;
            }
        }

        if let Some(checkpoints) = &mut checkpoints
            && last_saved != self.ctx.global_step
        {
            checkpoints.save(&self.store, self.ctx.global_step)?;
        }

        summary.global_step = self.ctx.global_step;
        self.callbacks
            .after_run(&run_context(&self.config, &self.ctx, summary.steps))
    }

    /// Runs every replica of one step in parallel, aggregates their outputs and, in train
    /// mode, applies the averaged gradients.
    fn step(&mut self, batches: &[Batch], slots: &mut OptimizerSlots) -> Result<AggregatedResult> {
        let global_step = self.ctx.global_step;
        let learning_rate = self.ctx.learning_rate();
        let modeler = self.modeler.as_ref();
        let store = &self.store;

        let per_device = batches
            .par_iter()
            .enumerate()
            .map(|(device, batch)| {
                let step = StepContext {
                    global_step,
                    device,
                    learning_rate,
                };
                modeler
                    .model_fn(store, batch, &step)
                    .map_err(|e| e.at_step(global_step, device))
            })
            .collect::<Result<Vec<_>>>()?;

        let outputs = aggregate(per_device)?;

        if self.config.general.mode == Mode::Train {
            let (Some(grads), Some(learning_rate)) =
                (outputs.gradients(), outputs.scalar(LEARNING_RATE))
            else {
                return Err(OrchestratorError::Configuration(format!(
                    "{} produced no gradients or learning rate in train mode",
                    self.modeler.name()
                )));
            };

            self.store
                .apply_gradients(grads, learning_rate, slots)
                .map_err(|e| OrchestratorError::from(e).at_step(global_step, 0))?;
            self.ctx.global_step += 1;
        }

        Ok(outputs)
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    fn export(&mut self) -> Result<PathBuf> {
        let params = self.modeler.network_params().cloned().ok_or_else(|| {
            OrchestratorError::DatasetUnavailable("dataset info was not read yet".into())
        })?;

        let batches = export_batches(&params.input_shape, &self.config.general);
        let Some(batch) = batches.first() else {
            return Err(OrchestratorError::Configuration("no device to export from".into()));
        };

        let step = StepContext {
            global_step: self.ctx.global_step,
            device: 0,
            learning_rate: None,
        };
        let outputs = self
            .modeler
            .model_fn(&self.store, batch, &step)
            .map_err(|e| e.at_step(self.ctx.global_step, 0))?;

        let request = ExportRequest {
            model_dir: &self.config.model_dir,
            global_step: self.ctx.global_step,
            network: self.modeler.network().as_ref(),
            modeler: self.modeler.name(),
            params: &params,
            input_name: self.modeler.input_name(),
            input_shape: batch.inputs.shape().to_vec(),
            outputs: &outputs,
        };

        export(request, &self.store)
    }
}

fn run_context<'a>(config: &'a RunnerConfig, ctx: &BuildContext, steps: u64) -> RunContext<'a> {
    RunContext {
        mode: config.general.mode,
        global_step: ctx.global_step,
        step: steps,
        max_steps: ctx.max_steps,
        global_batch_size: config.general.global_batch_size(),
        model_dir: &config.model_dir,
    }
}
