use std::sync::Arc;

use log::debug;
use machine_learning::{
    Gradients, MlErr, Mode, PiecewiseConstant, Tensor, VariableSpec,
    clip::clip_by_global_norm,
    loss::{LossFn, SparseSoftmaxCrossEntropy},
    metrics::accuracy,
    network::{NetOutput, Network, NetworkParams},
    regularization::l2_loss,
    tensor::class_indices,
};
use ndarray::{Axis, Slice};
use parameter_server::VariableStore;

use super::{BuildContext, ModelerArgs, StepContext};
use crate::{
    config::{BoundaryUnit, ModelerConfig},
    error::{OrchestratorError, Result},
    inputter::{Batch, DatasetInfo},
    runner::{ACCURACY, GRADIENTS, LEARNING_RATE, LOSS, Output, PerDeviceResult},
};

/// The network, loss, schedule and train/eval tail every modeler shares.
pub struct ModelerBase {
    config: ModelerConfig,
    network: Arc<dyn Network>,
    loss: SparseSoftmaxCrossEntropy,
    info: DatasetInfo,
    params: Option<NetworkParams>,
}

impl ModelerBase {
    pub fn new(args: ModelerArgs) -> Self {
        Self {
            config: args.config,
            network: args.network,
            loss: SparseSoftmaxCrossEntropy::new(),
            info: DatasetInfo::default(),
            params: None,
        }
    }

    pub fn config(&self) -> &ModelerConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.general.mode
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    pub fn params(&self) -> Option<&NetworkParams> {
        self.params.as_ref()
    }

    /// Records the dataset sizing and derives the network's from it.
    ///
    /// # Arguments
    /// * `info` - What the inputter reported.
    /// * `num_outputs` - The amount of logits per prediction.
    pub fn set_dataset_info(&mut self, info: DatasetInfo, num_outputs: usize) -> Result<()> {
        if num_outputs == 0 {
            return Err(OrchestratorError::DatasetUnavailable(format!(
                "{} needs at least one output class",
                self.network.name()
            )));
        }

        self.params = Some(NetworkParams {
            input_shape: info.input_shape.clone(),
            num_outputs,
            hidden_units: self.config.hidden_units,
        });
        self.info = info;
        Ok(())
    }

    fn require_params(&self) -> Result<&NetworkParams> {
        self.params.as_ref().ok_or_else(|| {
            OrchestratorError::DatasetUnavailable("dataset info was not read yet".into())
        })
    }

    /// Builds the learning rate schedule, converting epoch boundaries with `steps_per_epoch`.
    pub fn schedule(&self, steps_per_epoch: u64) -> Result<PiecewiseConstant> {
        let c = &self.config;
        let schedule = match c.boundary_unit {
            BoundaryUnit::Epochs => PiecewiseConstant::from_epochs(
                c.learning_rate,
                &c.piecewise_boundaries,
                &c.piecewise_lr_decay,
                steps_per_epoch.max(1),
            ),
            BoundaryUnit::Steps => PiecewiseConstant::new(
                c.learning_rate,
                c.piecewise_boundaries.clone(),
                &c.piecewise_lr_decay,
            ),
        };

        schedule.map_err(|e| OrchestratorError::Configuration(e.to_string()))
    }

    pub fn create_nonreplicated(&self, ctx: &mut BuildContext) -> Result<()> {
        if self.mode() == Mode::Train && ctx.schedule.is_none() {
            let schedule = self.schedule(ctx.steps_per_epoch)?;
            debug!(boundaries:? = schedule.boundaries(); "built learning rate schedule");
            ctx.schedule = Some(schedule);
        }
        Ok(())
    }

    pub fn variables(&self) -> Result<Vec<VariableSpec>> {
        Ok(self.network.variables(self.require_params()?))
    }

    pub fn forward(&self, store: &VariableStore, batch: &Batch) -> Result<NetOutput> {
        let params = self.require_params()?;
        Ok(self
            .network
            .forward(store, &batch.inputs, params, self.mode())?)
    }

    /// Computes the loss and accuracy of `out`, plus gradients and learning rate in train mode.
    ///
    /// With `regularize` set the loss adds the L2 penalty of the trainable variables not matched
    /// by `skip_l2_loss_vars`. Only variables allowed by the trainable filter get gradients, which
    /// are clipped by global norm when `clip` is set.
    pub fn train_eval(
        &self,
        store: &VariableStore,
        batch: &Batch,
        out: &NetOutput,
        step: &StepContext,
        clip: Option<f32>,
        regularize: bool,
    ) -> Result<PerDeviceResult> {
        let params = self.require_params()?;
        let mode = self.mode();

        let labels = batch.labels.as_ref().ok_or_else(|| {
            OrchestratorError::DatasetUnavailable(format!("{mode} batch has no labels"))
        })?;
        let labels = class_indices(labels, params.num_outputs)?;
        if labels.len() != out.logits.nrows() {
            return Err(MlErr::ShapeMismatch {
                what: "labels".into(),
                got: vec![labels.len()],
                expected: vec![out.logits.nrows()],
            }
            .into());
        }

        let trainable = self.config.trainable_filter().select(store.trainable_names());
        let (penalty, l2_grads) = if regularize && self.config.l2_weight_decay > 0. {
            let regularized = trainable
                .iter()
                .copied()
                .filter(|name| !self.config.skip_l2_loss_vars.matches(name));
            l2_loss(store, regularized, self.config.l2_weight_decay)?
        } else {
            (0., Gradients::new())
        };

        let xent = self.loss.loss(out.logits.view(), &labels);
        let mut outputs = PerDeviceResult::new();
        outputs.insert(LOSS.into(), Output::Scalar(xent + penalty));
        outputs.insert(
            ACCURACY.into(),
            Output::Scalar(accuracy(out.logits.view(), &labels)),
        );

        if mode == Mode::Train {
            let learning_rate = step.learning_rate.ok_or_else(|| {
                OrchestratorError::Configuration("train step without a learning rate".into())
            })?;

            let d_logits = self.loss.loss_prime(out.logits.view(), &labels);
            let mut grads =
                self.network
                    .backward(store, &batch.inputs, params, d_logits.view())?;
            grads.retain(|name| trainable.contains(&name));
            grads.accumulate(&l2_grads)?;

            if let Some(clip) = clip {
                clip_by_global_norm(&mut grads, clip);
            }

            outputs.insert(GRADIENTS.into(), Output::Gradients(grads));
            outputs.insert(LEARNING_RATE.into(), Output::State(learning_rate));
        }

        Ok(outputs)
    }
}

/// Keeps the first `valid` rows of `t`.
pub(super) fn truncate_rows(t: Tensor, valid: usize) -> Tensor {
    if t.shape().first().is_some_and(|&rows| rows > valid) {
        t.slice_axis(Axis(0), Slice::from(0..valid)).to_owned()
    } else {
        t
    }
}
