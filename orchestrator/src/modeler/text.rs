use std::sync::Arc;

use machine_learning::{
    MlErr, Mode, Tensor, VariableSpec,
    network::{Network, NetworkParams},
    tensor::softmax,
};
use ndarray::{Array2, IxDyn};
use parameter_server::VariableStore;

use super::{
    BuildContext, Modeler, ModelerArgs, ModelerBase, StepContext, base::truncate_rows,
};
use crate::{
    config::ModelerConfig,
    error::{OrchestratorError, Result},
    inputter::{Batch, Inputter},
    runner::{Output, PerDeviceResult},
};

/// Predicts the next token at every position of a sequence.
pub struct TextGeneration {
    base: ModelerBase,
}

impl TextGeneration {
    /// The gradient clip norm used when `grad_clip` is not configured.
    pub const DEFAULT_CLIP: f32 = 5.;

    pub fn new(args: ModelerArgs) -> Self {
        Self {
            base: ModelerBase::new(args),
        }
    }

    pub fn items(&self) -> &[String] {
        &self.base.info().items
    }

    /// Reshapes per position rows into `[batch, length, vocab]`.
    fn per_sequence(&self, rows: Array2<f32>, batch: usize) -> Result<Tensor> {
        let length = self.base.info().max_length.unwrap_or(1);
        let vocab = rows.ncols();
        let got = vec![rows.nrows(), vocab];

        rows.into_shape_with_order(IxDyn(&[batch, length, vocab]))
            .map_err(|_| {
                MlErr::ShapeMismatch {
                    what: "text logits".into(),
                    got,
                    expected: vec![batch * length, vocab],
                }
                .into()
            })
    }
}

impl Modeler for TextGeneration {
    fn name(&self) -> &str {
        "text_generation"
    }

    fn config(&self) -> &ModelerConfig {
        self.base.config()
    }

    fn get_dataset_info(&mut self, inputter: &dyn Inputter) -> Result<()> {
        let info = inputter.dataset_info().clone();
        if info.items.is_empty() {
            return Err(OrchestratorError::DatasetUnavailable(
                "text generation needs a vocabulary".into(),
            ));
        }
        if info.max_length.is_none() {
            return Err(OrchestratorError::DatasetUnavailable(
                "text generation needs a sequence length".into(),
            ));
        }

        let vocab = info.items.len();
        self.base.set_dataset_info(info, vocab)
    }

    fn create_nonreplicated_fn(&self, ctx: &mut BuildContext) -> Result<()> {
        self.base.create_nonreplicated(ctx)
    }

    fn variables(&self) -> Result<Vec<VariableSpec>> {
        self.base.variables()
    }

    fn model_fn(
        &self,
        store: &VariableStore,
        batch: &Batch,
        step: &StepContext,
    ) -> Result<PerDeviceResult> {
        let mut out = self.base.forward(store, batch)?;
        let rows = batch.inputs.shape().first().copied().unwrap_or(0);
        let last_state = out
            .aux
            .remove("last_state")
            .unwrap_or_else(|| Tensor::zeros(IxDyn(&[rows, 0])));

        match self.base.mode() {
            Mode::Train | Mode::Eval => {
                let clip = self.base.config().grad_clip.unwrap_or(Self::DEFAULT_CLIP);
                self.base
                    .train_eval(store, batch, &out, step, Some(clip), false)
            }
            Mode::Infer => {
                let probabilities = self.per_sequence(softmax(out.logits.view()), rows)?;
                let logits = self.per_sequence(out.logits, rows)?;
                let valid = batch.valid;

                Ok(PerDeviceResult::from([
                    (
                        "inputs".into(),
                        Output::Batch(truncate_rows(batch.inputs.clone(), valid)),
                    ),
                    ("logits".into(), Output::Batch(truncate_rows(logits, valid))),
                    (
                        "probabilities".into(),
                        Output::Batch(truncate_rows(probabilities, valid)),
                    ),
                    (
                        "last_state".into(),
                        Output::Batch(truncate_rows(last_state, valid)),
                    ),
                    ("items".into(), Output::Meta(self.items().to_vec())),
                ]))
            }
            Mode::Export => {
                let probabilities = self.per_sequence(softmax(out.logits.view()), rows)?;

                Ok(PerDeviceResult::from([
                    ("output_probabilities".into(), Output::Batch(probabilities)),
                    ("output_last_state".into(), Output::Batch(last_state)),
                    ("items".into(), Output::Meta(self.items().to_vec())),
                ]))
            }
            Mode::Tune => Err(OrchestratorError::Configuration(
                "tune mode has no model function".into(),
            )),
        }
    }

    fn network(&self) -> &Arc<dyn Network> {
        self.base.network()
    }

    fn network_params(&self) -> Option<&NetworkParams> {
        self.base.params()
    }
}
