use std::sync::Arc;

use machine_learning::{
    Mode, Tensor, VariableSpec,
    network::{Network, NetworkParams},
    tensor::{argmax_rows, softmax},
};
use ndarray::Array1;
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

/// Predicts one class per image.
///
/// Gradients are only clipped when `grad_clip` is configured.
pub struct ImageClassification {
    base: ModelerBase,
}

impl ImageClassification {
    pub fn new(args: ModelerArgs) -> Self {
        Self {
            base: ModelerBase::new(args),
        }
    }

    pub fn class_names(&self) -> &[String] {
        &self.base.info().class_names
    }
}

impl Modeler for ImageClassification {
    fn name(&self) -> &str {
        "image_classification"
    }

    fn config(&self) -> &ModelerConfig {
        self.base.config()
    }

    fn get_dataset_info(&mut self, inputter: &dyn Inputter) -> Result<()> {
        let mut info = inputter.dataset_info().clone();
        let num_classes = match self.base.config().num_classes {
            0 => info.num_classes,
            n => n,
        };

        if info.class_names.len() != num_classes {
            info.class_names = (0..num_classes).map(|c| c.to_string()).collect();
        }
        info.num_classes = num_classes;

        self.base.set_dataset_info(info, num_classes)
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
        let out = self.base.forward(store, batch)?;

        match self.base.mode() {
            Mode::Train | Mode::Eval => {
                let clip = self.base.config().grad_clip;
                self.base.train_eval(store, batch, &out, step, clip, true)
            }
            Mode::Infer => {
                let probabilities = softmax(out.logits.view());
                let classes = class_tensor(&argmax_rows(probabilities.view()));

                Ok(PerDeviceResult::from([
                    (
                        "probabilities".into(),
                        Output::Batch(truncate_rows(probabilities.into_dyn(), batch.valid)),
                    ),
                    (
                        "classes".into(),
                        Output::Batch(truncate_rows(classes, batch.valid)),
                    ),
                    (
                        "class_names".into(),
                        Output::Meta(self.class_names().to_vec()),
                    ),
                ]))
            }
            Mode::Export => {
                let probabilities = softmax(out.logits.view());
                let classes = class_tensor(&argmax_rows(probabilities.view()));

                Ok(PerDeviceResult::from([
                    (
                        "output_probabilities".into(),
                        Output::Batch(probabilities.into_dyn()),
                    ),
                    ("output_classes".into(), Output::Batch(classes)),
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

fn class_tensor(classes: &[usize]) -> Tensor {
    Array1::from_iter(classes.iter().map(|&c| c as f32)).into_dyn()
}
