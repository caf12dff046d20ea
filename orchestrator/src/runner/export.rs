use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::info;
use machine_learning::{
    MlErr, Mode, Tensor,
    network::{Network, NetworkParams},
    tensor::{argmax_rows, softmax},
};
use ndarray::{Array1, IxDyn};
use parameter_server::{
    VariableStore,
    checkpoint::{GLOBAL_STEP, read_tensors, write_tensors},
};
use serde::{Deserialize, Serialize};

use super::outputs::{Output, PerDeviceResult};
use crate::{
    error::{OrchestratorError, Result},
    registry,
};

pub const SIGNATURE_NAME: &str = "predict";
pub const SIGNATURE_FILE: &str = "signature.json";
pub const VARIABLES_FILE: &str = "variables.safetensors";

/// The sizing a served network is rebuilt with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServedParams {
    pub input_shape: Vec<usize>,
    pub num_outputs: usize,
    pub hidden_units: usize,
}

impl From<&NetworkParams> for ServedParams {
    fn from(p: &NetworkParams) -> Self {
        Self {
            input_shape: p.input_shape.clone(),
            num_outputs: p.num_outputs,
            hidden_units: p.hidden_units,
        }
    }
}

impl From<&ServedParams> for NetworkParams {
    fn from(p: &ServedParams) -> Self {
        Self {
            input_shape: p.input_shape.clone(),
            num_outputs: p.num_outputs,
            hidden_units: p.hidden_units,
        }
    }
}

/// The fixed input and output shapes of an exported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub network: String,
    pub modeler: String,
    pub global_step: u64,
    pub params: ServedParams,
    pub inputs: BTreeMap<String, Vec<usize>>,
    pub outputs: BTreeMap<String, Vec<usize>>,
    /// The vocabulary or class names served along the outputs.
    #[serde(default)]
    pub items: Vec<String>,
}

/// Everything `export` needs from the run.
pub struct ExportRequest<'a> {
    pub model_dir: &'a Path,
    pub global_step: u64,
    pub network: &'a dyn Network,
    pub modeler: &'a str,
    pub params: &'a NetworkParams,
    pub input_name: &'a str,
    pub input_shape: Vec<usize>,
    /// The outputs of one replica run on the export batch.
    pub outputs: &'a PerDeviceResult,
}

/// Writes `<model_dir>/export/<global_step>/` with the variables and the signature.
///
/// # Returns
/// The export directory.
pub fn export(request: ExportRequest, store: &VariableStore) -> Result<PathBuf> {
    let dir = request
        .model_dir
        .join("export")
        .join(request.global_step.to_string());
    fs::create_dir_all(&dir)?;

    let mut outputs = BTreeMap::new();
    let mut items = Vec::new();
    for (name, output) in request.outputs {
        match output {
            Output::Batch(t) => {
                outputs.insert(name.clone(), t.shape().to_vec());
            }
            Output::Meta(meta) => items.clone_from(meta),
            _ => {}
        }
    }

    let signature = Signature {
        name: SIGNATURE_NAME.to_string(),
        network: request.network.name().to_string(),
        modeler: request.modeler.to_string(),
        global_step: request.global_step,
        params: request.params.into(),
        inputs: BTreeMap::from([(request.input_name.to_string(), request.input_shape)]),
        outputs,
        items,
    };

    let metadata = HashMap::from([(GLOBAL_STEP.to_string(), request.global_step.to_string())]);
    write_tensors(&dir.join(VARIABLES_FILE), &store.snapshot(), metadata)?;
    fs::write(dir.join(SIGNATURE_FILE), serde_json::to_vec_pretty(&signature)?)?;

    info!(step = request.global_step; "exported model to {}", dir.display());
    Ok(dir)
}

/// A model loaded back from an export directory, ready to serve predictions.
pub struct ExportedModel {
    signature: Signature,
    network: Arc<dyn Network>,
    params: NetworkParams,
    variables: BTreeMap<String, Tensor>,
}

impl ExportedModel {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let signature: Signature = serde_json::from_slice(&fs::read(dir.join(SIGNATURE_FILE))?)?;
        let (variables, _) = read_tensors(&dir.join(VARIABLES_FILE))?;
        let network = registry::network(&signature.network)?;
        let params = NetworkParams::from(&signature.params);

        for spec in network.variables(&params) {
            let Some(value) = variables.get(&spec.name) else {
                return Err(MlErr::MissingVariable(spec.name).into());
            };
            if value.shape() != spec.shape.as_slice() {
                return Err(OrchestratorError::RestoreMismatch {
                    name: spec.name,
                    checkpoint: value.shape().to_vec(),
                    model: spec.shape,
                });
            }
        }

        Ok(Self {
            signature,
            network,
            params,
            variables,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Runs the network on `inputs`, which must have the signature's input shape.
    ///
    /// # Returns
    /// Every signature output the network can produce, in its signature shape.
    pub fn predict(&self, inputs: &Tensor) -> Result<BTreeMap<String, Tensor>> {
        if let Some((name, shape)) = self.signature.inputs.iter().next()
            && inputs.shape() != shape.as_slice()
        {
            return Err(MlErr::ShapeMismatch {
                what: name.clone(),
                got: inputs.shape().to_vec(),
                expected: shape.clone(),
            }
            .into());
        }

        let mut out = self
            .network
            .forward(&self.variables, inputs, &self.params, Mode::Export)?;
        let probabilities = softmax(out.logits.view());

        let mut predictions = BTreeMap::new();
        for (name, shape) in &self.signature.outputs {
            let value = match name.as_str() {
                "output_probabilities" => reshaped(probabilities.clone().into_dyn(), shape)?,
                "output_classes" => {
                    let classes = argmax_rows(probabilities.view());
                    Array1::from_iter(classes.into_iter().map(|c| c as f32)).into_dyn()
                }
                "output_last_state" => match out.aux.remove("last_state") {
                    Some(state) => state,
                    None => continue,
                },
                _ => continue,
            };
            predictions.insert(name.clone(), value);
        }

        Ok(predictions)
    }
}

fn reshaped(t: Tensor, shape: &[usize]) -> Result<Tensor> {
    let got = t.shape().to_vec();
    t.into_shape_with_order(IxDyn(shape)).map_err(|_| {
        MlErr::ShapeMismatch {
            what: "output_probabilities".into(),
            got,
            expected: shape.to_vec(),
        }
        .into()
    })
}
