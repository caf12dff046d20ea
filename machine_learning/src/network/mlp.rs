use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};

use super::{NetOutput, Network, NetworkParams, affine, affine_backward};
use crate::{
    Gradients, Init, Mode, Result, Tensor, VariableSpec, VariableView,
    tensor::{as_matrix, matrix, vector},
};

const HIDDEN_WEIGHTS: &str = "mlp/hidden/weights";
const HIDDEN_BIASES: &str = "mlp/hidden/biases";
const LOGITS_WEIGHTS: &str = "mlp/logits/weights";
const LOGITS_BIASES: &str = "mlp/logits/biases";

/// Flattens each sample and feeds it through a ReLU hidden layer and a linear output layer.
///
/// The hidden activations are exposed as the `features` auxiliary output.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mlp;

impl Mlp {
    pub fn new() -> Self {
        Self
    }

    fn hidden(&self, vars: &dyn VariableView, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let w = matrix(vars.require(HIDDEN_WEIGHTS)?, HIDDEN_WEIGHTS)?;
        let b = vector(vars.require(HIDDEN_BIASES)?, HIDDEN_BIASES)?;
        Ok(affine(x, w, b, HIDDEN_WEIGHTS)?.mapv(|z| z.max(0.)))
    }
}

impl Network for Mlp {
    fn name(&self) -> &str {
        "mlp"
    }

    fn variables(&self, params: &NetworkParams) -> Vec<VariableSpec> {
        let features: usize = params.input_shape.iter().product();
        let hidden = params.hidden_units;
        let outputs = params.num_outputs;

        vec![
            VariableSpec::new(HIDDEN_WEIGHTS, &[features, hidden], Init::Kaiming),
            VariableSpec::new(HIDDEN_BIASES, &[hidden], Init::Zeros),
            VariableSpec::new(LOGITS_WEIGHTS, &[hidden, outputs], Init::XavierUniform),
            VariableSpec::new(LOGITS_BIASES, &[outputs], Init::Zeros),
        ]
    }

    fn forward(
        &self,
        vars: &dyn VariableView,
        inputs: &Tensor,
        _params: &NetworkParams,
        _mode: Mode,
    ) -> Result<NetOutput> {
        let x = as_matrix(inputs, "mlp inputs")?;
        let hidden = self.hidden(vars, x.view())?;

        let w2 = matrix(vars.require(LOGITS_WEIGHTS)?, LOGITS_WEIGHTS)?;
        let b2 = vector(vars.require(LOGITS_BIASES)?, LOGITS_BIASES)?;
        let logits = affine(hidden.view(), w2, b2, LOGITS_WEIGHTS)?;

        let mut aux = BTreeMap::new();
        aux.insert("features".to_string(), hidden.into_dyn());

        Ok(NetOutput { logits, aux })
    }

    fn backward(
        &self,
        vars: &dyn VariableView,
        inputs: &Tensor,
        _params: &NetworkParams,
        d_logits: ArrayView2<f32>,
    ) -> Result<Gradients> {
        let x = as_matrix(inputs, "mlp inputs")?;
        let hidden = self.hidden(vars, x.view())?;

        let w2 = matrix(vars.require(LOGITS_WEIGHTS)?, LOGITS_WEIGHTS)?;
        let (dw2, db2, mut dh) = affine_backward(hidden.view(), w2, d_logits);
        dh.zip_mut_with(&hidden, |d, &h| {
            if h <= 0. {
                *d = 0.;
            }
        });

        let w1 = matrix(vars.require(HIDDEN_WEIGHTS)?, HIDDEN_WEIGHTS)?;
        let (dw1, db1, _) = affine_backward(x.view(), w1, dh.view());

        let mut grads = Gradients::new();
        grads.insert(HIDDEN_WEIGHTS, dw1.into_dyn());
        grads.insert(HIDDEN_BIASES, db1.into_dyn());
        grads.insert(LOGITS_WEIGHTS, dw2.into_dyn());
        grads.insert(LOGITS_BIASES, db2.into_dyn());
        Ok(grads)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::IxDyn;

    use super::*;
    use crate::network::testing::{check_gradients, random_vars};

    fn params() -> NetworkParams {
        NetworkParams {
            input_shape: vec![2, 2],
            num_outputs: 3,
            hidden_units: 5,
        }
    }

    fn inputs() -> Tensor {
        let values = (0..12).map(|i| (i as f32 * 0.37).sin()).collect();
        Tensor::from_shape_vec(IxDyn(&[3, 2, 2]), values).unwrap()
    }

    #[test]
    fn forward_flattens_samples() {
        let net = Mlp::new();
        let vars = random_vars(&net, &params());

        let out = net.forward(&vars, &inputs(), &params(), Mode::Eval).unwrap();

        assert_eq!(out.logits.dim(), (3, 3));
        assert_eq!(out.aux["features"].shape(), &[3, 5]);
    }

    #[test]
    fn wrong_input_width_is_an_error() {
        let net = Mlp::new();
        let vars = random_vars(&net, &params());
        let bad = Tensor::zeros(IxDyn(&[3, 5]));

        assert!(net.forward(&vars, &bad, &params(), Mode::Eval).is_err());
    }

    #[test]
    fn backward_matches_finite_differences() {
        check_gradients(&Mlp::new(), &params(), &inputs(), &[0, 2, 1]);
    }
}
