mod bigram;
mod mlp;

pub use bigram::Bigram;
pub use mlp::Mlp;

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::{Gradients, MlErr, Mode, Result, Tensor, VariableSpec, VariableView};

/// Sizing the network needs before declaring its variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    /// The shape of one sample, without the batch axis.
    pub input_shape: Vec<usize>,
    /// The amount of classes, or the vocabulary size.
    pub num_outputs: usize,
    pub hidden_units: usize,
}

/// What a forward pass produces.
#[derive(Debug, Clone)]
pub struct NetOutput {
    /// One row per prediction.
    pub logits: Array2<f32>,
    pub aux: BTreeMap<String, Tensor>,
}

/// A differentiable function from a batch of inputs to logits.
///
/// Networks hold no values; every variable is read through a `VariableView` by the names
/// `variables` declares.
pub trait Network: Send + Sync {
    fn name(&self) -> &str;

    /// Declares every variable the network reads.
    fn variables(&self, params: &NetworkParams) -> Vec<VariableSpec>;

    /// Runs the forward pass.
    ///
    /// # Arguments
    /// * `vars` - Where the variables are read from.
    /// * `inputs` - A batch of inputs, the first axis is the batch.
    /// * `params` - The sizing used to declare the variables.
    /// * `mode` - The mode the pass runs in.
    fn forward(
        &self,
        vars: &dyn VariableView,
        inputs: &Tensor,
        params: &NetworkParams,
        mode: Mode,
    ) -> Result<NetOutput>;

    /// Computes the gradient of every variable given the gradient of the logits.
    ///
    /// # Arguments
    /// * `vars` - Where the variables are read from.
    /// * `inputs` - The batch the logits were computed from.
    /// * `params` - The sizing used to declare the variables.
    /// * `d_logits` - The gradient of the loss with respect to the logits.
    fn backward(
        &self,
        vars: &dyn VariableView,
        inputs: &Tensor,
        params: &NetworkParams,
        d_logits: ArrayView2<f32>,
    ) -> Result<Gradients>;
}

/// Computes `x · w + b`, checking the shapes first.
pub(crate) fn affine(
    x: ArrayView2<f32>,
    w: ArrayView2<f32>,
    b: ArrayView1<f32>,
    what: &str,
) -> Result<Array2<f32>> {
    if x.ncols() != w.nrows() || w.ncols() != b.len() {
        return Err(MlErr::ShapeMismatch {
            what: what.to_string(),
            got: vec![x.nrows(), x.ncols()],
            expected: vec![x.nrows(), w.nrows()],
        });
    }

    Ok(x.dot(&w) + &b)
}

/// The gradients of `x · w + b` with respect to `w`, `b` and `x`.
pub(crate) fn affine_backward(
    x: ArrayView2<f32>,
    w: ArrayView2<f32>,
    d: ArrayView2<f32>,
) -> (Array2<f32>, Array1<f32>, Array2<f32>) {
    let dw = x.t().dot(&d);
    let db = d.sum_axis(Axis(0));
    let dx = d.dot(&w.t());
    (dw, db, dx)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;

    use ndarray::Array2;
    use rand::{SeedableRng, rngs::StdRng};
    use rand_distr::{Distribution, Normal};

    use super::{Network, NetworkParams};
    use crate::{
        Mode, Tensor,
        loss::{LossFn, SparseSoftmaxCrossEntropy},
    };

    /// Random values for every declared variable.
    pub fn random_vars(net: &dyn Network, params: &NetworkParams) -> BTreeMap<String, Tensor> {
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::new(0., 0.5).unwrap();

        net.variables(params)
            .into_iter()
            .map(|spec| {
                let values = (0..spec.numel()).map(|_| normal.sample(&mut rng)).collect();
                let t = Tensor::from_shape_vec(spec.shape.clone(), values).unwrap();
                (spec.name, t)
            })
            .collect()
    }

    fn loss_of(
        net: &dyn Network,
        vars: &BTreeMap<String, Tensor>,
        inputs: &Tensor,
        params: &NetworkParams,
        labels: &[usize],
    ) -> f32 {
        let out = net.forward(vars, inputs, params, Mode::Train).unwrap();
        SparseSoftmaxCrossEntropy.loss(out.logits.view(), labels)
    }

    /// Compares the analytic gradient of every variable with central differences.
    pub fn check_gradients(
        net: &dyn Network,
        params: &NetworkParams,
        inputs: &Tensor,
        labels: &[usize],
    ) {
        let vars = random_vars(net, params);
        let out = net.forward(&vars, inputs, params, Mode::Train).unwrap();
        let d: Array2<f32> = SparseSoftmaxCrossEntropy.loss_prime(out.logits.view(), labels);
        let grads = net.backward(&vars, inputs, params, d.view()).unwrap();

        assert_eq!(grads.len(), vars.len());

        let eps = 1e-3;
        for (name, grad) in grads.iter() {
            for i in 0..grad.len() {
                let mut plus = vars.clone();
                plus.get_mut(name).unwrap().as_slice_mut().unwrap()[i] += eps;
                let mut minus = vars.clone();
                minus.get_mut(name).unwrap().as_slice_mut().unwrap()[i] -= eps;

                let numeric = (loss_of(net, &plus, inputs, params, labels)
                    - loss_of(net, &minus, inputs, params, labels))
                    / (2. * eps);
                let analytic = grad.as_slice().unwrap()[i];

                assert!(
                    (numeric - analytic).abs() < 1e-2,
                    "{name}[{i}]: numeric {numeric}, analytic {analytic}"
                );
            }
        }
    }
}
