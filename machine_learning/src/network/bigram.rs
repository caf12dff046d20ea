use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2, Axis};

use super::{NetOutput, Network, NetworkParams, affine, affine_backward};
use crate::{
    Gradients, Init, Mode, Result, Tensor, VariableSpec, VariableView,
    tensor::{as_matrix, class_indices, matrix, vector},
};

const EMBEDDING: &str = "bigram/embedding";
const LOGITS_WEIGHTS: &str = "bigram/logits/weights";
const LOGITS_BIASES: &str = "bigram/logits/biases";

/// Predicts the next token from the current one through a learned embedding.
///
/// Inputs are `[batch, length]` token ids; the logits have one row per position, in row major
/// order. `last_state` holds the embedding of each sequence's final position.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bigram;

impl Bigram {
    pub fn new() -> Self {
        Self
    }

    /// Looks up the embedding of every token.
    ///
    /// # Returns
    /// The token ids, the sequence length and one embedding row per token.
    fn embed(
        &self,
        vars: &dyn VariableView,
        inputs: &Tensor,
        params: &NetworkParams,
    ) -> Result<(Vec<usize>, usize, Array2<f32>)> {
        let tokens = as_matrix(inputs, "bigram inputs")?;
        let ids = class_indices(inputs, params.num_outputs)?;
        let embedding = matrix(vars.require(EMBEDDING)?, EMBEDDING)?;

        let embedded = embedding.select(Axis(0), &ids);
        Ok((ids, tokens.ncols(), embedded))
    }
}

impl Network for Bigram {
    fn name(&self) -> &str {
        "bigram"
    }

    fn variables(&self, params: &NetworkParams) -> Vec<VariableSpec> {
        let vocab = params.num_outputs;
        let dim = params.hidden_units;

        vec![
            VariableSpec::new(
                EMBEDDING,
                &[vocab, dim],
                Init::Uniform {
                    low: -0.1,
                    high: 0.1,
                },
            ),
            VariableSpec::new(LOGITS_WEIGHTS, &[dim, vocab], Init::XavierUniform),
            VariableSpec::new(LOGITS_BIASES, &[vocab], Init::Zeros),
        ]
    }

    fn forward(
        &self,
        vars: &dyn VariableView,
        inputs: &Tensor,
        params: &NetworkParams,
        _mode: Mode,
    ) -> Result<NetOutput> {
        let (_, length, embedded) = self.embed(vars, inputs, params)?;

        let w = matrix(vars.require(LOGITS_WEIGHTS)?, LOGITS_WEIGHTS)?;
        let b = vector(vars.require(LOGITS_BIASES)?, LOGITS_BIASES)?;
        let logits = affine(embedded.view(), w, b, LOGITS_WEIGHTS)?;

        let last: Vec<usize> = (1..=embedded.nrows() / length.max(1))
            .map(|seq| seq * length - 1)
            .collect();
        let last_state = embedded.select(Axis(0), &last);

        let mut aux = BTreeMap::new();
        aux.insert("last_state".to_string(), last_state.into_dyn());

        Ok(NetOutput { logits, aux })
    }

    fn backward(
        &self,
        vars: &dyn VariableView,
        inputs: &Tensor,
        params: &NetworkParams,
        d_logits: ArrayView2<f32>,
    ) -> Result<Gradients> {
        let (ids, _, embedded) = self.embed(vars, inputs, params)?;

        let w = matrix(vars.require(LOGITS_WEIGHTS)?, LOGITS_WEIGHTS)?;
        let (dw, db, de) = affine_backward(embedded.view(), w, d_logits);

        let embedding = vars.require(EMBEDDING)?;
        let mut d_embedding = Array2::<f32>::zeros((embedding.shape()[0], embedding.shape()[1]));
        for (row, &id) in de.rows().into_iter().zip(&ids) {
            let mut target = d_embedding.row_mut(id);
            target += &row;
        }

        let mut grads = Gradients::new();
        grads.insert(EMBEDDING, d_embedding.into_dyn());
        grads.insert(LOGITS_WEIGHTS, dw.into_dyn());
        grads.insert(LOGITS_BIASES, db.into_dyn());
        Ok(grads)
    }
}
