mod cross_entropy;

pub use cross_entropy::SparseSoftmaxCrossEntropy;

use ndarray::{Array2, ArrayView2};

/// A loss over a batch of logits and their class indices.
pub trait LossFn: Send + Sync {
    /// The mean loss over the batch.
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> f32;

    /// The derivative of `loss` with respect to `logits`.
    fn loss_prime(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Array2<f32>;
}
