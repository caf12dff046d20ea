use ndarray::{Array2, ArrayView2};

use super::LossFn;
use crate::tensor::softmax;

/// Softmax cross entropy against integer class labels, averaged over the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SparseSoftmaxCrossEntropy;

impl SparseSoftmaxCrossEntropy {
    /// Returns a new `SparseSoftmaxCrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for SparseSoftmaxCrossEntropy {
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> f32 {
        let n = logits.nrows();
        if n == 0 {
            return 0.;
        }

        let total: f32 = logits
            .rows()
            .into_iter()
            .zip(labels)
            .map(|(row, &label)| {
                let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                let log_sum_exp = row.iter().map(|v| (v - max).exp()).sum::<f32>().ln() + max;
                log_sum_exp - row[label]
            })
            .sum();

        total / n as f32
    }

    fn loss_prime(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Array2<f32> {
        let n = logits.nrows().max(1) as f32;
        let mut d = softmax(logits);

        for (mut row, &label) in d.rows_mut().into_iter().zip(labels) {
            row[label] -= 1.;
            row.mapv_inplace(|v| v / n);
        }

        d
    }
}
