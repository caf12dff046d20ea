use ndarray::ArrayView2;

use crate::tensor::argmax_rows;

/// The fraction of rows whose largest logit is at the label's index.
pub fn accuracy(logits: ArrayView2<f32>, labels: &[usize]) -> f32 {
    if labels.is_empty() {
        return 0.;
    }

    let hits = argmax_rows(logits)
        .into_iter()
        .zip(labels)
        .filter(|(pred, label)| pred == *label)
        .count();

    hits as f32 / labels.len() as f32
}
