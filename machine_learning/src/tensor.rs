use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, CowArray, Ix1, Ix2};

use crate::{MlErr, Result};

/// The dense, row major tensor type every component exchanges.
pub type Tensor = ArrayD<f32>;

/// Views a tensor as a matrix of `shape[0]` rows, flattening every trailing axis.
///
/// # Arguments
/// * `tensor` - The tensor to view.
/// * `what` - A name for the tensor used in errors.
///
/// # Returns
/// A possibly borrowed matrix or a `ShapeMismatch` error for scalars.
pub fn as_matrix<'a>(tensor: &'a Tensor, what: &str) -> Result<CowArray<'a, f32, Ix2>> {
    let shape = tensor.shape();
    let Some(&rows) = shape.first() else {
        return Err(MlErr::ShapeMismatch {
            what: what.to_string(),
            got: shape.to_vec(),
            expected: vec![0, 0],
        });
    };

    let cols = shape[1..].iter().product();
    tensor
        .to_shape((rows, cols))
        .map_err(|_| MlErr::ShapeMismatch {
            what: what.to_string(),
            got: shape.to_vec(),
            expected: vec![rows, cols],
        })
}

/// Views a tensor of rank 2 as a matrix.
pub fn matrix<'a>(tensor: &'a Tensor, what: &str) -> Result<ArrayView2<'a, f32>> {
    tensor
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| MlErr::ShapeMismatch {
            what: what.to_string(),
            got: tensor.shape().to_vec(),
            expected: vec![0, 0],
        })
}

/// Views a tensor of rank 1 as a vector.
pub fn vector<'a>(tensor: &'a Tensor, what: &str) -> Result<ArrayView1<'a, f32>> {
    tensor
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| MlErr::ShapeMismatch {
            what: what.to_string(),
            got: tensor.shape().to_vec(),
            expected: vec![0],
        })
}

/// Row-wise numerically stable softmax.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut out = logits.to_owned();

    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }

    out
}

/// Returns the index of the largest value of each row.
pub fn argmax_rows(x: ArrayView2<f32>) -> Vec<usize> {
    x.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
                    if v > max { (i, v) } else { (best, max) }
                })
                .0
        })
        .collect()
}

/// Converts a tensor of integral labels into class indices.
///
/// # Arguments
/// * `labels` - The labels, any shape, flattened in row major order.
/// * `limit` - The amount of classes.
///
/// # Returns
/// The indices or an `IndexOutOfRange` error for negative, fractional or too large labels.
pub fn class_indices(labels: &Tensor, limit: usize) -> Result<Vec<usize>> {
    labels
        .iter()
        .map(|&v| {
            if v < 0. || v.fract() != 0. || v as usize >= limit {
                return Err(MlErr::IndexOutOfRange {
                    index: v as i64,
                    limit,
                });
            }
            Ok(v as usize)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::{IxDyn, array};

    use super::*;

    #[test]
    fn softmax_rows_sum_to_one() {
        let logits = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]];
        let probs = softmax(logits.view());

        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!((probs[[1, 0]] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn argmax_picks_first_maximum() {
        let x = array![[0.1, 0.7, 0.2], [0.5, 0.5, 0.0]];
        assert_eq!(argmax_rows(x.view()), vec![1, 0]);
    }

    #[test]
    fn matrix_view_flattens_trailing_axes() {
        let t = Tensor::zeros(IxDyn(&[4, 2, 3]));
        let m = as_matrix(&t, "images").unwrap();
        assert_eq!(m.dim(), (4, 6));
    }

    #[test]
    fn class_indices_rejects_out_of_range() {
        let labels = Tensor::from_shape_vec(IxDyn(&[3]), vec![0., 2., 1.]).unwrap();
        assert_eq!(class_indices(&labels, 3).unwrap(), vec![0, 2, 1]);
        assert!(class_indices(&labels, 2).is_err());

        let negative = Tensor::from_shape_vec(IxDyn(&[1]), vec![-1.]).unwrap();
        assert!(class_indices(&negative, 2).is_err());
    }
}
