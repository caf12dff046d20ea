use machine_learning::Tensor;
use ndarray::{Axis, IxDyn};

use crate::error::{OrchestratorError, Result};

/// Every sample of a dataset held in memory, stacked along the first axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    inputs: Tensor,
    labels: Option<Tensor>,
}

impl Samples {
    /// Stacks `inputs` and `labels`, which must hold the same amount of samples.
    pub fn new(inputs: Tensor, labels: Option<Tensor>) -> Result<Self> {
        if inputs.ndim() == 0 {
            return Err(OrchestratorError::DatasetUnavailable(
                "samples must have a batch axis".into(),
            ));
        }

        if let Some(labels) = &labels
            && labels.shape().first() != inputs.shape().first()
        {
            return Err(OrchestratorError::DatasetUnavailable(format!(
                "{} inputs but {} labels",
                inputs.shape()[0],
                labels.shape().first().copied().unwrap_or(0)
            )));
        }

        Ok(Self { inputs, labels })
    }

    /// Builds samples from row major values.
    ///
    /// # Arguments
    /// * `shape` - The shape of one input sample.
    /// * `inputs` - Every input value, sample after sample.
    /// * `labels` - One label per sample, if the dataset has them.
    pub fn from_rows(shape: &[usize], inputs: Vec<f32>, labels: Option<Vec<f32>>) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel == 0 || inputs.len() % numel != 0 {
            return Err(OrchestratorError::DatasetUnavailable(format!(
                "{} values can't be split into samples of shape {shape:?}",
                inputs.len()
            )));
        }

        let n = inputs.len() / numel;
        let full_shape: Vec<usize> = std::iter::once(n).chain(shape.iter().copied()).collect();
        let inputs = Tensor::from_shape_vec(IxDyn(&full_shape), inputs)
            .map_err(|e| OrchestratorError::DatasetUnavailable(e.to_string()))?;

        let labels = labels
            .map(|labels| {
                let len = labels.len();
                Tensor::from_shape_vec(IxDyn(&[len]), labels)
                    .map_err(|e| OrchestratorError::DatasetUnavailable(e.to_string()))
            })
            .transpose()?;

        Self::new(inputs, labels)
    }

    pub fn len(&self) -> usize {
        self.inputs.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The shape of one input sample.
    pub fn sample_shape(&self) -> &[usize] {
        &self.inputs.shape()[1..]
    }

    pub fn has_labels(&self) -> bool {
        self.labels.is_some()
    }

    pub fn labels(&self) -> Option<&Tensor> {
        self.labels.as_ref()
    }

    /// Copies the samples at `indices`, in that order.
    pub fn gather(&self, indices: &[usize]) -> (Tensor, Option<Tensor>) {
        let inputs = self.inputs.select(Axis(0), indices);
        let labels = self.labels.as_ref().map(|l| l.select(Axis(0), indices));
        (inputs, labels)
    }

    /// Copies the input of sample `index`.
    pub fn input(&self, index: usize) -> Tensor {
        self.inputs.index_axis(Axis(0), index).to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_stacks_samples() {
        let samples =
            Samples::from_rows(&[2], vec![0., 1., 2., 3., 4., 5.], Some(vec![0., 1., 0.])).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples.sample_shape(), &[2]);

        let (inputs, labels) = samples.gather(&[2, 0]);
        assert_eq!(inputs.as_slice().unwrap(), &[4., 5., 0., 1.]);
        assert_eq!(labels.unwrap().as_slice().unwrap(), &[0., 0.]);
        assert_eq!(samples.input(1).as_slice().unwrap(), &[2., 3.]);
    }

    #[test]
    fn label_count_must_match() {
        let err = Samples::from_rows(&[2], vec![0.; 4], Some(vec![0.])).unwrap_err();

        assert!(matches!(err, OrchestratorError::DatasetUnavailable(_)));
    }

    #[test]
    fn ragged_values_are_rejected() {
        let err = Samples::from_rows(&[3], vec![0.; 4], None).unwrap_err();

        assert!(matches!(err, OrchestratorError::DatasetUnavailable(_)));
    }
}
