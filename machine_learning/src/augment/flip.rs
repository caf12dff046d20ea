use ndarray::Axis;
use rand::{Rng, RngCore};

use super::Augmenter;
use crate::Tensor;

/// Mirrors `[height, width, ..]` samples along the width with a given probability.
#[derive(Debug, Clone, Copy)]
pub struct HorizontalFlip {
    probability: f64,
}

impl HorizontalFlip {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0., 1.),
        }
    }
}

impl Default for HorizontalFlip {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Augmenter for HorizontalFlip {
    fn name(&self) -> &str {
        "horizontal_flip"
    }

    fn augment(&self, mut sample: Tensor, rng: &mut dyn RngCore) -> Tensor {
        if sample.ndim() < 2 || !rng.random_bool(self.probability) {
            return sample;
        }

        sample.invert_axis(Axis(1));
        sample.as_standard_layout().into_owned()
    }
}
