mod flip;
mod noise;

pub use flip::HorizontalFlip;
pub use noise::GaussianNoise;

use rand::RngCore;

use crate::Tensor;

/// Transforms one sample into an augmented sample of the same shape.
pub trait Augmenter: Send + Sync {
    fn name(&self) -> &str;

    fn augment(&self, sample: Tensor, rng: &mut dyn RngCore) -> Tensor;
}
