use rand::RngCore;
use rand_distr::{Distribution, Normal};

use super::Augmenter;
use crate::{MlErr, Result, Tensor};

/// Adds zero mean gaussian noise to every value.
#[derive(Debug, Clone, Copy)]
pub struct GaussianNoise {
    normal: Normal<f32>,
}

impl GaussianNoise {
    /// Creates a new `GaussianNoise` augmenter.
    ///
    /// # Arguments
    /// * `std_dev` - The noise's standard deviation, must be finite and not negative.
    pub fn new(std_dev: f32) -> Result<Self> {
        if !std_dev.is_finite() || std_dev < 0. {
            return Err(MlErr::InvalidParameter(format!(
                "noise std_dev must be finite and not negative, got {std_dev}"
            )));
        }

        let normal = Normal::new(0., std_dev)
            .map_err(|e| MlErr::InvalidParameter(format!("noise std_dev {std_dev}: {e}")))?;

        Ok(Self { normal })
    }
}

impl Augmenter for GaussianNoise {
    fn name(&self) -> &str {
        "gaussian_noise"
    }

    fn augment(&self, mut sample: Tensor, rng: &mut dyn RngCore) -> Tensor {
        sample.mapv_inplace(|v| v + self.normal.sample(&mut *rng));
        sample
    }
}

#[cfg(test)]
mod tests {
    use ndarray::IxDyn;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn noise_keeps_shape_and_changes_values() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = GaussianNoise::new(0.1).unwrap();
        let sample = Tensor::zeros(IxDyn(&[4, 4, 1]));

        let out = noise.augment(sample.clone(), &mut rng);

        assert_eq!(out.shape(), sample.shape());
        assert!(out.iter().any(|&v| v != 0.));
        assert!(out.iter().all(|v| v.abs() < 1.));
    }

    #[test]
    fn negative_std_dev_is_rejected() {
        assert!(GaussianNoise::new(-1.).is_err());
        assert!(GaussianNoise::new(-f32::MIN_POSITIVE).is_err());
        assert!(GaussianNoise::new(f32::NAN).is_err());
        assert!(GaussianNoise::new(f32::INFINITY).is_err());
    }

    #[test]
    fn zero_std_dev_leaves_samples_unchanged() {
        let mut rng = StdRng::seed_from_u64(3);
        let sample = Tensor::from_elem(vec![2, 2], 0.5);

        let out = GaussianNoise::new(0.).unwrap().augment(sample.clone(), &mut rng);

        assert_eq!(out, sample);
    }
}
