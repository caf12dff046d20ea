use rand::RngCore;
use rand_distr::{Distribution, Normal, NormalError, Uniform};

use super::{ParamGen, Result};

/// A parameter generator that follows a certain probabilistic distribution.
#[derive(Debug, Clone, Copy)]
pub struct RandParamGen<D: Distribution<f32>> {
    distribution: D,
}

impl<D: Distribution<f32>> RandParamGen<D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `distribution` - The distribution to sample the random numbers from.
    pub fn new(distribution: D) -> Self {
        Self { distribution }
    }
}

impl RandParamGen<Uniform<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(Uniform::new(low, high)?))
    }

    /// Creates a new `RandParamGen` parameter generator using Xavier uniform initialization.
    ///
    /// # Arguments
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated range is invalid.
    pub fn xavier_uniform(fan_in: usize, fan_out: usize) -> Result<Self> {
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(-range, range)
    }
}

impl RandParamGen<Normal<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a normal distribution.
    ///
    /// # Arguments
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is negative or not finite.
    pub fn normal(mean: f32, std_dev: f32) -> Result<Self> {
        if !std_dev.is_finite() || std_dev < 0. {
            return Err(NormalError::BadVariance.into());
        }

        Ok(Self::new(Normal::new(mean, std_dev)?))
    }

    /// Creates a new `RandParamGen` parameter generator using Kaiming normal initialization.
    ///
    /// # Arguments
    /// * `fan_in` - The number of input units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated standard deviation is not finite (Nan or infinite).
    pub fn kaiming(fan_in: usize) -> Result<Self> {
        let std_dev = (2. / fan_in as f32).sqrt();
        Self::normal(0., std_dev)
    }

    /// Creates a new `RandParamGen` parameter generator using LeCun normal initialization.
    ///
    /// # Arguments
    /// * `fan_in` - The number of input units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated standard deviation is not finite (Nan or infinite).
    pub fn lecun(fan_in: usize) -> Result<Self> {
        let std_dev = (1. / fan_in as f32).sqrt();
        Self::normal(0., std_dev)
    }
}

impl<D: Distribution<f32>> ParamGen for RandParamGen<D> {
    fn sample(&self, rng: &mut dyn RngCore, n: usize) -> Vec<f32> {
        (0..n).map(|_| self.distribution.sample(&mut *rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let param_gen = RandParamGen::xavier_uniform(4, 2).unwrap();

        let sample = param_gen.sample(&mut rng, 100);

        assert_eq!(sample.len(), 100);
        assert!(sample.iter().all(|v| v.abs() <= 1.));
    }

    #[test]
    fn same_seed_same_values() {
        let param_gen = RandParamGen::kaiming(8).unwrap();

        let a = param_gen.sample(&mut StdRng::seed_from_u64(1), 5);
        let b = param_gen.sample(&mut StdRng::seed_from_u64(1), 5);

        assert_eq!(a, b);
    }

    #[test]
    fn invalid_distributions_are_rejected() {
        assert!(RandParamGen::uniform(1., 1.).is_err());
        assert!(RandParamGen::normal(0., -1.).is_err());
        assert!(RandParamGen::normal(0., -0.01).is_err());
        assert!(RandParamGen::normal(0., f32::NAN).is_err());
        assert!(RandParamGen::normal(0., f32::INFINITY).is_err());
    }

    #[test]
    fn zero_std_dev_samples_the_mean() {
        let param_gen = RandParamGen::normal(0.25, 0.).unwrap();

        let sample = param_gen.sample(&mut StdRng::seed_from_u64(7), 4);

        assert_eq!(sample, vec![0.25; 4]);
    }
}
