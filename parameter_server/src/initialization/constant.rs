use rand::RngCore;

use super::ParamGen;

/// A parameter generator that always generates the same value.
#[derive(Debug, Clone, Copy)]
pub struct ConstParamGen {
    value: f32,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `value` - The value to always generate.
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&self, _rng: &mut dyn RngCore, n: usize) -> Vec<f32> {
        vec![self.value; n]
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn repeats_the_value() {
        let mut rng = StdRng::seed_from_u64(0);
        let param_gen = ConstParamGen::new(0.5);

        assert_eq!(param_gen.sample(&mut rng, 3), vec![0.5; 3]);
        assert!(param_gen.sample(&mut rng, 0).is_empty());
    }
}
