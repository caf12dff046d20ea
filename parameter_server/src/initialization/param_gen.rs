use rand::RngCore;

/// A `ParamGen` generates values for the initial state of a variable.
pub trait ParamGen {
    /// Samples `n` values.
    ///
    /// # Arguments
    /// * `rng` - The random number generator to draw from.
    /// * `n` - The amount of values to generate.
    fn sample(&self, rng: &mut dyn RngCore, n: usize) -> Vec<f32>;
}
