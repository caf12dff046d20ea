use super::{Optimizer, optimizer::check_len};
use crate::Result;

/// Scales each parameter's step by the inverse root of its accumulated squared gradients.
#[derive(Debug)]
pub struct Adagrad {
    accum: Box<[f32]>,
}

impl Adagrad {
    /// Creates a new `Adagrad` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `initial_accumulator` - The starting value of every accumulator, must be positive.
    pub fn new(len: usize, initial_accumulator: f32) -> Self {
        Self {
            accum: vec![initial_accumulator; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Adagrad {
    fn update_params(&mut self, lr: f32, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(grad, params, self.accum.len())?;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.accum.iter_mut())
            .for_each(|((p, g), a)| {
                *a += g * g;
                *p -= lr * g / a.sqrt();
            });

        Ok(())
    }
}
