use super::{Optimizer, optimizer::check_len};
use crate::Result;

#[derive(Debug)]
pub struct RmsProp {
    decay: f32,
    momentum: f32,
    epsilon: f32,
    ms: Box<[f32]>,
    mom: Box<[f32]>,
}

impl RmsProp {
    /// Creates a new `RmsProp` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `decay` - The discount of the running mean square.
    /// * `momentum` - The momentum applied to the scaled step.
    /// * `epsilon` - Keeps the denominator away from zero.
    ///
    /// The mean square starts at one so that the first steps stay small.
    pub fn new(len: usize, decay: f32, momentum: f32, epsilon: f32) -> Self {
        Self {
            decay,
            momentum,
            epsilon,
            ms: vec![1.; len].into_boxed_slice(),
            mom: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for RmsProp {
    fn update_params(&mut self, lr: f32, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(grad, params, self.ms.len())?;

        let Self {
            decay,
            momentum,
            epsilon: eps,
            ..
        } = *self;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.ms.iter_mut().zip(self.mom.iter_mut()))
            .for_each(|((p, g), (ms, mom))| {
                *ms = decay * *ms + (1. - decay) * g * g;
                *mom = momentum * *mom + lr * g / (*ms + eps).sqrt();
                *p -= *mom;
            });

        Ok(())
    }
}
