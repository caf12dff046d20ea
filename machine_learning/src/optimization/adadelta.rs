use super::{Optimizer, optimizer::check_len};
use crate::Result;

#[derive(Debug)]
pub struct Adadelta {
    rho: f32,
    epsilon: f32,
    accum: Box<[f32]>,
    accum_update: Box<[f32]>,
}

impl Adadelta {
    /// Creates a new `Adadelta` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `rho` - The decay rate of both running averages.
    /// * `epsilon` - Keeps the ratio of the running averages finite.
    pub fn new(len: usize, rho: f32, epsilon: f32) -> Self {
        Self {
            rho,
            epsilon,
            accum: vec![0.; len].into_boxed_slice(),
            accum_update: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Adadelta {
    fn update_params(&mut self, lr: f32, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(grad, params, self.accum.len())?;

        let Self { rho, epsilon: eps, .. } = *self;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.accum.iter_mut().zip(self.accum_update.iter_mut()))
            .for_each(|((p, g), (a, u))| {
                *a = rho * *a + (1. - rho) * g * g;
                let update = (*u + eps).sqrt() / (*a + eps).sqrt() * g;
                *u = rho * *u + (1. - rho) * update * update;
                *p -= lr * update;
            });

        Ok(())
    }
}
