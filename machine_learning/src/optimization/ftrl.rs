use super::{Optimizer, optimizer::check_len};
use crate::Result;

/// Follow the regularized leader, with optional L1 and L2 strengths.
#[derive(Debug)]
pub struct Ftrl {
    lr_power: f32,
    l1: f32,
    l2: f32,
    accum: Box<[f32]>,
    linear: Box<[f32]>,
}

impl Ftrl {
    /// Creates a new `Ftrl` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `lr_power` - How the learning rate decays with the accumulator, zero or negative.
    /// * `initial_accumulator` - The starting value of every accumulator, must be positive.
    /// * `l1`, `l2` - Regularization strengths.
    pub fn new(len: usize, lr_power: f32, initial_accumulator: f32, l1: f32, l2: f32) -> Self {
        Self {
            lr_power,
            l1,
            l2,
            accum: vec![initial_accumulator; len].into_boxed_slice(),
            linear: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Ftrl {
    fn update_params(&mut self, lr: f32, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(grad, params, self.accum.len())?;

        let Self {
            lr_power, l1, l2, ..
        } = *self;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.accum.iter_mut().zip(self.linear.iter_mut()))
            .for_each(|((p, g), (a, z))| {
                let new_accum = *a + g * g;
                let sigma = (new_accum.powf(-lr_power) - a.powf(-lr_power)) / lr;
                *z += g - sigma * *p;

                let quadratic = new_accum.powf(-lr_power) / lr + 2. * l2;
                *p = if z.abs() > l1 {
                    (l1 * z.signum() - *z) / quadratic
                } else {
                    0.
                };
                *a = new_accum;
            });

        Ok(())
    }
}
