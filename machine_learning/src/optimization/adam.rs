use super::{Optimizer, optimizer::check_len};
use crate::Result;

/// Adaptive moment estimation, with bias corrected first and second moments.
#[derive(Debug)]
pub struct Adam {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    /// The updates applied so far.
    t: i32,
    m: Box<[f32]>,
    v: Box<[f32]>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters of the variable.
    /// * `beta1` - The decay of the first moment.
    /// * `beta2` - The decay of the second moment.
    /// * `epsilon` - Keeps the denominator away from zero.
    pub fn new(len: usize, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, lr: f32, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(grad, params, self.m.len())?;

        self.t = self.t.saturating_add(1);
        let Self {
            beta1,
            beta2,
            epsilon,
            t,
            ..
        } = *self;

        let lr_t = lr * (1. - beta2.powi(t)).sqrt() / (1. - beta1.powi(t));

        for ((p, g), (m, v)) in params
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut().zip(self.v.iter_mut()))
        {
            *m = beta1 * *m + (1. - beta1) * g;
            *v = beta2 * *v + (1. - beta2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + epsilon);
        }

        Ok(())
    }
}
