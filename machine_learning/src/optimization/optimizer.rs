use crate::{MlErr, Result};

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer: Send {
    /// Updates the provided slice of parameters using the gradient.
    ///
    /// # Arguments
    /// * `learning_rate` - The learning rate for the current global step.
    /// * `grad` - A reference to the variable's gradient.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`.
    fn update_params(
        &mut self,
        learning_rate: f32,
        grad: &[f32],
        params: &mut [f32],
    ) -> Result<()>;
}

/// Checks that a gradient, the parameters and the optimizer's slot all have the same length.
pub(super) fn check_len(grad: &[f32], params: &[f32], slot: usize) -> Result<()> {
    if grad.len() != params.len() {
        return Err(MlErr::SizeMismatch {
            a: "gradient",
            b: "parameters",
            got: grad.len(),
            expected: params.len(),
        });
    }

    if params.len() != slot {
        return Err(MlErr::SizeMismatch {
            a: "parameters",
            b: "optimizer slot",
            got: params.len(),
            expected: slot,
        });
    }

    Ok(())
}
