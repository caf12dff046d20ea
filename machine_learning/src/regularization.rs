use crate::{Gradients, Result, VariableView};

/// Computes the L2 penalty `decay * Σ ½‖v‖²` over the named variables.
///
/// # Arguments
/// * `vars` - Where the variables are read from.
/// * `names` - The variables to regularize.
/// * `decay` - The weight decay coefficient.
///
/// # Returns
/// The penalty and its gradient, `decay * v` for each variable.
pub fn l2_loss<'a, I>(vars: &dyn VariableView, names: I, decay: f32) -> Result<(f32, Gradients)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut penalty = 0.;
    let mut grads = Gradients::new();

    for name in names {
        let v = vars.require(name)?;
        penalty += 0.5 * v.iter().map(|x| x * x).sum::<f32>();
        grads.insert(name, v.mapv(|x| decay * x));
    }

    Ok((decay * penalty, grads))
}
