mod constant;
mod error;
mod param_gen;
mod random;

pub use constant::ConstParamGen;
pub use error::{InitErr, Result};
pub use param_gen::ParamGen;
pub use random::RandParamGen;

use machine_learning::{Init, VariableSpec};

/// Resolves the parameter generator a variable declares.
///
/// # Arguments
/// * `spec` - The variable's declaration, its shape gives the fans of the scaled initializers.
///
/// # Returns
/// The generator or an error if the declared distribution is invalid.
pub fn param_gen_for(spec: &VariableSpec) -> Result<Box<dyn ParamGen>> {
    let fan_in = spec.fan_in().max(1);
    let fan_out = spec.fan_out().max(1);

    Ok(match spec.init {
        Init::Zeros => Box::new(ConstParamGen::new(0.)),
        Init::Const { value } => Box::new(ConstParamGen::new(value)),
        Init::Uniform { low, high } => Box::new(RandParamGen::uniform(low, high)?),
        Init::Normal { mean, std_dev } => Box::new(RandParamGen::normal(mean, std_dev)?),
        Init::XavierUniform => Box::new(RandParamGen::xavier_uniform(fan_in, fan_out)?),
        Init::Kaiming => Box::new(RandParamGen::kaiming(fan_in)?),
        Init::Lecun => Box::new(RandParamGen::lecun(fan_in)?),
    })
}
