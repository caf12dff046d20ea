use rand_distr::{NormalError, uniform::Error as UniformError};
use thiserror::Error;

/// The specific result type for building parameter generators.
pub type Result<T> = std::result::Result<T, InitErr>;

/// Error returned by the `RandParamGen` constructors whenever the distribution can't be built,
/// each constructor has it's own constraints given that they use different distributions.
#[derive(Debug, Error)]
pub enum InitErr {
    #[error("invalid normal distribution: {0}")]
    Normal(#[from] NormalError),

    #[error("invalid uniform distribution: {0}")]
    Uniform(#[from] UniformError),
}
