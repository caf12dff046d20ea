use thiserror::Error;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Error)]
pub enum MlErr {
    #[error("there's a size mismatch between {a} and {b}, got {got} and expected {expected}")]
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("shape mismatch for {what}: got {got:?}, expected {expected:?}")]
    ShapeMismatch {
        what: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },

    #[error("the variable `{0}` is not present in the namespace")]
    MissingVariable(String),

    #[error("index {index} is out of range, the limit is {limit}")]
    IndexOutOfRange { index: i64, limit: usize },

    #[error("invalid learning rate schedule: {0}")]
    InvalidSchedule(String),

    #[error("unknown optimizer `{0}`")]
    UnknownOptimizer(String),

    #[error("unknown mode `{0}`")]
    UnknownMode(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
