pub mod augment;
pub mod clip;
pub mod error;
pub mod filter;
pub mod loss;
pub mod metrics;
pub mod mode;
pub mod network;
pub mod optimization;
pub mod regularization;
pub mod schedule;
pub mod tensor;
pub mod variable;

pub use error::{MlErr, Result};
pub use filter::{NameFilter, TrainableFilter};
pub use mode::Mode;
pub use schedule::PiecewiseConstant;
pub use tensor::Tensor;
pub use variable::{Gradients, Init, VariableSpec, VariableView};
