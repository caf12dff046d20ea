use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{
    Adadelta, Adagrad, Adam, Ftrl, GradientDescent, GradientDescentWithMomentum, Optimizer,
    RmsProp,
};
use crate::MlErr;

/// The optimizers that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    Momentum,
    Adam,
    Adagrad,
    Adadelta,
    Rmsprop,
    Ftrl,
}

impl OptimizerKind {
    pub const ALL: [OptimizerKind; 7] = [
        Self::Sgd,
        Self::Momentum,
        Self::Adam,
        Self::Adagrad,
        Self::Adadelta,
        Self::Rmsprop,
        Self::Ftrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sgd => "sgd",
            Self::Momentum => "momentum",
            Self::Adam => "adam",
            Self::Adagrad => "adagrad",
            Self::Adadelta => "adadelta",
            Self::Rmsprop => "rmsprop",
            Self::Ftrl => "ftrl",
        }
    }

    /// Builds the optimizer state for a variable of `len` elements with the default hyperparameters.
    pub fn build(&self, len: usize) -> Box<dyn Optimizer> {
        match self {
            Self::Sgd => Box::new(GradientDescent::new(len)),
            Self::Momentum => Box::new(GradientDescentWithMomentum::new(len, 0.9)),
            Self::Adam => Box::new(Adam::new(len, 0.9, 0.999, 1e-8)),
            Self::Adagrad => Box::new(Adagrad::new(len, 0.1)),
            Self::Adadelta => Box::new(Adadelta::new(len, 0.95, 1e-8)),
            Self::Rmsprop => Box::new(RmsProp::new(len, 0.9, 0., 1e-10)),
            Self::Ftrl => Box::new(Ftrl::new(len, -0.5, 0.1, 0., 0.)),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKind {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MlErr::UnknownOptimizer(s.to_string()))
    }
}
