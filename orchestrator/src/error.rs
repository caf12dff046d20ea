use std::{error::Error, io};

use machine_learning::MlErr;
use parameter_server::StoreErr;
use thiserror::Error;

/// The result type used in the entire orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// The error type callbacks return from their hooks.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// All errors that can occur while running a job.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed or contradictory configuration, caught before any replica is built.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Dataset metadata the model needs is missing.
    #[error("dataset unavailable: {0}")]
    DatasetUnavailable(String),

    /// A restored variable doesn't have the shape of the variable it's restored into.
    #[error("can't restore `{name}`: checkpoint shape {checkpoint:?}, model shape {model:?}")]
    RestoreMismatch {
        name: String,
        checkpoint: Vec<usize>,
        model: Vec<usize>,
    },

    /// A replica or the optimizer step failed.
    #[error("step {step} failed on device {device}: {source}")]
    StepExecution {
        step: u64,
        device: usize,
        #[source]
        source: Box<OrchestratorError>,
    },

    /// A callback hook failed.
    #[error("callback `{name}` failed: {source}")]
    Callback {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Store(StoreErr),

    #[error(transparent)]
    Ml(#[from] MlErr),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<StoreErr> for OrchestratorError {
    fn from(e: StoreErr) -> Self {
        match e {
            StoreErr::RestoreMismatch {
                name,
                checkpoint,
                store,
            } => Self::RestoreMismatch {
                name,
                checkpoint,
                model: store,
            },
            e => Self::Store(e),
        }
    }
}

impl OrchestratorError {
    /// Wraps `self` as the failure of `device` during `step`.
    pub(crate) fn at_step(self, step: u64, device: usize) -> Self {
        Self::StepExecution {
            step,
            device,
            source: Box::new(self),
        }
    }
}
