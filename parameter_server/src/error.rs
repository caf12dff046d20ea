use std::{io, path::PathBuf};

use machine_learning::MlErr;
use safetensors::SafeTensorError;
use thiserror::Error;

use crate::initialization::InitErr;

/// The result type used across the parameter server.
pub type Result<T> = std::result::Result<T, StoreErr>;

/// Errors raised by the variable store and the checkpoint store.
#[derive(Debug, Error)]
pub enum StoreErr {
    #[error("variable `{name}` already exists with shape {existing:?}, requested {requested:?}")]
    ShapeConflict {
        name: String,
        existing: Vec<usize>,
        requested: Vec<usize>,
    },

    #[error("device {device} requested `{name}`, which device 0 never created")]
    UnsharedVariable { name: String, device: usize },

    #[error("the variable `{0}` doesn't exist")]
    MissingVariable(String),

    #[error("can't initialize `{name}`: {source}")]
    Init {
        name: String,
        #[source]
        source: InitErr,
    },

    #[error("`{name}` has shape {checkpoint:?} in the checkpoint but {store:?} in the store")]
    RestoreMismatch {
        name: String,
        checkpoint: Vec<usize>,
        store: Vec<usize>,
    },

    #[error("the checkpoint {path} has no value for `{name}`")]
    NotInCheckpoint { name: String, path: PathBuf },

    #[error("malformed checkpoint {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("keep_checkpoint_max must be at least 1")]
    ZeroRetention,

    #[error(transparent)]
    Ml(#[from] MlErr),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Safetensors(#[from] SafeTensorError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
