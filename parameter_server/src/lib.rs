pub mod checkpoint;
pub mod error;
pub mod initialization;
pub mod storage;

pub use checkpoint::{Checkpoint, CheckpointStore, FilteredRestore};
pub use error::{Result, StoreErr};
pub use storage::{VariableScope, VariableStore};
