mod codec;
mod restore;
mod store;

pub use codec::{read_tensors, write_tensors};
pub use restore::{Checkpoint, FilteredRestore};
pub use store::{CheckpointEntry, CheckpointStore, latest_checkpoint};

/// The metadata key and filter name of the global step counter.
pub const GLOBAL_STEP: &str = "global_step";
