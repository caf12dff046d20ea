use std::num::NonZeroUsize;

use machine_learning::Mode;
use serde::{Deserialize, Serialize};

/// The parameters every role shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,
    pub batch_size_per_gpu: NonZeroUsize,
    #[serde(alias = "gpu_count")]
    pub device_count: NonZeroUsize,
}

impl Config {
    pub fn new(mode: Mode, batch_size_per_gpu: NonZeroUsize, device_count: NonZeroUsize) -> Self {
        Self {
            mode,
            batch_size_per_gpu,
            device_count,
        }
    }

    /// The amount of samples one step consumes across every device.
    pub fn global_batch_size(&self) -> usize {
        self.batch_size_per_gpu.get() * self.device_count.get()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Mode::Train, NonZeroUsize::MIN, NonZeroUsize::MIN)
    }
}
