use crate::{MlErr, Result};

/// A learning rate that stays constant between boundaries.
///
/// The rate at `step` is `base_rate * decays[i]` where `i` is the amount of
/// boundaries `b` with `step >= b`.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseConstant {
    boundaries: Vec<u64>,
    values: Vec<f32>,
}

impl PiecewiseConstant {
    /// Creates a new `PiecewiseConstant` schedule.
    ///
    /// # Arguments
    /// * `base_rate` - The learning rate before any decay.
    /// * `boundaries` - Strictly increasing global steps where the rate changes.
    /// * `decays` - One multiplier per interval, that is `boundaries.len() + 1` of them.
    ///
    /// # Returns
    /// The schedule or an `InvalidSchedule` error.
    pub fn new(base_rate: f32, boundaries: Vec<u64>, decays: &[f32]) -> Result<Self> {
        if decays.len() != boundaries.len() + 1 {
            return Err(MlErr::InvalidSchedule(format!(
                "expected {} decay values for {} boundaries, got {}",
                boundaries.len() + 1,
                boundaries.len(),
                decays.len()
            )));
        }

        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MlErr::InvalidSchedule(format!(
                "boundaries must be strictly increasing, got {boundaries:?}"
            )));
        }

        let values = decays.iter().map(|d| base_rate * d).collect();
        Ok(Self { boundaries, values })
    }

    /// A schedule without boundaries.
    pub fn constant(rate: f32) -> Self {
        Self {
            boundaries: Vec::new(),
            values: vec![rate],
        }
    }

    /// Creates a schedule whose boundaries are given in epochs.
    ///
    /// # Arguments
    /// * `base_rate` - The learning rate before any decay.
    /// * `epochs` - The epoch boundaries.
    /// * `decays` - One multiplier per interval.
    /// * `steps_per_epoch` - The global steps one pass over the dataset takes.
    pub fn from_epochs(
        base_rate: f32,
        epochs: &[u64],
        decays: &[f32],
        steps_per_epoch: u64,
    ) -> Result<Self> {
        Self::new(base_rate, epochs_to_steps(epochs, steps_per_epoch), decays)
    }

    pub fn learning_rate(&self, step: u64) -> f32 {
        let i = self.boundaries.partition_point(|&b| b <= step);
        self.values[i]
    }

    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }
}

/// Converts epoch counts into global steps.
pub fn epochs_to_steps(epochs: &[u64], steps_per_epoch: u64) -> Vec<u64> {
    epochs.iter().map(|e| e * steps_per_epoch).collect()
}
