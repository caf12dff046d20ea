use std::sync::Arc;

use machine_learning::{Mode, Tensor, augment::Augmenter};
use ndarray::{Axis, IxDyn, Slice};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Batch, samples::Samples, shard::shard_range};
use crate::{config::Config, error::Result};

/// The amount of global steps `mode` takes over `num_samples` samples.
///
/// Train and eval drop the remainder of the concatenated epochs so every step has the full
/// batch shape; infer pads its last step instead; export takes a single step.
pub fn planned_steps(num_samples: usize, general: &Config, epochs: usize) -> u64 {
    let global = general.global_batch_size();
    let steps = match general.mode {
        Mode::Train | Mode::Eval => num_samples * epochs / global,
        Mode::Infer => num_samples.div_ceil(global),
        Mode::Export => 1,
        Mode::Tune => 0,
    };
    steps as u64
}

/// Yields, for each global step, one batch per device.
pub struct StepIter {
    samples: Arc<Samples>,
    order: Vec<usize>,
    cursor: usize,
    per_device: usize,
    devices: usize,
    pad: bool,
    augmenter: Option<Arc<dyn Augmenter>>,
    rng: StdRng,
}

impl StepIter {
    /// Plans the sample order of a whole run.
    ///
    /// # Arguments
    /// * `samples` - The dataset.
    /// * `general` - The mode, batch size and device count.
    /// * `epochs` - The passes over the dataset in train and eval.
    /// * `seed` - Seeds the shuffling and the augmenter.
    /// * `augmenter` - Applied to each sample, in train mode only.
    pub fn new(
        samples: Arc<Samples>,
        general: &Config,
        epochs: usize,
        seed: u64,
        augmenter: Option<Arc<dyn Augmenter>>,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = samples.len();
        let global = general.global_batch_size();

        let order: Vec<usize> = match general.mode {
            Mode::Train => (0..epochs)
                .flat_map(|_| {
                    let mut epoch: Vec<usize> = (0..n).collect();
                    epoch.shuffle(&mut rng);
                    epoch
                })
                .collect(),
            Mode::Eval => (0..epochs).flat_map(|_| 0..n).collect(),
            Mode::Infer => (0..n).collect(),
            Mode::Export | Mode::Tune => Vec::new(),
        };

        let pad = general.mode == Mode::Infer;
        let mut order = order;
        if !pad {
            order.truncate(order.len() / global * global);
        }

        let augmenter = augmenter.filter(|_| general.mode == Mode::Train);

        Self {
            samples,
            order,
            cursor: 0,
            per_device: general.batch_size_per_gpu.get(),
            devices: general.device_count.get(),
            pad,
            augmenter,
            rng,
        }
    }

    /// The amount of steps left.
    pub fn remaining(&self) -> usize {
        (self.order.len() - self.cursor).div_ceil(self.per_device * self.devices)
    }

    fn device_batch(&mut self, indices: &[usize]) -> Batch {
        let (mut inputs, mut labels) = self.samples.gather(indices);

        if let Some(augmenter) = &self.augmenter {
            for mut row in inputs.axis_iter_mut(Axis(0)) {
                let augmented = augmenter.augment(row.to_owned(), &mut self.rng);
                row.assign(&augmented);
            }
        }

        if self.pad && indices.len() < self.per_device {
            inputs = pad_rows(&inputs, self.per_device);
            labels = labels.map(|l| pad_rows(&l, self.per_device));
        }

        Batch {
            inputs,
            labels,
            valid: indices.len(),
        }
    }
}

impl Iterator for StepIter {
    type Item = Result<Vec<Batch>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.per_device * self.devices).min(self.order.len());
        let chunk = self.order[self.cursor..end].to_vec();
        self.cursor = end;

        let batches = (0..self.devices)
            .map(|device| self.device_batch(&chunk[shard_range(chunk.len(), device, self.devices)]))
            .collect();

        Some(Ok(batches))
    }
}

/// One all zero batch per device, fixing the served input signature.
pub fn export_batches(sample_shape: &[usize], general: &Config) -> Vec<Batch> {
    let per_device = general.batch_size_per_gpu.get();
    let shape: Vec<usize> = std::iter::once(per_device)
        .chain(sample_shape.iter().copied())
        .collect();

    (0..general.device_count.get())
        .map(|_| Batch {
            inputs: Tensor::zeros(IxDyn(&shape)),
            labels: None,
            valid: per_device,
        })
        .collect()
}

/// Extends `t` with zero rows up to `rows`.
fn pad_rows(t: &Tensor, rows: usize) -> Tensor {
    let mut shape = t.shape().to_vec();
    let have = shape[0];
    shape[0] = rows;

    let mut padded = Tensor::zeros(IxDyn(&shape));
    padded
        .slice_axis_mut(Axis(0), Slice::from(0..have))
        .assign(t);
    padded
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    fn general(mode: Mode, batch: usize, devices: usize) -> Config {
        Config::new(
            mode,
            NonZeroUsize::new(batch).unwrap(),
            NonZeroUsize::new(devices).unwrap(),
        )
    }

    fn samples(n: usize) -> Arc<Samples> {
        let inputs = (0..n * 2).map(|v| v as f32).collect();
        let labels = (0..n).map(|v| v as f32).collect();
        Arc::new(Samples::from_rows(&[2], inputs, Some(labels)).unwrap())
    }

    fn labels_of(step: &[Batch]) -> Vec<f32> {
        step.iter()
            .flat_map(|b| b.labels.as_ref().unwrap().iter().copied().collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn one_step_per_full_global_batch() {
        let general = general(Mode::Train, 4, 2);
        let steps: Vec<_> = StepIter::new(samples(8), &general, 1, 0, None)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(steps.len(), 1);
        assert_eq!(planned_steps(8, &general, 1), 1);
        assert_eq!(steps[0].len(), 2);
        for batch in &steps[0] {
            assert_eq!(batch.inputs.shape(), &[4, 2]);
            assert_eq!(batch.valid, 4);
        }
    }

    #[test]
    fn train_visits_every_sample_once_per_epoch() {
        let general = general(Mode::Train, 2, 2);
        let steps: Vec<_> = StepIter::new(samples(8), &general, 1, 3, None)
            .collect::<Result<_>>()
            .unwrap();

        let mut seen: Vec<f32> = steps.iter().flat_map(|s| labels_of(s)).collect();
        seen.sort_by(f32::total_cmp);
        assert_eq!(seen, (0..8).map(|v| v as f32).collect::<Vec<_>>());
    }

    #[test]
    fn remainder_is_dropped_across_epochs() {
        let general = general(Mode::Eval, 2, 2);
        let iter = StepIter::new(samples(6), &general, 2, 0, None);

        assert_eq!(iter.remaining(), 3);
        assert_eq!(planned_steps(6, &general, 2), 3);

        let steps: Vec<_> = iter.collect::<Result<_>>().unwrap();
        assert_eq!(labels_of(&steps[0]), vec![0., 1., 2., 3.]);
        assert_eq!(labels_of(&steps[1]), vec![4., 5., 0., 1.]);
    }

    #[test]
    fn infer_pads_the_last_step() {
        let general = general(Mode::Infer, 2, 2);
        let steps: Vec<_> = StepIter::new(samples(3), &general, 5, 0, None)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(steps.len(), 1);
        assert_eq!(planned_steps(3, &general, 5), 1);

        let valid: Vec<usize> = steps[0].iter().map(|b| b.valid).collect();
        assert_eq!(valid, vec![2, 1]);
        assert_eq!(steps[0][1].inputs.shape(), &[2, 2]);
        assert_eq!(steps[0][1].inputs.as_slice().unwrap(), &[4., 5., 0., 0.]);
    }

    #[test]
    fn export_yields_zero_batches() {
        let general = general(Mode::Export, 3, 2);
        let batches = export_batches(&[4, 4, 1], &general);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].inputs.shape(), &[3, 4, 4, 1]);
        assert!(batches[0].inputs.iter().all(|&v| v == 0.));
        assert!(batches[0].labels.is_none());
    }

    #[test]
    fn same_seed_same_order() {
        let general = general(Mode::Train, 2, 1);
        let a: Vec<_> = StepIter::new(samples(6), &general, 2, 11, None)
            .map(|s| labels_of(&s.unwrap()))
            .collect();
        let b: Vec<_> = StepIter::new(samples(6), &general, 2, 11, None)
            .map(|s| labels_of(&s.unwrap()))
            .collect();

        assert_eq!(a, b);
    }
}
