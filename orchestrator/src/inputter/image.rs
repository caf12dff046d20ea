use std::sync::Arc;

use log::{debug, info};
use machine_learning::{Mode, Tensor};
use ndarray::IxDyn;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    DatasetInfo, Inputter, InputterArgs, Samples, StepBatches, read_dataset_file, resolve_seed,
    step_batches,
};
use crate::{
    config::InputterConfig,
    error::{OrchestratorError, Result},
};

/// Images stored as CSV rows of `height × width × depth` values followed by an integral label.
///
/// In infer mode every `test_samples` file holds the values of a single unlabeled image,
/// separated by commas or whitespace.
pub struct ImageClassificationCsv {
    args: InputterArgs,
    samples: Arc<Samples>,
    info: DatasetInfo,
    seed: u64,
}

impl ImageClassificationCsv {
    pub fn new(args: InputterArgs) -> Result<Self> {
        let config = &args.config;
        let shape = config.image_shape();
        let numel: usize = shape.iter().product();

        let samples = match config.general.mode {
            Mode::Train | Mode::Eval | Mode::Tune => {
                if config.dataset_meta.is_empty() {
                    return Err(OrchestratorError::DatasetUnavailable(
                        "no dataset_meta files configured".into(),
                    ));
                }

                let (mut inputs, mut labels) = (Vec::new(), Vec::new());
                for path in &config.dataset_meta {
                    let text = read_dataset_file(path)?;
                    let rows = parse_rows(path, &text, numel, &mut inputs, &mut labels)?;
                    debug!(rows = rows; "read {path}");
                }
                Samples::from_rows(&shape, inputs, Some(labels))?
            }
            Mode::Infer => {
                if config.test_samples.is_empty() {
                    return Err(OrchestratorError::DatasetUnavailable(
                        "no test_samples configured".into(),
                    ));
                }

                let mut inputs = Vec::with_capacity(config.test_samples.len() * numel);
                for path in &config.test_samples {
                    let text = read_dataset_file(path)?;
                    inputs.extend(parse_sample(path, &text, numel)?);
                }
                Samples::from_rows(&shape, inputs, None)?
            }
            Mode::Export => empty_samples(&shape)?,
        };

        let info = classification_info(config, &samples)?;
        info!(samples = info.num_samples, classes = info.num_classes; "loaded image dataset");

        Ok(Self {
            seed: resolve_seed(config),
            samples: Arc::new(samples),
            info,
            args,
        })
    }
}

impl Inputter for ImageClassificationCsv {
    fn name(&self) -> &str {
        "image_classification_csv"
    }

    fn config(&self) -> &InputterConfig {
        &self.args.config
    }

    fn dataset_info(&self) -> &DatasetInfo {
        &self.info
    }

    fn batches(&mut self) -> Result<StepBatches> {
        Ok(step_batches(&self.samples, &self.info, &self.args, self.seed))
    }
}

/// Seeded random images whose labels a linear model can learn.
///
/// Each label is the argmax of a fixed random projection of its image, so the task is
/// separable. `num_samples` defaults to 256 and `num_classes` to 2.
pub struct SyntheticClassification {
    args: InputterArgs,
    samples: Arc<Samples>,
    info: DatasetInfo,
    seed: u64,
}

impl SyntheticClassification {
    pub const DEFAULT_SAMPLES: usize = 256;
    pub const DEFAULT_CLASSES: usize = 2;

    pub fn new(args: InputterArgs) -> Result<Self> {
        let mut config = args.config.clone();
        let seed = resolve_seed(&config);
        let shape = config.image_shape();

        if config.num_classes == 0 {
            config.num_classes = Self::DEFAULT_CLASSES;
        }

        let samples = match config.general.mode {
            Mode::Export => empty_samples(&shape)?,
            mode => {
                let n = config.num_samples.unwrap_or(Self::DEFAULT_SAMPLES);
                synthesize(&shape, n, config.num_classes, seed, mode.has_labels())?
            }
        };

        let info = classification_info(&config, &samples)?;
        Ok(Self {
            args: InputterArgs {
                config,
                augmenter: args.augmenter,
            },
            samples: Arc::new(samples),
            info,
            seed,
        })
    }
}

impl Inputter for SyntheticClassification {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn config(&self) -> &InputterConfig {
        &self.args.config
    }

    fn dataset_info(&self) -> &DatasetInfo {
        &self.info
    }

    fn batches(&mut self) -> Result<StepBatches> {
        Ok(step_batches(&self.samples, &self.info, &self.args, self.seed))
    }
}

fn synthesize(
    shape: &[usize],
    n: usize,
    classes: usize,
    seed: u64,
    labeled: bool,
) -> Result<Samples> {
    let mut rng = StdRng::seed_from_u64(seed);
    let numel: usize = shape.iter().product();

    let projection: Vec<f32> = (0..numel * classes)
        .map(|_| rng.random_range(-1.0..1.0))
        .collect();
    let inputs: Vec<f32> = (0..n * numel)
        .map(|_| rng.random_range(-1.0..1.0))
        .collect();

    let labels = labeled.then(|| {
        inputs
            .chunks(numel)
            .map(|x| {
                let scores = (0..classes).map(|c| {
                    x.iter()
                        .enumerate()
                        .map(|(i, v)| v * projection[i * classes + c])
                        .sum::<f32>()
                });
                scores
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |(best, max), (c, s)| {
                        if s > max { (c, s) } else { (best, max) }
                    })
                    .0 as f32
            })
            .collect()
    });

    Samples::from_rows(shape, inputs, labels)
}

fn empty_samples(shape: &[usize]) -> Result<Samples> {
    let full: Vec<usize> = std::iter::once(0).chain(shape.iter().copied()).collect();
    Samples::new(Tensor::zeros(IxDyn(&full)), None)
}

/// Resolves the class count and names from the configuration and the labels.
fn classification_info(config: &InputterConfig, samples: &Samples) -> Result<DatasetInfo> {
    let from_labels = samples
        .labels()
        .map(|labels| labels.iter().fold(0, |m, &l| m.max(l as usize + 1)))
        .unwrap_or(0);

    let num_classes = match config.num_classes {
        0 if from_labels > 0 => from_labels,
        0 => config.class_names.len(),
        n => n,
    };

    if from_labels > num_classes {
        return Err(OrchestratorError::DatasetUnavailable(format!(
            "labels reach class {} but only {num_classes} classes are configured",
            from_labels - 1
        )));
    }

    let class_names = if config.class_names.is_empty() {
        (0..num_classes).map(|c| c.to_string()).collect()
    } else if config.class_names.len() == num_classes {
        config.class_names.clone()
    } else {
        return Err(OrchestratorError::Configuration(format!(
            "{} class names for {num_classes} classes",
            config.class_names.len()
        )));
    };

    Ok(DatasetInfo {
        num_samples: samples.len(),
        num_classes,
        class_names,
        items: Vec::new(),
        max_length: None,
        input_shape: samples.sample_shape().to_vec(),
    })
}

/// Appends every `values..., label` row of `text` and returns how many there were.
///
/// A first line that doesn't parse is taken as a header.
fn parse_rows(
    path: &str,
    text: &str,
    numel: usize,
    inputs: &mut Vec<f32>,
    labels: &mut Vec<f32>,
) -> Result<usize> {
    let mut rows = 0;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let values: std::result::Result<Vec<f32>, _> =
            line.split(',').map(|v| v.trim().parse::<f32>()).collect();
        let values = match values {
            Ok(values) => values,
            Err(_) if rows == 0 && i == 0 => continue,
            Err(e) => return Err(malformed(path, i, &e.to_string())),
        };

        if values.len() != numel + 1 {
            return Err(malformed(
                path,
                i,
                &format!("expected {} values and a label, got {} fields", numel, values.len()),
            ));
        }

        let label = values[numel];
        if label < 0. || label.fract() != 0. {
            return Err(malformed(path, i, &format!("label {label} is not a class index")));
        }

        inputs.extend_from_slice(&values[..numel]);
        labels.push(label);
        rows += 1;
    }

    Ok(rows)
}

fn parse_sample(path: &str, text: &str, numel: usize) -> Result<Vec<f32>> {
    let values = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<f32>())
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| malformed(path, 0, &e.to_string()))?;

    if values.len() != numel {
        return Err(malformed(
            path,
            0,
            &format!("expected {numel} values, got {}", values.len()),
        ));
    }

    Ok(values)
}

fn malformed(path: &str, line: usize, reason: &str) -> OrchestratorError {
    OrchestratorError::DatasetUnavailable(format!("{path}:{}: {reason}", line + 1))
}

#[cfg(test)]
mod tests {
    use std::{fs, num::NonZeroUsize};

    use super::*;
    use crate::config::Config;

    fn args(mode: Mode, configure: impl FnOnce(&mut InputterConfig)) -> InputterArgs {
        let mut config = InputterConfig {
            general: Config::new(mode, NonZeroUsize::new(2).unwrap(), NonZeroUsize::MIN),
            image_height: 2,
            image_width: 1,
            image_depth: 1,
            seed: Some(5),
            ..Default::default()
        };
        configure(&mut config);
        InputterArgs {
            config,
            augmenter: None,
        }
    }

    #[test]
    fn csv_rows_become_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "a,b,label\n0.5,1.5,0\n2,3,2\n\n4,5,1\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let inputter =
            ImageClassificationCsv::new(args(Mode::Train, |c| c.dataset_meta = vec![path])).unwrap();

        let info = inputter.dataset_info();
        assert_eq!(info.num_samples, 3);
        assert_eq!(info.num_classes, 3);
        assert_eq!(info.class_names, vec!["0", "1", "2"]);
        assert_eq!(inputter.input_shape(), vec![2, 2, 1, 1]);
        assert_eq!(inputter.max_steps(), 1);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = ImageClassificationCsv::new(args(Mode::Eval, |c| {
            c.dataset_meta = vec!["/nonexistent/eval.csv".into()]
        }))
        .err()
        .unwrap();

        assert!(matches!(err, OrchestratorError::DatasetUnavailable(msg) if msg.contains("eval.csv")));
    }

    #[test]
    fn wrong_field_count_is_reported_with_its_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "1,2,0\n1,0\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let err = ImageClassificationCsv::new(args(Mode::Train, |c| c.dataset_meta = vec![path]))
            .err()
            .unwrap();

        assert!(matches!(err, OrchestratorError::DatasetUnavailable(msg) if msg.contains(":2:")));
    }

    #[test]
    fn infer_reads_one_sample_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for (i, body) in ["1 2", "3,4\n", "5\n6"].iter().enumerate() {
            let path = dir.path().join(format!("{i}.txt"));
            fs::write(&path, body).unwrap();
            files.push(path.to_string_lossy().into_owned());
        }

        let mut inputter = ImageClassificationCsv::new(args(Mode::Infer, |c| {
            c.test_samples = files;
            c.class_names = vec!["cat".into(), "dog".into()];
        }))
        .unwrap();

        assert_eq!(inputter.dataset_info().num_classes, 2);
        let steps: Vec<_> = inputter.batches().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps[0][0].labels.is_none());
        assert_eq!(steps[1][0].valid, 1);
        assert_eq!(steps[1][0].inputs.as_slice().unwrap(), &[5., 6., 0., 0.]);
    }

    #[test]
    fn synthetic_is_deterministic_per_seed() {
        let a = SyntheticClassification::new(args(Mode::Train, |c| c.num_samples = Some(16)))
            .unwrap();
        let b = SyntheticClassification::new(args(Mode::Train, |c| c.num_samples = Some(16)))
            .unwrap();

        assert_eq!(a.samples, b.samples);
        assert_eq!(a.dataset_info().num_classes, 2);
        assert!(a.samples.labels().unwrap().iter().all(|&l| l == 0. || l == 1.));
    }

    #[test]
    fn export_has_the_sample_shape_only() {
        let mut inputter = SyntheticClassification::new(args(Mode::Export, |_| {})).unwrap();

        assert_eq!(inputter.max_steps(), 1);
        let steps: Vec<_> = inputter.batches().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(steps[0][0].inputs.shape(), &[2, 2, 1, 1]);
    }
}
