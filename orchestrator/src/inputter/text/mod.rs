mod tokenizer;
mod vocabulary;

pub use tokenizer::Tokenizer;
pub use vocabulary::Vocabulary;

use std::sync::Arc;

use log::{info, warn};
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

/// Next token prediction over windows of a text corpus.
///
/// Train and eval draw `num_samples` random windows of `max_length + 1` tokens from the
/// `dataset_meta` files; the input is the window without its last token and the label the
/// window without its first. Infer encodes each `test_samples` entry as seed text, keeping its
/// last `max_length` tokens and left padding shorter seeds with id 0.
pub struct TextGeneration {
    args: InputterArgs,
    tokenizer: Tokenizer,
    vocab: Vocabulary,
    samples: Arc<Samples>,
    info: DatasetInfo,
    seed: u64,
}

impl TextGeneration {
    /// The sample count and sequence length used when the configuration sets none.
    pub fn defaults(mode: Mode) -> (usize, usize) {
        match mode {
            Mode::Train | Mode::Tune => (100_000, 50),
            Mode::Eval => (10_000, 50),
            Mode::Infer => (1_000, 1),
            Mode::Export => (1, 1),
        }
    }

    pub fn new(args: InputterArgs) -> Result<Self> {
        let config = &args.config;
        let mode = config.general.mode;
        let (default_samples, default_length) = Self::defaults(mode);
        let num_samples = config.num_samples.unwrap_or(default_samples);
        let max_length = config.max_length.unwrap_or(default_length);

        let tokenizer = Tokenizer::new(config.unit)?;
        let corpus = config
            .dataset_meta
            .iter()
            .map(|path| read_dataset_file(path))
            .collect::<Result<Vec<_>>>()?
            .concat();
        let tokens = tokenizer.tokenize(&corpus);

        let vocab = match &config.vocab_file {
            Some(path) => {
                let listing = read_dataset_file(&path.to_string_lossy())?;
                Vocabulary::from_listing(&listing, config.vocab_top_k)
            }
            None => Vocabulary::from_tokens(&tokens, config.vocab_top_k),
        };

        if vocab.is_empty() {
            return Err(OrchestratorError::DatasetUnavailable(
                "text generation needs a vocab_file or dataset_meta text".into(),
            ));
        }

        let seed = resolve_seed(config);
        let samples = match mode {
            Mode::Train | Mode::Eval | Mode::Tune => {
                let ids = vocab.encode(&tokens);
                if ids.len() < tokens.len() {
                    warn!(dropped = tokens.len() - ids.len(); "dropped out of vocabulary tokens");
                }
                windows(&ids, num_samples, max_length, seed)?
            }
            Mode::Infer => {
                let seeds: Vec<Vec<usize>> = config
                    .test_samples
                    .iter()
                    .take(num_samples)
                    .map(|text| vocab.encode(&tokenizer.tokenize(text)))
                    .collect();
                seed_samples(seeds, max_length)?
            }
            Mode::Export => Samples::from_rows(&[max_length], Vec::new(), None)?,
        };

        info!(
            samples = samples.len(),
            vocab = vocab.len(),
            max_length = max_length;
            "loaded text dataset"
        );

        let info = DatasetInfo {
            num_samples: samples.len(),
            num_classes: vocab.len(),
            class_names: Vec::new(),
            items: vocab.items().to_vec(),
            max_length: Some(max_length),
            input_shape: vec![max_length],
        };

        Ok(Self {
            args,
            tokenizer,
            vocab,
            samples: Arc::new(samples),
            info,
            seed,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }
}

impl Inputter for TextGeneration {
    fn name(&self) -> &str {
        "text_generation"
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

/// Draws `n` random windows of `length + 1` ids.
fn windows(ids: &[usize], n: usize, length: usize, seed: u64) -> Result<Samples> {
    if ids.len() < length + 1 {
        return Err(OrchestratorError::DatasetUnavailable(format!(
            "the corpus has {} tokens, windows need {}",
            ids.len(),
            length + 1
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut inputs = Vec::with_capacity(n * length);
    let mut labels = Vec::with_capacity(n * length);

    for _ in 0..n {
        let start = rng.random_range(0..=ids.len() - length - 1);
        let window = &ids[start..=start + length];
        inputs.extend(window[..length].iter().map(|&id| id as f32));
        labels.extend(window[1..].iter().map(|&id| id as f32));
    }

    let shaped = |values| {
        Tensor::from_shape_vec(IxDyn(&[n, length]), values)
            .map_err(|e| OrchestratorError::DatasetUnavailable(e.to_string()))
    };
    Samples::new(shaped(inputs)?, Some(shaped(labels)?))
}

/// One sample per seed, empty seeds becoming a single all padding sample.
fn seed_samples(mut seeds: Vec<Vec<usize>>, length: usize) -> Result<Samples> {
    if seeds.is_empty() {
        seeds.push(Vec::new());
    }

    let mut inputs = Vec::with_capacity(seeds.len() * length);
    for seed in &seeds {
        let kept = &seed[seed.len().saturating_sub(length)..];
        inputs.extend(std::iter::repeat_n(0., length - kept.len()));
        inputs.extend(kept.iter().map(|&id| id as f32));
    }

    Samples::from_rows(&[length], inputs, None)
}

#[cfg(test)]
mod tests {
    use std::{fs, num::NonZeroUsize};

    use super::*;
    use crate::config::{Config, TextUnit};

    fn args(mode: Mode, configure: impl FnOnce(&mut InputterConfig)) -> InputterArgs {
        let mut config = InputterConfig {
            general: Config::new(mode, NonZeroUsize::new(2).unwrap(), NonZeroUsize::MIN),
            seed: Some(1),
            ..Default::default()
        };
        configure(&mut config);
        InputterArgs {
            config,
            augmenter: None,
        }
    }

    fn corpus(dir: &tempfile::TempDir, text: &str) -> String {
        let path = dir.path().join("corpus.txt");
        fs::write(&path, text).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn windows_predict_the_next_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = corpus(&dir, "abcdabcdabcd");

        let inputter = TextGeneration::new(args(Mode::Train, |c| {
            c.dataset_meta = vec![path];
            c.num_samples = Some(10);
            c.max_length = Some(3);
        }))
        .unwrap();

        let info = inputter.dataset_info();
        assert_eq!(info.num_samples, 10);
        assert_eq!(info.num_classes, 4);
        assert_eq!(info.items, vec!["a", "b", "c", "d"]);
        assert_eq!(info.max_length, Some(3));

        let (inputs, labels) = inputter.samples.gather(&[0]);
        for (x, y) in inputs.iter().zip(labels.unwrap().iter()) {
            assert_eq!((*x as usize + 1) % 4, *y as usize);
        }
    }

    #[test]
    fn per_mode_defaults_apply() {
        assert_eq!(TextGeneration::defaults(Mode::Train), (100_000, 50));
        assert_eq!(TextGeneration::defaults(Mode::Eval), (10_000, 50));
        assert_eq!(TextGeneration::defaults(Mode::Infer), (1_000, 1));
        assert_eq!(TextGeneration::defaults(Mode::Export), (1, 1));
    }

    #[test]
    fn short_corpus_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = corpus(&dir, "abc");

        let err = TextGeneration::new(args(Mode::Train, |c| {
            c.dataset_meta = vec![path];
            c.max_length = Some(5);
        }))
        .err()
        .unwrap();

        assert!(matches!(err, OrchestratorError::DatasetUnavailable(_)));
    }

    #[test]
    fn no_vocabulary_source_is_unavailable() {
        let err = TextGeneration::new(args(Mode::Infer, |_| {})).err().unwrap();

        assert!(matches!(err, OrchestratorError::DatasetUnavailable(_)));
    }

    #[test]
    fn infer_seeds_are_left_padded() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = dir.path().join("vocab.txt");
        fs::write(&vocab, "the 10\ncat 5\nsat 2\n").unwrap();

        let inputter = TextGeneration::new(args(Mode::Infer, |c| {
            c.unit = TextUnit::Word;
            c.vocab_file = Some(vocab);
            c.max_length = Some(3);
            c.test_samples = vec!["the cat sat the".into(), "cat".into()];
        }))
        .unwrap();

        let (inputs, labels) = inputter.samples.gather(&[0, 1]);
        assert!(labels.is_none());
        assert_eq!(inputs.as_slice().unwrap(), &[1., 2., 0., 0., 0., 1.]);
    }

    #[test]
    fn out_of_vocabulary_tokens_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = corpus(&dir, "aaabbbc");

        let inputter = TextGeneration::new(args(Mode::Eval, |c| {
            c.dataset_meta = vec![path];
            c.vocab_top_k = 2;
            c.num_samples = Some(4);
            c.max_length = Some(2);
        }))
        .unwrap();

        assert_eq!(inputter.vocabulary().items(), &["a", "b"]);
        assert!(inputter.samples.labels().unwrap().iter().all(|&id| id < 2.));
    }
}
