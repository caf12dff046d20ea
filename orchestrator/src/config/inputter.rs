use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Config, list::comma_list};

/// How text is split into tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextUnit {
    #[default]
    Char,
    Word,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputterConfig {
    #[serde(skip)]
    pub general: Config,
    pub epochs: usize,
    /// The files the train and eval samples are read from.
    #[serde(deserialize_with = "comma_list")]
    pub dataset_meta: Vec<String>,
    /// The files read in infer mode, one sample each.
    #[serde(deserialize_with = "comma_list")]
    pub test_samples: Vec<String>,
    pub image_height: usize,
    pub image_width: usize,
    pub image_depth: usize,
    pub num_classes: usize,
    #[serde(deserialize_with = "comma_list")]
    pub class_names: Vec<String>,
    pub unit: TextUnit,
    pub vocab_file: Option<PathBuf>,
    /// Keeps the most frequent tokens only, 0 keeps all of them.
    pub vocab_top_k: usize,
    pub num_samples: Option<usize>,
    pub max_length: Option<usize>,
    pub seed: Option<u64>,
    /// The standard deviation of the `gaussian_noise` augmenter.
    pub noise_std_dev: f32,
}

impl Default for InputterConfig {
    fn default() -> Self {
        Self {
            general: Config::default(),
            epochs: 1,
            dataset_meta: Vec::new(),
            test_samples: Vec::new(),
            image_height: 1,
            image_width: 1,
            image_depth: 1,
            num_classes: 0,
            class_names: Vec::new(),
            unit: TextUnit::Char,
            vocab_file: None,
            vocab_top_k: 0,
            num_samples: None,
            max_length: None,
            seed: None,
            noise_std_dev: 0.1,
        }
    }
}

impl InputterConfig {
    /// The shape of one image sample.
    pub fn image_shape(&self) -> Vec<usize> {
        vec![self.image_height, self.image_width, self.image_depth]
    }
}
