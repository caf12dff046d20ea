use std::path::PathBuf;

use machine_learning::{Mode, NameFilter};
use serde::{Deserialize, Serialize};

use super::{Config, list::comma_list};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    #[serde(skip)]
    pub general: Config,
    pub model_dir: PathBuf,
    /// The outputs summary callbacks record.
    #[serde(deserialize_with = "comma_list")]
    pub summary_names: Vec<String>,
    pub log_every_n_iter: u64,
    pub save_summary_steps: u64,
    pub pretrained_dir: Option<PathBuf>,
    pub skip_pretrained_var: NameFilter,
    pub save_checkpoints_steps: u64,
    pub keep_checkpoint_max: usize,
    #[serde(deserialize_with = "comma_list")]
    pub train_callbacks: Vec<String>,
    #[serde(deserialize_with = "comma_list")]
    pub eval_callbacks: Vec<String>,
    #[serde(deserialize_with = "comma_list")]
    pub infer_callbacks: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            general: Config::default(),
            model_dir: PathBuf::from("model"),
            summary_names: super::list::split("loss,accuracy,learning_rate"),
            log_every_n_iter: 10,
            save_summary_steps: 100,
            pretrained_dir: None,
            skip_pretrained_var: NameFilter::default(),
            save_checkpoints_steps: 100,
            keep_checkpoint_max: 5,
            train_callbacks: super::list::split(
                "train_basic,train_loss,train_accuracy,train_speed,train_summary",
            ),
            eval_callbacks: super::list::split(
                "eval_basic,eval_loss,eval_accuracy,eval_speed,eval_summary",
            ),
            infer_callbacks: super::list::split("infer_basic"),
        }
    }
}

impl RunnerConfig {
    /// The callbacks configured for `mode`, in registration order.
    pub fn callbacks_for(&self, mode: Mode) -> &[String] {
        match mode {
            Mode::Train => &self.train_callbacks,
            Mode::Eval => &self.eval_callbacks,
            Mode::Infer => &self.infer_callbacks,
            Mode::Export | Mode::Tune => &[],
        }
    }
}
