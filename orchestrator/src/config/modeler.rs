use machine_learning::{NameFilter, TrainableFilter};
use serde::{Deserialize, Serialize};

use super::Config;

/// The unit `piecewise_boundaries` are given in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryUnit {
    #[default]
    Epochs,
    Steps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelerConfig {
    #[serde(skip)]
    pub general: Config,
    pub optimizer: String,
    pub learning_rate: f32,
    pub piecewise_boundaries: Vec<u64>,
    pub piecewise_lr_decay: Vec<f32>,
    pub boundary_unit: BoundaryUnit,
    pub trainable_vars: NameFilter,
    pub skip_trainable_vars: NameFilter,
    pub skip_l2_loss_vars: NameFilter,
    pub l2_weight_decay: f32,
    pub grad_clip: Option<f32>,
    /// Overrides the class count the dataset reports, 0 keeps the dataset's.
    pub num_classes: usize,
    pub hidden_units: usize,
}

impl Default for ModelerConfig {
    fn default() -> Self {
        Self {
            general: Config::default(),
            optimizer: "momentum".to_string(),
            learning_rate: 0.1,
            piecewise_boundaries: Vec::new(),
            piecewise_lr_decay: vec![1.0],
            boundary_unit: BoundaryUnit::Epochs,
            trainable_vars: NameFilter::default(),
            skip_trainable_vars: NameFilter::default(),
            skip_l2_loss_vars: NameFilter::parse("BatchNorm,preact,postnorm"),
            l2_weight_decay: 0.0002,
            grad_clip: None,
            num_classes: 0,
            hidden_units: 64,
        }
    }
}

impl ModelerConfig {
    pub fn trainable_filter(&self) -> TrainableFilter {
        TrainableFilter::new(self.trainable_vars.clone(), self.skip_trainable_vars.clone())
    }
}
