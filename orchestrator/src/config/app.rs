use std::{fs, path::Path};

use machine_learning::{PiecewiseConstant, optimization::OptimizerKind};
use serde::{Deserialize, Serialize};

use super::{Config, InputterConfig, ModelerConfig, RunnerConfig};
use crate::error::{OrchestratorError, Result};

/// Everything a launcher hands the orchestrator for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub general: Config,
    pub network: String,
    #[serde(default)]
    pub augmenter: Option<String>,
    pub inputter: String,
    pub modeler: String,
    #[serde(default)]
    pub inputter_config: InputterConfig,
    #[serde(default)]
    pub modeler_config: ModelerConfig,
    #[serde(default)]
    pub runner_config: RunnerConfig,
}

impl AppConfig {
    /// Reads and validates the configuration stored as JSON at `path`.
    ///
    /// # Errors
    /// Returns `Io` or `Json` if the file can't be read or parsed, and
    /// `Configuration` if its values contradict each other.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    /// Parses and validates a configuration, sharing the general parameters with every role.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.share_general();
        config.validate()?;
        Ok(config)
    }

    /// Copies the general parameters into each role's config.
    pub fn share_general(&mut self) {
        self.inputter_config.general = self.general;
        self.modeler_config.general = self.general;
        self.runner_config.general = self.general;
    }

    /// Checks the configuration for values no run can start with.
    pub fn validate(&self) -> Result<()> {
        self.validate_inputter()?;
        self.validate_modeler()?;
        self.validate_runner()
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn validate_inputter(&self) -> Result<()> {
        let inputter = &self.inputter_config;
        if inputter.epochs == 0 {
            return Err(invalid("epochs must be greater than 0"));
        }

        if inputter.image_shape().contains(&0) {
            return Err(invalid(format!(
                "image dimensions must be greater than 0, got {:?}",
                inputter.image_shape()
            )));
        }

        if inputter.max_length == Some(0) {
            return Err(invalid("max_length must be greater than 0"));
        }

        Ok(())
    }

    fn validate_modeler(&self) -> Result<()> {
        let modeler = &self.modeler_config;
        modeler
            .optimizer
            .parse::<OptimizerKind>()
            .map_err(|e| invalid(e.to_string()))?;

        PiecewiseConstant::new(
            modeler.learning_rate,
            modeler.piecewise_boundaries.clone(),
            &modeler.piecewise_lr_decay,
        )
        .map_err(|e| invalid(e.to_string()))?;

        if !modeler.learning_rate.is_finite() || modeler.learning_rate < 0. {
            return Err(invalid(format!(
                "learning_rate must be a non negative number, got {}",
                modeler.learning_rate
            )));
        }

        if let Some(clip) = modeler.grad_clip
            && (!clip.is_finite() || clip <= 0.)
        {
            return Err(invalid(format!(
                "grad_clip must be greater than 0, got {clip}"
            )));
        }

        if modeler.hidden_units == 0 {
            return Err(invalid("hidden_units must be greater than 0"));
        }

        Ok(())
    }

    fn validate_runner(&self) -> Result<()> {
        let runner = &self.runner_config;
        let positive = [
            ("keep_checkpoint_max", runner.keep_checkpoint_max as u64),
            ("save_checkpoints_steps", runner.save_checkpoints_steps),
            ("log_every_n_iter", runner.log_every_n_iter),
            ("save_summary_steps", runner.save_summary_steps),
        ];

        for (name, value) in positive {
            if value == 0 {
                return Err(invalid(format!("{name} must be greater than 0")));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> OrchestratorError {
    OrchestratorError::Configuration(msg.into())
}
