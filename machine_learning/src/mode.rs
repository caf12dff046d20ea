use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::MlErr;

/// The kind of job being run, every component branches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Eval,
    Infer,
    Export,
    Tune,
}

impl Mode {
    /// Returns the lowercase name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Eval => "eval",
            Mode::Infer => "infer",
            Mode::Export => "export",
            Mode::Tune => "tune",
        }
    }

    /// Whether batches in this mode carry ground truth labels.
    pub fn has_labels(self) -> bool {
        match self {
            Mode::Train | Mode::Eval => true,
            Mode::Infer | Mode::Export | Mode::Tune => false,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Mode::Train),
            "eval" => Ok(Mode::Eval),
            "infer" => Ok(Mode::Infer),
            "export" => Ok(Mode::Export),
            "tune" => Ok(Mode::Tune),
            other => Err(MlErr::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_agree() {
        for mode in [Mode::Train, Mode::Eval, Mode::Infer, Mode::Export, Mode::Tune] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        assert!("serve".parse::<Mode>().is_err());
    }

    #[test]
    fn only_train_and_eval_have_labels() {
        assert!(Mode::Train.has_labels());
        assert!(Mode::Eval.has_labels());
        assert!(!Mode::Infer.has_labels());
        assert!(!Mode::Export.has_labels());
    }
}
