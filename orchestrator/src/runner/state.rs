use std::fmt;

/// Where a runner is in its lifecycle.
///
/// `Init → Restored → Running → Finalized`; `Running` is re-entered on every step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunnerState {
    #[default]
    Init,
    Restored,
    Running,
    Finalized,
}

impl RunnerState {
    /// Whether `next` may follow `self`.
    pub fn can_become(self, next: RunnerState) -> bool {
        use RunnerState::*;

        matches!(
            (self, next),
            (Init, Restored)
                | (Restored, Running)
                | (Restored, Finalized)
                | (Running, Running)
                | (Running, Finalized)
        )
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Restored => "restored",
            Self::Running => "running",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}
