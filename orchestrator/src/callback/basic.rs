use std::time::Instant;

use log::info;

use super::{Callback, CallbackArgs, Flow, RunContext};
use crate::{error::BoxError, runner::AggregatedResult};

/// Logs when a run starts and ends.
pub struct Basic {
    name: &'static str,
    started: Option<Instant>,
    steps: u64,
}

impl Basic {
    pub fn new(name: &'static str, _args: &CallbackArgs) -> Self {
        Self {
            name,
            started: None,
            steps: 0,
        }
    }
}

impl Callback for Basic {
    fn name(&self) -> &str {
        self.name
    }

    fn before_run(&mut self, ctx: &RunContext) -> Result<(), BoxError> {
        self.started = Some(Instant::now());
        info!(
            global_step = ctx.global_step,
            max_steps = ctx.max_steps;
            "{} started in {}",
            ctx.mode,
            ctx.model_dir.display()
        );
        Ok(())
    }

    fn after_step(
        &mut self,
        _ctx: &RunContext,
        _outputs: &AggregatedResult,
    ) -> Result<Flow, BoxError> {
        self.steps += 1;
        Ok(Flow::Continue)
    }

    fn after_run(&mut self, ctx: &RunContext) -> Result<(), BoxError> {
        let elapsed = self.started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.);
        info!(
            global_step = ctx.global_step;
            "{} finished after {} steps in {elapsed:.2}s",
            ctx.mode,
            self.steps
        );
        Ok(())
    }
}
