use std::time::Instant;

use log::info;

use super::{Callback, CallbackArgs, Flow, RunContext};
use crate::{error::BoxError, runner::AggregatedResult};

/// Logs the throughput since the previous log, every `log_every_n_iter` steps.
pub struct Speed {
    name: &'static str,
    every: u64,
    since: Option<Instant>,
    steps: u64,
}

impl Speed {
    pub fn new(name: &'static str, args: &CallbackArgs) -> Self {
        Self {
            name,
            every: args.runner.log_every_n_iter.max(1),
            since: None,
            steps: 0,
        }
    }
}

impl Callback for Speed {
    fn name(&self) -> &str {
        self.name
    }

    fn before_run(&mut self, _ctx: &RunContext) -> Result<(), BoxError> {
        self.since = Some(Instant::now());
        Ok(())
    }

    fn after_step(
        &mut self,
        ctx: &RunContext,
        _outputs: &AggregatedResult,
    ) -> Result<Flow, BoxError> {
        self.steps += 1;

        if ctx.step % self.every == 0 || ctx.step == ctx.max_steps {
            let now = Instant::now();
            let secs = self
                .since
                .map(|t| now.duration_since(t).as_secs_f64())
                .unwrap_or(0.);

            if secs > 0. {
                let samples = (self.steps as usize * ctx.global_batch_size) as f64;
                info!(
                    step = ctx.global_step;
                    "{:.1} samples/s, {:.3}s/step",
                    samples / secs,
                    secs / self.steps as f64
                );
            }

            self.since = Some(now);
            self.steps = 0;
        }

        Ok(Flow::Continue)
    }
}
