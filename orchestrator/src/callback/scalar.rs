use log::info;

use super::{Callback, CallbackArgs, Flow, RunContext};
use crate::{error::BoxError, runner::AggregatedResult};

/// Logs the running mean of a scalar output every `log_every_n_iter` steps.
///
/// A non finite value fails the step, since training can't recover from it.
pub struct ScalarLogger {
    name: &'static str,
    output: &'static str,
    every: u64,
    sum: f64,
    count: u64,
}

impl ScalarLogger {
    pub fn new(name: &'static str, output: &'static str, args: &CallbackArgs) -> Self {
        Self {
            name,
            output,
            every: args.runner.log_every_n_iter.max(1),
            sum: 0.,
            count: 0,
        }
    }
}

impl Callback for ScalarLogger {
    fn name(&self) -> &str {
        self.name
    }

    fn after_step(
        &mut self,
        ctx: &RunContext,
        outputs: &AggregatedResult,
    ) -> Result<Flow, BoxError> {
        let Some(value) = outputs.scalar(self.output) else {
            return Ok(Flow::Continue);
        };

        if !value.is_finite() {
            return Err(format!("{} is {value} at step {}", self.output, ctx.global_step).into());
        }

        self.sum += f64::from(value);
        self.count += 1;

        if ctx.step % self.every == 0 || ctx.step == ctx.max_steps {
            let mean = self.sum / self.count as f64;
            info!(step = ctx.global_step; "{} {}: {mean:.4}", ctx.mode, self.output);
            self.sum = 0.;
            self.count = 0;
        }

        Ok(Flow::Continue)
    }
}
