use super::{Callback, Flow, RunContext};
use crate::{
    error::{BoxError, OrchestratorError, Result},
    runner::AggregatedResult,
};

/// Dispatches every hook to every callback in registration order.
///
/// The first failing callback aborts the dispatch and the run.
#[derive(Default)]
pub struct CallbackPipeline {
    callbacks: Vec<Box<dyn Callback>>,
}

impl CallbackPipeline {
    pub fn new(callbacks: Vec<Box<dyn Callback>>) -> Self {
        Self { callbacks }
    }

    pub fn push(&mut self, callback: Box<dyn Callback>) {
        self.callbacks.push(callback);
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.callbacks.iter().map(|c| c.name())
    }

    pub fn before_run(&mut self, ctx: &RunContext) -> Result<()> {
        for callback in &mut self.callbacks {
            callback
                .before_run(ctx)
                .map_err(|e| failed(callback.as_ref(), e))?;
        }
        Ok(())
    }

    /// Dispatches `after_step`.
    ///
    /// # Returns
    /// `Flow::Stop` if any callback asked to stop, once every callback ran.
    pub fn after_step(&mut self, ctx: &RunContext, outputs: &AggregatedResult) -> Result<Flow> {
        let mut flow = Flow::Continue;
        for callback in &mut self.callbacks {
            if callback
                .after_step(ctx, outputs)
                .map_err(|e| failed(callback.as_ref(), e))?
                == Flow::Stop
            {
                flow = Flow::Stop;
            }
        }
        Ok(flow)
    }

    pub fn after_run(&mut self, ctx: &RunContext) -> Result<()> {
        for callback in &mut self.callbacks {
            callback
                .after_run(ctx)
                .map_err(|e| failed(callback.as_ref(), e))?;
        }
        Ok(())
    }
}

fn failed(callback: &dyn Callback, source: BoxError) -> OrchestratorError {
    OrchestratorError::Callback {
        name: callback.name().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use machine_learning::Mode;
    use parking_lot::Mutex;

    use super::*;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_on_step: bool,
        stop: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail_on_step: false,
                stop: false,
            }
        }

        fn record(&self, hook: &str) {
            self.log.lock().push(format!("{}:{hook}", self.name));
        }
    }

    impl Callback for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn before_run(&mut self, _ctx: &RunContext) -> std::result::Result<(), BoxError> {
            self.record("before_run");
            Ok(())
        }

        fn after_step(
            &mut self,
            _ctx: &RunContext,
            _outputs: &AggregatedResult,
        ) -> std::result::Result<Flow, BoxError> {
            self.record("after_step");
            if self.fail_on_step {
                return Err("boom".into());
            }
            Ok(if self.stop { Flow::Stop } else { Flow::Continue })
        }

        fn after_run(&mut self, _ctx: &RunContext) -> std::result::Result<(), BoxError> {
            self.record("after_run");
            Ok(())
        }
    }

    fn ctx() -> RunContext<'static> {
        RunContext {
            mode: Mode::Train,
            global_step: 1,
            step: 1,
            max_steps: 1,
            global_batch_size: 1,
            model_dir: Path::new("."),
        }
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = CallbackPipeline::new(vec![
            Box::new(Recorder::new("timer", &log)),
            Box::new(Recorder::new("logger", &log)),
        ]);

        pipeline.before_run(&ctx()).unwrap();
        let flow = pipeline.after_step(&ctx(), &AggregatedResult::default()).unwrap();
        pipeline.after_run(&ctx()).unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            *log.lock(),
            vec![
                "timer:before_run",
                "logger:before_run",
                "timer:after_step",
                "logger:after_step",
                "timer:after_run",
                "logger:after_run",
            ]
        );
    }

    #[test]
    fn a_failing_callback_stops_the_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new("checker", &log);
        failing.fail_on_step = true;
        let mut pipeline = CallbackPipeline::new(vec![
            Box::new(failing),
            Box::new(Recorder::new("logger", &log)),
        ]);

        let err = pipeline
            .after_step(&ctx(), &AggregatedResult::default())
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Callback { ref name, .. } if name == "checker"));
        assert_eq!(*log.lock(), vec!["checker:after_step"]);
    }

    #[test]
    fn any_stop_request_stops_after_every_callback_ran() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stopper = Recorder::new("stopper", &log);
        stopper.stop = true;
        let mut pipeline = CallbackPipeline::new(vec![
            Box::new(stopper),
            Box::new(Recorder::new("logger", &log)),
        ]);

        let flow = pipeline.after_step(&ctx(), &AggregatedResult::default()).unwrap();

        assert_eq!(flow, Flow::Stop);
        assert_eq!(log.lock().len(), 2);
    }
}
