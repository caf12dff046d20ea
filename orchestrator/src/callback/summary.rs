use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};

use log::debug;
use machine_learning::Mode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{Callback, CallbackArgs, Flow, RunContext};
use crate::{error::BoxError, runner::AggregatedResult};

/// The scalar outputs of one step, as written to the summary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub mode: Mode,
    pub global_step: u64,
    pub values: BTreeMap<String, f32>,
}

/// Every record written during a process, shared with whoever built the callbacks.
#[derive(Debug, Clone, Default)]
pub struct SummaryHistory(Arc<Mutex<Vec<SummaryRecord>>>);

impl SummaryHistory {
    pub fn push(&self, record: SummaryRecord) {
        self.0.lock().push(record);
    }

    pub fn records(&self) -> Vec<SummaryRecord> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Appends the `summary_names` outputs to `<model_dir>/summaries/<mode>.jsonl`
/// every `save_summary_steps` steps and after the last one.
pub struct Summary {
    name: &'static str,
    names: Vec<String>,
    every: u64,
    history: SummaryHistory,
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl Summary {
    pub fn new(name: &'static str, args: &CallbackArgs) -> Self {
        Self {
            name,
            names: args.runner.summary_names.clone(),
            every: args.runner.save_summary_steps.max(1),
            history: args.history.clone(),
            path: None,
            writer: None,
        }
    }
}

impl Callback for Summary {
    fn name(&self) -> &str {
        self.name
    }

    fn before_run(&mut self, ctx: &RunContext) -> Result<(), BoxError> {
        let dir = ctx.model_dir.join("summaries");
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.jsonl", ctx.mode));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.writer = Some(BufWriter::new(file));
        self.path = Some(path);
        Ok(())
    }

    fn after_step(
        &mut self,
        ctx: &RunContext,
        outputs: &AggregatedResult,
    ) -> Result<Flow, BoxError> {
        if ctx.step % self.every != 0 && ctx.step != ctx.max_steps {
            return Ok(Flow::Continue);
        }

        let values: BTreeMap<String, f32> = self
            .names
            .iter()
            .filter_map(|name| Some((name.clone(), outputs.scalar(name)?)))
            .collect();

        if values.is_empty() {
            return Ok(Flow::Continue);
        }

        let record = SummaryRecord {
            mode: ctx.mode,
            global_step: ctx.global_step,
            values,
        };

        if let Some(writer) = &mut self.writer {
            serde_json::to_writer(&mut *writer, &record)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        debug!(step = ctx.global_step; "wrote summary");
        self.history.push(record);
        Ok(Flow::Continue)
    }

    fn after_run(&mut self, _ctx: &RunContext) -> Result<(), BoxError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{InputterConfig, RunnerConfig},
        runner::{LOSS, Output},
    };

    use super::*;

    fn outputs(loss: f32) -> AggregatedResult {
        [
            (LOSS.to_string(), Output::Scalar(loss)),
            ("ignored".to_string(), Output::Scalar(1.)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn records_on_cadence_and_at_the_last_step() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RunnerConfig {
            summary_names: vec![LOSS.to_string()],
            save_summary_steps: 2,
            ..Default::default()
        };
        let args = CallbackArgs::new(runner, InputterConfig::default());
        let mut summary = Summary::new("train_summary", &args);

        let mut ctx = RunContext {
            mode: Mode::Train,
            global_step: 0,
            step: 0,
            max_steps: 3,
            global_batch_size: 1,
            model_dir: dir.path(),
        };

        summary.before_run(&ctx).unwrap();
        for step in 1..=3 {
            ctx.step = step;
            ctx.global_step = step;
            summary.after_step(&ctx, &outputs(step as f32)).unwrap();
        }
        summary.after_run(&ctx).unwrap();

        let steps: Vec<u64> = args.history.records().iter().map(|r| r.global_step).collect();
        assert_eq!(steps, vec![2, 3]);

        let written = fs::read_to_string(dir.path().join("summaries/train.jsonl")).unwrap();
        let records: Vec<SummaryRecord> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records, args.history.records());
        assert_eq!(records[0].values, BTreeMap::from([(LOSS.to_string(), 2.)]));
    }
}
