use log::{info, warn};
use machine_learning::{
    Tensor,
    tensor::{argmax_rows, as_matrix},
};
use ndarray::{Axis, Ix3};

use super::{Callback, CallbackArgs, Flow, RunContext};
use crate::{
    error::{BoxError, Result},
    inputter::Tokenizer,
    runner::AggregatedResult,
};

fn require<'a>(
    outputs: &'a AggregatedResult,
    name: &str,
) -> std::result::Result<&'a Tensor, BoxError> {
    outputs
        .batch(name)
        .ok_or_else(|| format!("the model has no `{name}` output").into())
}

/// Logs the predicted class of every inferred image.
pub struct DisplayImageClassification {
    seen: usize,
}

impl DisplayImageClassification {
    pub fn new(_args: &CallbackArgs) -> Self {
        Self { seen: 0 }
    }
}

impl Callback for DisplayImageClassification {
    fn name(&self) -> &str {
        "infer_display_image_classification"
    }

    fn after_step(
        &mut self,
        _ctx: &RunContext,
        outputs: &AggregatedResult,
    ) -> std::result::Result<Flow, BoxError> {
        let probabilities = as_matrix(require(outputs, "probabilities")?, "probabilities")?;
        let names = outputs.meta("class_names").unwrap_or_default();

        for (row, class) in probabilities
            .rows()
            .into_iter()
            .zip(argmax_rows(probabilities.view()))
        {
            let label = names.get(class).map_or_else(|| class.to_string(), Clone::clone);
            info!(sample = self.seen; "{label} ({:.3})", row[class]);
            self.seen += 1;
        }

        Ok(Flow::Continue)
    }
}

/// Logs each seed sequence followed by its most likely next token.
pub struct DisplayTextGeneration {
    tokenizer: Tokenizer,
    generated: Vec<String>,
}

impl DisplayTextGeneration {
    pub fn new(args: &CallbackArgs) -> Result<Self> {
        Ok(Self {
            tokenizer: Tokenizer::new(args.inputter.unit)?,
            generated: Vec::new(),
        })
    }

    /// Every seed with its predicted token appended, in inference order.
    pub fn generated(&self) -> &[String] {
        &self.generated
    }
}

impl Callback for DisplayTextGeneration {
    fn name(&self) -> &str {
        "infer_display_text_generation"
    }

    fn after_step(
        &mut self,
        _ctx: &RunContext,
        outputs: &AggregatedResult,
    ) -> std::result::Result<Flow, BoxError> {
        let inputs = as_matrix(require(outputs, "inputs")?, "inputs")?;
        let probabilities = require(outputs, "probabilities")?;
        let items = outputs
            .meta("items")
            .ok_or("the model has no `items` output")?;

        let Ok(probabilities) = probabilities.view().into_dimensionality::<Ix3>() else {
            return Err(format!(
                "expected [batch, length, vocab] probabilities, got {:?}",
                probabilities.shape()
            )
            .into());
        };

        let length = probabilities.len_of(Axis(1));
        if length == 0 {
            return Ok(Flow::Continue);
        }
        let next = argmax_rows(probabilities.index_axis(Axis(1), length - 1));

        for (seed, next) in inputs.axis_iter(Axis(0)).zip(next) {
            let mut tokens: Vec<&str> = seed
                .iter()
                .filter_map(|&id| items.get(id as usize).map(String::as_str))
                .collect();
            tokens.push(items.get(next).map_or("", String::as_str));

            let text = self.tokenizer.join(&tokens);
            info!("{text:?}");
            self.generated.push(text);
        }

        Ok(Flow::Continue)
    }
}

/// Logs every detected box with its class and score.
///
/// Expects `boxes` as `[n, 4]` corners, `classes` and `scores` as `[n]`.
#[derive(Default)]
pub struct DisplayObjectDetection {
    warned: bool,
}

impl DisplayObjectDetection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Callback for DisplayObjectDetection {
    fn name(&self) -> &str {
        "infer_display_object_detection"
    }

    fn after_step(
        &mut self,
        _ctx: &RunContext,
        outputs: &AggregatedResult,
    ) -> std::result::Result<Flow, BoxError> {
        let (Some(boxes), Some(classes), Some(scores)) = (
            outputs.batch("boxes"),
            outputs.batch("classes"),
            outputs.batch("scores"),
        ) else {
            if !self.warned {
                warn!("the model produces no detections to display");
                self.warned = true;
            }
            return Ok(Flow::Continue);
        };

        let boxes = as_matrix(boxes, "boxes")?;
        for ((corners, class), score) in boxes.rows().into_iter().zip(classes).zip(scores) {
            info!(
                "class {class} ({score:.3}) at [{:.1}, {:.1}, {:.1}, {:.1}]",
                corners[0], corners[1], corners[2], corners[3]
            );
        }

        Ok(Flow::Continue)
    }
}
