use std::collections::HashMap;

use super::{Optimizer, OptimizerKind};
use crate::Result;

/// One optimizer state per variable, created on the variable's first update.
pub struct OptimizerSlots {
    kind: OptimizerKind,
    slots: HashMap<String, Box<dyn Optimizer>>,
}

impl OptimizerSlots {
    pub fn new(kind: OptimizerKind) -> Self {
        Self {
            kind,
            slots: HashMap::new(),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        self.kind
    }

    /// Applies one update to the variable `name`.
    ///
    /// # Arguments
    /// * `name` - The variable's name, keys its optimizer state.
    /// * `lr` - The learning rate for this step.
    /// * `grad` - The variable's gradient.
    /// * `params` - The variable's values.
    ///
    /// # Returns
    /// An error if the gradient, the values and the existing state differ in size.
    pub fn apply(&mut self, name: &str, lr: f32, grad: &[f32], params: &mut [f32]) -> Result<()> {
        let kind = self.kind;
        let optimizer = self
            .slots
            .entry(name.to_string())
            .or_insert_with(|| kind.build(params.len()));

        optimizer.update_params(lr, grad, params)
    }

    /// The amount of variables with optimizer state.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
