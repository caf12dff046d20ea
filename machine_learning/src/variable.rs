use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, tensor::Tensor};

/// How a variable's initial values are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Init {
    Zeros,
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    XavierUniform,
    Kaiming,
    Lecun,
}

/// The declaration of a named model variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub init: Init,
    pub trainable: bool,
}

impl VariableSpec {
    /// Creates a new trainable `VariableSpec`.
    pub fn new(name: impl Into<String>, shape: &[usize], init: Init) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            init,
            trainable: true,
        }
    }

    /// Creates a new `VariableSpec` the optimizer never updates.
    pub fn non_trainable(name: impl Into<String>, shape: &[usize], init: Init) -> Self {
        Self {
            trainable: false,
            ..Self::new(name, shape, init)
        }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// The product of every dimension but the last one.
    pub fn fan_in(&self) -> usize {
        match self.shape.split_last() {
            Some((_, rest)) if !rest.is_empty() => rest.iter().product(),
            Some((&last, _)) => last,
            None => 1,
        }
    }

    /// The last dimension.
    pub fn fan_out(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }
}

/// Read access to variable values by name.
pub trait VariableView: Sync {
    fn variable(&self, name: &str) -> Option<&Tensor>;

    /// Like `variable` but fails with `MissingVariable` when absent.
    fn require(&self, name: &str) -> Result<&Tensor> {
        self.variable(name)
            .ok_or_else(|| MlErr::MissingVariable(name.to_string()))
    }
}

impl VariableView for BTreeMap<String, Tensor> {
    fn variable(&self, name: &str) -> Option<&Tensor> {
        self.get(name)
    }
}

impl VariableView for HashMap<String, Tensor> {
    fn variable(&self, name: &str) -> Option<&Tensor> {
        self.get(name)
    }
}

/// Gradients keyed by variable name, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gradients(BTreeMap<String, Tensor>);

impl Gradients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, grad: Tensor) {
        self.0.insert(name.into(), grad);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Tensor)> {
        self.0.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Keeps only the gradients whose name satisfies `keep`.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.0.retain(|name, _| keep(name));
    }

    /// The euclidean norm of every gradient taken as a single vector.
    pub fn global_norm(&self) -> f32 {
        self.0
            .values()
            .flat_map(|g| g.iter())
            .map(|v| v * v)
            .sum::<f32>()
            .sqrt()
    }

    /// Multiplies every gradient by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for grad in self.0.values_mut() {
            grad.mapv_inplace(|v| v * factor);
        }
    }

    /// Adds `other` into `self`, inserting the names `self` lacks.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if a shared name has different shapes.
    pub fn accumulate(&mut self, other: &Gradients) -> Result<()> {
        for (name, grad) in &other.0 {
            match self.0.get_mut(name) {
                Some(acc) if acc.shape() == grad.shape() => *acc += grad,
                Some(acc) => {
                    return Err(MlErr::ShapeMismatch {
                        what: name.clone(),
                        got: grad.shape().to_vec(),
                        expected: acc.shape().to_vec(),
                    });
                }
                None => {
                    self.0.insert(name.clone(), grad.clone());
                }
            }
        }

        Ok(())
    }

    pub fn into_inner(self) -> BTreeMap<String, Tensor> {
        self.0
    }
}

impl FromIterator<(String, Tensor)> for Gradients {
    fn from_iter<T: IntoIterator<Item = (String, Tensor)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
