use std::collections::{BTreeMap, HashMap};

use log::debug;
use machine_learning::{
    Gradients, MlErr, Tensor, VariableSpec, VariableView, optimization::OptimizerSlots,
};
use ndarray::IxDyn;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    error::{Result, StoreErr},
    initialization::param_gen_for,
};

/// One named variable and its current value.
#[derive(Debug, Clone)]
struct Variable {
    spec: VariableSpec,
    value: Tensor,
}

/// The single writable copy of every model variable.
///
/// Variables are created once by name and kept in creation order. Replicas read through the
/// `VariableView` implementation, only `assign` and `apply_gradients` write, and both take
/// `&mut self`.
#[derive(Debug)]
pub struct VariableStore {
    vars: Vec<Variable>,
    index: HashMap<String, usize>,
    rng: StdRng,
}

impl VariableStore {
    /// Creates a new empty `VariableStore`.
    ///
    /// # Arguments
    /// * `seed` - Seeds the generator the initial values are drawn from.
    pub fn new(seed: u64) -> Self {
        Self {
            vars: Vec::new(),
            index: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns the variable named like `spec`, creating and initializing it if it doesn't exist.
    ///
    /// # Arguments
    /// * `spec` - The variable's declaration.
    ///
    /// # Returns
    /// Whether the variable was created, or a `ShapeConflict` if a variable with the same name
    /// but a different shape already exists.
    pub fn get_or_create(&mut self, spec: &VariableSpec) -> Result<bool> {
        if let Some(&i) = self.index.get(&spec.name) {
            let existing = &self.vars[i].spec;
            if existing.shape != spec.shape {
                return Err(StoreErr::ShapeConflict {
                    name: spec.name.clone(),
                    existing: existing.shape.clone(),
                    requested: spec.shape.clone(),
                });
            }
            return Ok(false);
        }

        let param_gen = param_gen_for(spec).map_err(|source| StoreErr::Init {
            name: spec.name.clone(),
            source,
        })?;
        let values = param_gen.sample(&mut self.rng, spec.numel());
        let value = Tensor::from_shape_vec(IxDyn(&spec.shape), values).map_err(|_| {
            StoreErr::ShapeConflict {
                name: spec.name.clone(),
                existing: vec![spec.numel()],
                requested: spec.shape.clone(),
            }
        })?;

        debug!(name = spec.name.as_str(), numel = spec.numel(); "created variable");

        self.index.insert(spec.name.clone(), self.vars.len());
        self.vars.push(Variable {
            spec: spec.clone(),
            value,
        });

        Ok(true)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The amount of variables in the store.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Every variable name, in creation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|v| v.spec.name.as_str())
    }

    /// The names of the variables the optimizer may update, in creation order.
    pub fn trainable_names(&self) -> impl Iterator<Item = &str> {
        self.vars
            .iter()
            .filter(|v| v.spec.trainable)
            .map(|v| v.spec.name.as_str())
    }

    pub fn spec(&self, name: &str) -> Option<&VariableSpec> {
        self.index.get(name).map(|&i| &self.vars[i].spec)
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.index.get(name).map(|&i| &self.vars[i].value)
    }

    /// The amount of scalars across every variable.
    pub fn numel(&self) -> usize {
        self.vars.iter().map(|v| v.value.len()).sum()
    }

    /// Overwrites the value of an existing variable.
    ///
    /// # Arguments
    /// * `name` - The variable's name.
    /// * `value` - The new value, must have the variable's shape.
    ///
    /// # Returns
    /// `MissingVariable` if there's no such variable, `RestoreMismatch` if the shapes differ.
    pub fn assign(&mut self, name: &str, value: Tensor) -> Result<()> {
        let var = self.variable_mut(name)?;

        if var.value.shape() != value.shape() {
            return Err(StoreErr::RestoreMismatch {
                name: name.to_string(),
                checkpoint: value.shape().to_vec(),
                store: var.value.shape().to_vec(),
            });
        }

        var.value = value.as_standard_layout().into_owned();
        Ok(())
    }

    /// Applies one optimizer step to every variable in `grads`.
    ///
    /// # Arguments
    /// * `grads` - The aggregated gradients, keyed by variable name.
    /// * `learning_rate` - The learning rate for this step.
    /// * `slots` - The optimizer state of each variable.
    ///
    /// # Returns
    /// An error if a gradient names an unknown variable or doesn't match its size.
    pub fn apply_gradients(
        &mut self,
        grads: &Gradients,
        learning_rate: f32,
        slots: &mut OptimizerSlots,
    ) -> Result<()> {
        for (name, grad) in grads.iter() {
            let var = self.variable_mut(name)?;
            if var.value.shape() != grad.shape() {
                return Err(StoreErr::ShapeConflict {
                    name: name.to_string(),
                    existing: var.value.shape().to_vec(),
                    requested: grad.shape().to_vec(),
                });
            }

            let shape = grad.shape().to_vec();
            let grad = grad.as_standard_layout();
            let (Some(grad), Some(params)) = (grad.as_slice(), var.value.as_slice_mut()) else {
                return Err(MlErr::ShapeMismatch {
                    what: format!("non contiguous `{name}`"),
                    got: shape.clone(),
                    expected: shape,
                }
                .into());
            };

            slots.apply(name, learning_rate, grad, params)?;
        }

        Ok(())
    }

    /// Copies every variable's value, keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, Tensor> {
        self.vars
            .iter()
            .map(|v| (v.spec.name.clone(), v.value.clone()))
            .collect()
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Variable> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| StoreErr::MissingVariable(name.to_string()))?;

        Ok(&mut self.vars[i])
    }
}

impl VariableView for VariableStore {
    fn variable(&self, name: &str) -> Option<&Tensor> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::{Init, optimization::OptimizerKind};

    use super::*;

    fn weights() -> VariableSpec {
        VariableSpec::new("dense/weights", &[2, 3], Init::XavierUniform)
    }

    #[test]
    fn creates_once_then_reuses() {
        let mut store = VariableStore::new(0);

        assert!(store.get_or_create(&weights()).unwrap());
        let before = store.get("dense/weights").unwrap().clone();

        assert!(!store.get_or_create(&weights()).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("dense/weights").unwrap(), &before);
    }

    #[test]
    fn same_name_different_shape_is_a_conflict() {
        let mut store = VariableStore::new(0);
        store.get_or_create(&weights()).unwrap();

        let other = VariableSpec::new("dense/weights", &[3, 2], Init::Zeros);
        assert!(matches!(
            store.get_or_create(&other),
            Err(StoreErr::ShapeConflict { .. })
        ));
    }

    #[test]
    fn seeded_stores_initialize_identically() {
        let mut a = VariableStore::new(9);
        let mut b = VariableStore::new(9);
        a.get_or_create(&weights()).unwrap();
        b.get_or_create(&weights()).unwrap();

        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn trainable_names_skip_frozen_variables() {
        let mut store = VariableStore::new(0);
        store.get_or_create(&weights()).unwrap();
        store
            .get_or_create(&VariableSpec::non_trainable("ema", &[1], Init::Zeros))
            .unwrap();

        assert_eq!(store.names().count(), 2);
        assert_eq!(store.trainable_names().collect::<Vec<_>>(), ["dense/weights"]);
    }

    #[test]
    fn apply_gradients_updates_the_named_variables() {
        let mut store = VariableStore::new(0);
        store
            .get_or_create(&VariableSpec::new("b", &[2], Init::Const { value: 1. }))
            .unwrap();

        let mut grads = Gradients::new();
        grads.insert("b", Tensor::from_elem(IxDyn(&[2]), 2.));
        let mut slots = OptimizerSlots::new(OptimizerKind::Sgd);

        store.apply_gradients(&grads, 0.25, &mut slots).unwrap();

        assert_eq!(store.get("b").unwrap().as_slice().unwrap(), &[0.5, 0.5]);
    }

    #[test]
    fn assign_checks_the_shape() {
        let mut store = VariableStore::new(0);
        store.get_or_create(&weights()).unwrap();

        assert!(store
            .assign("dense/weights", Tensor::zeros(IxDyn(&[3, 2])))
            .is_err());
        assert!(matches!(
            store.assign("nope", Tensor::zeros(IxDyn(&[1]))),
            Err(StoreErr::MissingVariable(_))
        ));
        store
            .assign("dense/weights", Tensor::zeros(IxDyn(&[2, 3])))
            .unwrap();
        assert!(store.get("dense/weights").unwrap().iter().all(|&v| v == 0.));
    }
}
