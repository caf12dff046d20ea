use machine_learning::{Tensor, VariableSpec};

use super::VariableStore;
use crate::error::{Result, StoreErr};

/// A per-device view of the `VariableStore` used while building a replica.
///
/// Device 0 creates the variables it declares. Every other device must find them already
/// created, so a replica can never end up with its own copy of a shared variable.
pub struct VariableScope<'a> {
    store: &'a mut VariableStore,
    device: usize,
    created: usize,
    reused: usize,
}

impl<'a> VariableScope<'a> {
    /// Creates a new `VariableScope`.
    ///
    /// # Arguments
    /// * `store` - The store shared by every replica.
    /// * `device` - The index of the device whose replica is being built.
    pub fn new(store: &'a mut VariableStore, device: usize) -> Self {
        Self {
            store,
            device,
            created: 0,
            reused: 0,
        }
    }

    pub fn device(&self) -> usize {
        self.device
    }

    /// Declares a variable for this replica.
    ///
    /// # Returns
    /// The variable's current value, or `UnsharedVariable` if a device other than the first
    /// declares a name that doesn't exist yet.
    pub fn variable(&mut self, spec: &VariableSpec) -> Result<&Tensor> {
        if self.device > 0 && !self.store.contains(&spec.name) {
            return Err(StoreErr::UnsharedVariable {
                name: spec.name.clone(),
                device: self.device,
            });
        }

        if self.store.get_or_create(spec)? {
            self.created += 1;
        } else {
            self.reused += 1;
        }

        self.store
            .get(&spec.name)
            .ok_or_else(|| StoreErr::MissingVariable(spec.name.clone()))
    }

    /// Declares every variable in `specs`.
    pub fn declare_all(&mut self, specs: &[VariableSpec]) -> Result<()> {
        for spec in specs {
            self.variable(spec)?;
        }

        Ok(())
    }

    /// The amount of variables this scope created.
    pub fn created(&self) -> usize {
        self.created
    }

    /// The amount of declarations that found an existing variable.
    pub fn reused(&self) -> usize {
        self.reused
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::Init;

    use super::*;

    fn specs() -> Vec<VariableSpec> {
        vec![
            VariableSpec::new("w", &[4, 2], Init::Kaiming),
            VariableSpec::new("b", &[2], Init::Zeros),
        ]
    }

    #[test]
    fn later_devices_reuse_the_first_devices_variables() {
        let mut store = VariableStore::new(0);

        for device in 0..4 {
            let mut scope = VariableScope::new(&mut store, device);
            scope.declare_all(&specs()).unwrap();

            let expected = if device == 0 { (2, 0) } else { (0, 2) };
            assert_eq!((scope.created(), scope.reused()), expected);
        }

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn later_devices_cannot_create() {
        let mut store = VariableStore::new(0);
        VariableScope::new(&mut store, 0)
            .declare_all(&specs())
            .unwrap();

        let mut scope = VariableScope::new(&mut store, 1);
        let extra = VariableSpec::new("device1/w", &[1], Init::Zeros);

        assert!(matches!(
            scope.variable(&extra),
            Err(StoreErr::UnsharedVariable { device: 1, .. })
        ));
        assert!(!store.contains("device1/w"));
    }
}
