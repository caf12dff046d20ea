use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use machine_learning::{NameFilter, Tensor};

use super::{GLOBAL_STEP, codec::read_tensors};
use crate::{
    error::{Result, StoreErr},
    storage::VariableStore,
};

/// A snapshot of the variables read back from disk.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
    step: u64,
    tensors: BTreeMap<String, Tensor>,
}

/// What a filtered restore did with each of the store's variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredRestore {
    pub restored: Vec<String>,
    /// Matched by the exclusion filter, left at their current value.
    pub skipped: Vec<String>,
    /// Not present in the checkpoint, left at their current value.
    pub missing: Vec<String>,
    /// The checkpoint's global step, unless the filter excludes it.
    pub step: Option<u64>,
}

impl Checkpoint {
    /// Reads a checkpoint file.
    ///
    /// # Returns
    /// A `Corrupt` error if the file has no global step in its metadata.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (tensors, metadata) = read_tensors(path)?;
        let step = parse_step(path, &metadata)?;

        Ok(Self {
            path: path.to_path_buf(),
            step,
            tensors,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Overwrites every variable of `store` with the checkpoint's value.
    ///
    /// # Returns
    /// The checkpoint's global step, `NotInCheckpoint` if a variable is missing from the
    /// checkpoint or `RestoreMismatch` if the shapes differ.
    pub fn restore(&self, store: &mut VariableStore) -> Result<u64> {
        let names: Vec<String> = store.names().map(String::from).collect();

        for name in &names {
            let value = self.get(name).ok_or_else(|| StoreErr::NotInCheckpoint {
                name: name.clone(),
                path: self.path.clone(),
            })?;

            store.assign(name, value.clone())?;
        }

        debug!(variables = names.len(), step = self.step; "restored checkpoint");
        Ok(self.step)
    }

    /// Overwrites the variables of `store` that `skip` doesn't match.
    ///
    /// Variables the checkpoint lacks keep their current value. A shape difference is only an
    /// error for variables that aren't excluded.
    ///
    /// # Arguments
    /// * `store` - The store to write to.
    /// * `skip` - Matches the names that must keep their current value.
    pub fn restore_filtered(
        &self,
        store: &mut VariableStore,
        skip: &NameFilter,
    ) -> Result<FilteredRestore> {
        let names: Vec<String> = store.names().map(String::from).collect();
        let mut report = FilteredRestore::default();

        for name in names {
            if skip.matches(&name) {
                report.skipped.push(name);
                continue;
            }

            match self.get(&name) {
                Some(value) => {
                    store.assign(&name, value.clone())?;
                    report.restored.push(name);
                }
                None => {
                    warn!("`{name}` is not in {}, keeping its initial value", self.path.display());
                    report.missing.push(name);
                }
            }
        }

        if !skip.matches(GLOBAL_STEP) {
            report.step = Some(self.step);
        }

        Ok(report)
    }
}

fn parse_step(path: &Path, metadata: &HashMap<String, String>) -> Result<u64> {
    let corrupt = |reason: String| StoreErr::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    metadata
        .get(GLOBAL_STEP)
        .ok_or_else(|| corrupt(format!("no `{GLOBAL_STEP}` in the metadata")))?
        .parse()
        .map_err(|e| corrupt(format!("bad `{GLOBAL_STEP}`: {e}")))
}
