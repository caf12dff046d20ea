use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{GLOBAL_STEP, codec::write_tensors};
use crate::{
    error::{Result, StoreErr},
    storage::VariableStore,
};

const MANIFEST: &str = "checkpoint.json";
const PREFIX: &str = "model.ckpt-";
const EXTENSION: &str = ".safetensors";

/// One retained checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub step: u64,
    pub file: String,
}

/// The retained checkpoints, oldest first.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    checkpoints: Vec<CheckpointEntry>,
}

/// A directory of periodic snapshots of the variable store.
///
/// At most `keep_max` checkpoints are kept, once a save exceeds it the oldest ones are deleted.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    keep_max: usize,
    manifest: Manifest,
}

impl CheckpointStore {
    /// Opens the checkpoint directory, creating it if needed.
    ///
    /// # Arguments
    /// * `dir` - The directory the checkpoints are written to.
    /// * `keep_max` - The maximum amount of checkpoints retained, at least 1.
    ///
    /// # Returns
    /// The store, resuming the retention of a previous run when a manifest exists.
    pub fn open(dir: impl Into<PathBuf>, keep_max: usize) -> Result<Self> {
        if keep_max == 0 {
            return Err(StoreErr::ZeroRetention);
        }

        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let manifest = match fs::read(dir.join(MANIFEST)) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            dir,
            keep_max,
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a checkpoint of every variable in `store` and evicts the oldest ones over the limit.
    ///
    /// # Arguments
    /// * `store` - The variables to persist.
    /// * `step` - The global step the snapshot belongs to.
    ///
    /// # Returns
    /// The path of the new checkpoint.
    pub fn save(&mut self, store: &VariableStore, step: u64) -> Result<PathBuf> {
        let file = format!("{PREFIX}{step}{EXTENSION}");
        let path = self.dir.join(&file);

        let metadata = HashMap::from([(GLOBAL_STEP.to_string(), step.to_string())]);
        write_tensors(&path, &store.snapshot(), metadata)?;

        let checkpoints = &mut self.manifest.checkpoints;
        checkpoints.retain(|entry| entry.step != step);
        checkpoints.push(CheckpointEntry { step, file });

        while checkpoints.len() > self.keep_max {
            let oldest = checkpoints.remove(0);
            match fs::remove_file(self.dir.join(&oldest.file)) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => debug!(step = oldest.step; "evicted checkpoint"),
            }
        }

        self.write_manifest()?;
        info!(step = step; "saved checkpoint {}", path.display());

        Ok(path)
    }

    /// The path of the most recent checkpoint, if any.
    pub fn latest(&self) -> Option<PathBuf> {
        self.manifest
            .checkpoints
            .last()
            .map(|entry| self.dir.join(&entry.file))
    }

    /// The retained checkpoints, oldest first.
    pub fn retained(&self) -> &[CheckpointEntry] {
        &self.manifest.checkpoints
    }

    fn write_manifest(&self) -> Result<()> {
        let tmp = self.dir.join(format!("{MANIFEST}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(&self.manifest)?)?;
        fs::rename(tmp, self.dir.join(MANIFEST))?;
        Ok(())
    }
}

/// Finds the most recent checkpoint in `dir` without opening it for writing.
///
/// The manifest is used when present, otherwise the checkpoint file with the highest step.
///
/// # Returns
/// `None` if the directory doesn't exist or holds no checkpoint.
pub fn latest_checkpoint(dir: &Path) -> Result<Option<PathBuf>> {
    match fs::read(dir.join(MANIFEST)) {
        Ok(bytes) => {
            let manifest: Manifest = serde_json::from_slice(&bytes)?;
            return Ok(manifest.checkpoints.last().map(|entry| dir.join(&entry.file)));
        }
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
        Err(_) => {}
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut latest: Option<(u64, PathBuf)> = None;
    for entry in entries {
        let path = entry?.path();
        let Some(step) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION))
            .and_then(|step| step.parse::<u64>().ok())
        else {
            continue;
        };

        if latest.as_ref().is_none_or(|(best, _)| step > *best) {
            latest = Some((step, path));
        }
    }

    Ok(latest.map(|(_, path)| path))
}
