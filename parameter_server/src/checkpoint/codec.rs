use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use machine_learning::Tensor;
use ndarray::IxDyn;
use safetensors::{Dtype, SafeTensors, serialize_to_file, tensor::TensorView};

use crate::error::{Result, StoreErr};

/// Writes named `f32` tensors and string metadata to a safetensors file.
///
/// # Arguments
/// * `path` - Where to write, an existing file is overwritten.
/// * `tensors` - The tensors, keyed by name.
/// * `metadata` - Free form metadata stored in the file's header.
pub fn write_tensors(
    path: &Path,
    tensors: &BTreeMap<String, Tensor>,
    metadata: HashMap<String, String>,
) -> Result<()> {
    let contiguous: Vec<_> = tensors
        .iter()
        .map(|(name, t)| (name.as_str(), t.as_standard_layout()))
        .collect();

    let views = contiguous
        .iter()
        .map(|(name, t)| {
            let values = t.as_slice().ok_or_else(|| StoreErr::Corrupt {
                path: path.to_path_buf(),
                reason: format!("`{name}` isn't contiguous"),
            })?;
            let view = TensorView::new(Dtype::F32, t.shape().to_vec(), bytemuck::cast_slice(values))?;
            Ok((*name, view))
        })
        .collect::<Result<Vec<_>>>()?;

    serialize_to_file(views, &Some(metadata), path)?;
    Ok(())
}

/// Reads every tensor and the metadata of a safetensors file.
///
/// # Returns
/// A `Corrupt` error if a tensor isn't `f32` or its data doesn't match its shape.
pub fn read_tensors(path: &Path) -> Result<(BTreeMap<String, Tensor>, HashMap<String, String>)> {
    let bytes = fs::read(path)?;

    let (_, header) = SafeTensors::read_metadata(&bytes)?;
    let metadata = header.metadata().clone().unwrap_or_default();

    let st = SafeTensors::deserialize(&bytes)?;
    let mut tensors = BTreeMap::new();

    for (name, view) in st.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(StoreErr::Corrupt {
                path: path.to_path_buf(),
                reason: format!("`{name}` has dtype {:?}, expected F32", view.dtype()),
            });
        }

        let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
        let tensor = Tensor::from_shape_vec(IxDyn(view.shape()), values).map_err(|e| {
            StoreErr::Corrupt {
                path: path.to_path_buf(),
                reason: format!("`{name}`: {e}"),
            }
        })?;

        tensors.insert(name, tensor);
    }

    Ok((tensors, metadata))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn tensors_and_metadata_survive_a_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vars.safetensors");

        let mut tensors = BTreeMap::new();
        tensors.insert(
            "w".to_string(),
            Tensor::from_shape_vec(IxDyn(&[2, 2]), vec![1., 2., 3., 4.]).unwrap(),
        );
        tensors.insert("scalar".to_string(), Tensor::from_elem(IxDyn(&[]), 7.));

        let transposed = tensors["w"].t().to_owned();
        tensors.insert("w_t".to_string(), transposed.clone());

        let metadata = HashMap::from([("global_step".to_string(), "12".to_string())]);
        write_tensors(&path, &tensors, metadata.clone()).unwrap();

        let (read, read_metadata) = read_tensors(&path).unwrap();
        assert_eq!(read, tensors);
        assert_eq!(read["w_t"], transposed);
        assert_eq!(read_metadata, metadata);
    }
}
