//! Checkpoints are safetensors files holding one `F32` tensor per parameter tensor of the model,
//! named after `Model::param_shapes` (e.g. `layers.0.weight`).

use std::{fs, io, path::Path};

use log::info;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{MlErr, Result, arch::Model};

/// Writes `params` to `path` as a checkpoint of `model`.
pub fn save<M: Model>(path: &Path, model: &M, params: &[f32]) -> Result<()> {
    let shapes = model.param_shapes();
    let expected: usize = shapes.iter().map(|shape| shape.len()).sum();
    if params.len() != expected {
        return Err(MlErr::SizeMismatch {
            what: "checkpoint parameters",
            got: params.len(),
            expected,
        });
    }

    let mut views = Vec::with_capacity(shapes.len());
    let mut rest = params;
    for shape in &shapes {
        let (own, tail) = rest.split_at(shape.len());
        rest = tail;

        let view = TensorView::new(Dtype::F32, shape.shape.clone(), bytemuck::cast_slice(own))?;
        views.push((shape.name.as_str(), view));
    }

    let bytes = safetensors::serialize(views.iter().map(|(name, view)| (*name, view)), &None)?;
    fs::write(path, bytes).map_err(|e| with_path(e, path))?;

    info!(
        "saved {} parameters ({} tensors) to {}",
        params.len(),
        shapes.len(),
        path.display()
    );

    Ok(())
}

/// Reads the parameters of `model` from the checkpoint at `path`.
///
/// # Returns
/// The flat parameter vector, or an error if the file can't be read, or any tensor is missing,
/// isn't `F32` or doesn't have the shape the model expects.
pub fn load<M: Model>(path: &Path, model: &M) -> Result<Vec<f32>> {
    let bytes = fs::read(path).map_err(|e| with_path(e, path))?;
    let tensors = SafeTensors::deserialize(&bytes)?;

    let mut params = Vec::with_capacity(model.size());
    for expected in model.param_shapes() {
        let view = tensors
            .tensor(&expected.name)
            .map_err(|_| MlErr::Checkpoint(format!("missing tensor {}", expected.name)))?;

        if view.dtype() != Dtype::F32 {
            return Err(MlErr::Checkpoint(format!(
                "tensor {} has dtype {:?}, expected F32",
                expected.name,
                view.dtype()
            )));
        }

        if view.shape() != expected.shape.as_slice() {
            return Err(MlErr::Checkpoint(format!(
                "tensor {} has shape {:?}, expected {:?}",
                expected.name,
                view.shape(),
                expected.shape
            )));
        }

        params.extend(bytemuck::pod_collect_to_vec::<u8, f32>(view.data()));
    }

    info!("loaded {} parameters from {}", params.len(), path.display());
    Ok(params)
}

fn with_path(e: io::Error, path: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Sequential, layers::Layer};

    fn model() -> Sequential {
        Sequential::new([
            Layer::conv2d(1, 2, 3, None),
            Layer::flatten(),
            Layer::dense((8, 3), None),
        ])
    }

    #[test]
    fn round_trips_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let model = model();
        let params: Vec<f32> = (0..model.size()).map(|i| i as f32 * 0.25 - 3.).collect();

        save(&path, &model, &params).unwrap();
        let loaded = load(&path, &model).unwrap();

        assert_eq!(loaded, params);
    }

    #[test]
    fn rejects_a_different_architecture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let model = model();
        save(&path, &model, &vec![0.; model.size()]).unwrap();

        let wider = Sequential::new([
            Layer::conv2d(1, 2, 3, None),
            Layer::flatten(),
            Layer::dense((8, 4), None),
        ]);
        let err = load(&path, &wider).unwrap_err();
        assert!(matches!(err, MlErr::Checkpoint(ref msg) if msg.contains("layers.2.weight")));

        let deeper = Sequential::new([
            Layer::conv2d(1, 2, 3, None),
            Layer::flatten(),
            Layer::dense((8, 3), None),
            Layer::dense((3, 3), None),
        ]);
        let err = load(&path, &deeper).unwrap_err();
        assert!(matches!(err, MlErr::Checkpoint(ref msg) if msg.contains("missing tensor layers.3")));
    }

    #[test]
    fn rejects_garbage_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.safetensors");
        fs::write(&path, b"definitely not a checkpoint").unwrap();

        assert!(matches!(load(&path, &model()), Err(MlErr::Checkpoint(_))));
        assert!(matches!(
            load(&dir.path().join("nope.safetensors"), &model()),
            Err(MlErr::Io(_))
        ));
    }

    #[test]
    fn save_rejects_wrong_param_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        assert!(matches!(
            save(&path, &model(), &[1., 2.]),
            Err(MlErr::SizeMismatch { .. })
        ));
        assert!(!path.exists());
    }
}
