use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    prelude::*,
    record::{DefaultFileRecorder, FullPrecisionSettings},
};

use crate::{
    error::MnistError,
    model::{Model, ModelConfig},
};

type ModelRecorder = DefaultFileRecorder<FullPrecisionSettings>;

/// Extension the named MessagePack recorder gives its files.
pub const MODEL_EXTENSION: &str = "mpk";

/// Saves the module record at `path`. The recorder sets its own file extension, the
/// returned path is the file actually written.
pub fn save_model<B: Backend>(model: Model<B>, path: &Path) -> Result<PathBuf, MnistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let recorder = ModelRecorder::new();
    model.save_file(path.to_path_buf(), &recorder)?;

    let written = path.with_extension(MODEL_EXTENSION);
    log::info!("Model saved to {}", written.display());

    Ok(written)
}

/// Rebuilds the architecture described by `config` and loads the record saved at `path`.
pub fn load_model<B: Backend>(
    config: &ModelConfig,
    path: &Path,
    device: &B::Device,
) -> Result<Model<B>, MnistError> {
    let model = config
        .init::<B>(device)
        .load_file(path.to_path_buf(), &ModelRecorder::new(), device)?;

    log::info!("Model loaded from {}", path.display());

    Ok(model)
}
