use std::path::PathBuf;

use burn::{config::ConfigError, record::RecorderError};

/// Errors raised while loading data, training, rendering or persisting a model.
#[derive(thiserror::Error, Debug)]
pub enum MnistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Expected {expected} items in the {split} split, found {found}")]
    UnexpectedSplitSize {
        split: String,
        expected: usize,
        found: usize,
    },

    #[error("Record error: {0}")]
    Record(#[from] RecorderError),

    #[error("Config error at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Tensor data error: {0}")]
    TensorData(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MnistError {
    pub(crate) fn config(path: impl Into<PathBuf>, err: ConfigError) -> Self {
        Self::Config {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_input() {
        let err = MnistError::UnexpectedSplitSize {
            split: "train".to_string(),
            expected: 60_000,
            found: 3,
        };
        assert_eq!(err.to_string(), "Expected 60000 items in the train split, found 3");

        let err = MnistError::config("artifacts/config.json", ConfigError::FileNotFound("x".into()));
        assert!(err.to_string().starts_with("Config error at artifacts/config.json: "), "{err}");
    }
}
