//! Convolutional MNIST digit classifier built on the burn framework.
//!
//! The crate loads the MNIST partitions, trains a small CNN with the framework's
//! learner, evaluates it on the test split, renders sample and prediction grids
//! and persists the trained weights.

pub mod cli;
pub mod data;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod show;
pub mod training;

pub use error::MnistError;

#[cfg(test)]
pub(crate) type TestBackend = burn::backend::NdArray<f32>;
