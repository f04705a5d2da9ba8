use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{error::MnistError, pipeline::Paths, training::TrainingConfig};

/// Trains, evaluates and persists a convolutional MNIST digit classifier.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Directory receiving the config, checkpoints, experiment log, rendered grids and model.
    #[arg(long, global = true, default_value = "/tmp/mnist-cnn")]
    pub artifact_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train on the train split, evaluate on the test split, render predictions and save the model.
    Train(TrainArgs),
    /// Reload a saved model and predict a random sample of the test split.
    Infer(InferArgs),
    /// Render the first training images with their labels.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training configuration JSON; the flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub num_epochs: Option<usize>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub learning_rate: Option<f64>,
    #[arg(long)]
    pub num_workers: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Where to save the trained model [default: <artifact-dir>/model.mpk].
    #[arg(long)]
    pub model_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InferArgs {
    /// Saved model [default: <artifact-dir>/model.mpk].
    #[arg(long)]
    pub model_path: Option<PathBuf>,
    #[arg(long, default_value_t = 100)]
    pub num_samples: usize,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long, default_value_t = 25)]
    pub num_images: usize,
}

impl Cli {
    pub fn paths(&self) -> Paths {
        Paths {
            artifact_dir: self.artifact_dir.clone(),
        }
    }
}

impl Command {
    /// Training logs through the learner's `experiment.log` in the artifact directory,
    /// the other commands log to stderr.
    pub fn logs_to_stderr(&self) -> bool {
        !matches!(self, Command::Train(_))
    }
}

impl TrainArgs {
    /// The configuration file (or the defaults) with command-line overrides applied.
    pub fn training_config(&self) -> Result<TrainingConfig, MnistError> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::load_file(path)?,
            None => TrainingConfig::default(),
        };

        if let Some(num_epochs) = self.num_epochs {
            config.num_epochs = num_epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(num_workers) = self.num_workers {
            config.num_workers = num_workers;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        Ok(config)
    }
}
