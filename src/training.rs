use std::path::Path;
use std::sync::Arc;

use burn::{
    data::dataloader::DataLoaderBuilder,
    nn::loss::CrossEntropyLossConfig,
    optim::AdamConfig,
    prelude::*,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
    train::{
        metric::{AccuracyMetric, LossMetric},
        ClassificationOutput, LearnerBuilder, TrainOutput, TrainStep, ValidStep,
    },
};

use crate::{
    data::{MnistBatch, MnistBatcher},
    dataset::MnistDataset,
    error::MnistError,
    model::{Model, ModelConfig},
};

/// Name of the training configuration saved in the artifact directory.
pub const CONFIG_FILE: &str = "config.json";
/// Log file the learner writes framework and crate logs to while training.
pub const EXPERIMENT_LOG: &str = "experiment.log";

impl<B: Backend> Model<B> {
    pub fn forward_classification(
        &self,
        images: Tensor<B, 3>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<MnistBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(&self, batch: MnistBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<MnistBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(&self, batch: MnistBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
    #[config(default = 20)]
    pub num_epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
}

// `AdamConfig` does not implement `Debug`, so it is rendered via its `Display` impl.
impl core::fmt::Debug for TrainingConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TrainingConfig")
            .field("model", &self.model)
            .field("optimizer", &format_args!("{}", self.optimizer))
            .field("num_epochs", &self.num_epochs)
            .field("batch_size", &self.batch_size)
            .field("num_workers", &self.num_workers)
            .field("seed", &self.seed)
            .field("learning_rate", &self.learning_rate)
            .finish()
    }
}

impl TrainingConfig {
    /// Loads a configuration previously written with [`Config::save`].
    pub fn load_file(path: &Path) -> Result<Self, MnistError> {
        Self::load(path).map_err(|err| MnistError::config(path, err))
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new(ModelConfig::new(), AdamConfig::new())
    }
}

fn create_artifact_dir(artifact_dir: &Path) -> Result<(), MnistError> {
    // Remove existing artifacts before to get an accurate learner summary
    if artifact_dir.join("checkpoint").exists() {
        std::fs::remove_dir_all(artifact_dir.join("checkpoint"))?;
    }
    std::fs::create_dir_all(artifact_dir)?;
    Ok(())
}

/// Fits a freshly initialized model with the framework's learner.
///
/// `dataset_valid` only feeds the per-epoch validation metrics, it never produces gradients.
/// Checkpoints, metric logs, `experiment.log` and `config.json` are written to `artifact_dir`.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &Path,
    config: &TrainingConfig,
    dataset_train: Arc<MnistDataset>,
    dataset_valid: Arc<MnistDataset>,
    device: B::Device,
) -> Result<Model<B>, MnistError> {
    create_artifact_dir(artifact_dir)?;
    config.save(artifact_dir.join(CONFIG_FILE))?;

    B::seed(config.seed);

    let batcher = MnistBatcher::default();

    let dataloader_train = DataLoaderBuilder::new(batcher.clone())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_train);

    let dataloader_valid = DataLoaderBuilder::new(batcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_valid);

    log::info!(
        "Training for {} epochs, batch size {}, learning rate {}",
        config.num_epochs,
        config.batch_size,
        config.learning_rate
    );

    let directory = artifact_dir.to_string_lossy();
    let learner = LearnerBuilder::new(&*directory)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary()
        .build(
            config.model.init::<B>(&device),
            config.optimizer.init(),
            config.learning_rate,
        );

    let model_trained = learner.fit(dataloader_train, dataloader_valid);

    Ok(model_trained)
}
