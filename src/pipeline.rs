use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use burn::{
    data::dataset::Dataset, module::AutodiffModule, prelude::*, tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    dataset::{MnistDataset, MnistItem},
    error::MnistError,
    evaluation::{evaluate, Evaluation},
    inference::predict,
    persist::{load_model, save_model},
    show::{render_predictions, render_samples, save_image},
    training::{train, TrainingConfig, CONFIG_FILE},
};

/// Grid of training samples rendered before training.
pub const SAMPLES_IMAGE: &str = "samples.png";
/// Grid of random test predictions rendered after training or inference.
pub const PREDICTIONS_IMAGE: &str = "predictions.png";
/// Default model file stem inside the artifact directory.
pub const MODEL_FILE: &str = "model";

const NUM_SAMPLE_IMAGES: usize = 25;
const NUM_PREDICTION_IMAGES: usize = 100;

/// Locations the pipeline reads from and writes to.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config, checkpoints, experiment log, rendered grids and the default model file.
    pub artifact_dir: PathBuf,
}

impl Paths {
    pub fn default_model_path(&self) -> PathBuf {
        self.artifact_dir.join(MODEL_FILE)
    }
}

/// Load, visualize, train, evaluate, predict, visualize and persist, in that order.
///
/// Any failing step aborts the whole sequence.
pub fn run_training<B: AutodiffBackend>(
    paths: &Paths,
    config: &TrainingConfig,
    model_path: &Path,
    device: B::Device,
) -> Result<Evaluation, MnistError> {
    let dataset_train = Arc::new(MnistDataset::train()?);
    let dataset_test = Arc::new(MnistDataset::test()?);

    let samples = first_items(dataset_train.as_ref(), NUM_SAMPLE_IMAGES);
    save_image(
        &render_samples(&samples, grid_columns(samples.len())),
        &paths.artifact_dir.join(SAMPLES_IMAGE),
    )?;

    let now = Instant::now();
    let model = train::<B>(
        &paths.artifact_dir,
        config,
        dataset_train,
        dataset_test.clone(),
        device.clone(),
    )?;
    let elapsed = now.elapsed().as_secs();
    log::info!("Training completed in {}m{}s", elapsed / 60, elapsed % 60);

    // Evaluation and prediction run without autodiff, so dropout is disabled.
    let model = model.valid();

    let evaluation = evaluate(&model, dataset_test.as_ref(), config.batch_size, &device)?;
    log::info!(
        "Test accuracy: {:.2}% (loss {:.4}, {} images)",
        evaluation.accuracy * 100.0,
        evaluation.loss,
        evaluation.num_items
    );

    let sample = sample_items(dataset_test.as_ref(), NUM_PREDICTION_IMAGES, config.seed);
    let predictions = predict(&model, &sample, config.batch_size, &device)?;
    save_image(
        &render_predictions(&sample, &predictions, grid_columns(sample.len())),
        &paths.artifact_dir.join(PREDICTIONS_IMAGE),
    )?;

    save_model(model, model_path)?;

    Ok(evaluation)
}

/// Reloads a persisted model and predicts a random sample of the test split.
///
/// Returns loss and accuracy over that sample.
pub fn run_inference<B: Backend>(
    paths: &Paths,
    model_path: &Path,
    num_samples: usize,
    seed: u64,
    device: B::Device,
) -> Result<Evaluation, MnistError> {
    let config = TrainingConfig::load_file(&paths.artifact_dir.join(CONFIG_FILE))?;
    let model = load_model::<B>(&config.model, model_path, &device)?;
    let dataset_test = MnistDataset::test()?;

    let sample = sample_items(&dataset_test, num_samples, seed);
    let predictions = predict(&model, &sample, config.batch_size, &device)?;

    for (item, prediction) in sample.iter().zip(&predictions) {
        log::debug!("Predicted {} Expected {}", prediction.label, item.label);
    }

    let evaluation = evaluate(
        &model,
        &MnistDataset::from_items(sample.clone()),
        config.batch_size,
        &device,
    )?;
    log::info!(
        "Sample accuracy: {:.2}% over {} images",
        evaluation.accuracy * 100.0,
        evaluation.num_items
    );

    save_image(
        &render_predictions(&sample, &predictions, grid_columns(sample.len())),
        &paths.artifact_dir.join(PREDICTIONS_IMAGE),
    )?;

    Ok(evaluation)
}

/// Renders the first `num_images` training images with their labels.
pub fn run_show(paths: &Paths, num_images: usize) -> Result<PathBuf, MnistError> {
    let dataset_train = MnistDataset::train()?;
    let samples = first_items(&dataset_train, num_images);

    let path = paths.artifact_dir.join(SAMPLES_IMAGE);
    save_image(&render_samples(&samples, grid_columns(samples.len())), &path)?;

    Ok(path)
}

fn first_items<D: Dataset<MnistItem>>(dataset: &D, count: usize) -> Vec<MnistItem> {
    (0..count.min(dataset.len()))
        .filter_map(|index| dataset.get(index))
        .collect()
}

/// Draws `count` items uniformly at random, with replacement.
pub fn sample_items<D: Dataset<MnistItem>>(dataset: &D, count: usize, seed: u64) -> Vec<MnistItem> {
    if dataset.is_empty() {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .filter_map(|_| dataset.get(rng.random_range(0..dataset.len())))
        .collect()
}

/// Columns of the smallest square grid holding `count` cells.
pub fn grid_columns(count: usize) -> usize {
    let mut columns = 1;
    while columns * columns < count {
        columns += 1;
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::synthetic_item;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(25, 5)]
    #[case(26, 6)]
    #[case(100, 10)]
    fn square_grids(#[case] count: usize, #[case] columns: usize) {
        assert_eq!(grid_columns(count), columns);
    }

    #[test]
    fn sampling_is_seeded_and_in_range() {
        let dataset = MnistDataset::from_items((0..10).map(synthetic_item).collect());

        let first = sample_items(&dataset, 100, 7);
        let second = sample_items(&dataset, 100, 7);

        assert_eq!(first.len(), 100);
        assert_eq!(first, second);
    }

    #[test]
    fn sampling_an_empty_dataset_yields_nothing() {
        let dataset = MnistDataset::from_items(Vec::new());

        assert!(sample_items(&dataset, 10, 0).is_empty());
    }

    #[test]
    fn first_items_are_clamped_to_dataset_length() {
        let dataset = MnistDataset::from_items((0..3).map(synthetic_item).collect());

        let items = first_items(&dataset, 25);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].label, 0);
    }

    #[test]
    fn inference_requires_a_training_config() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            artifact_dir: dir.path().to_path_buf(),
        };

        let result = run_inference::<crate::TestBackend>(
            &paths,
            &paths.default_model_path(),
            10,
            0,
            Default::default(),
        );

        assert!(matches!(result, Err(MnistError::Config { .. })));
    }

    #[test]
    #[ignore = "Downloads MNIST and trains for 20 epochs"]
    fn reaches_reference_accuracy() {
        type B = burn::backend::Autodiff<crate::TestBackend>;
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            artifact_dir: dir.path().to_path_buf(),
        };

        let evaluation = run_training::<B>(
            &paths,
            &TrainingConfig::default(),
            &paths.default_model_path(),
            Default::default(),
        )
        .unwrap();

        assert_eq!(evaluation.num_items, crate::dataset::TEST_LEN);
        assert!(evaluation.accuracy > 0.97, "accuracy {}", evaluation.accuracy);
        assert!(dir.path().join("model.mpk").exists());
    }
}
