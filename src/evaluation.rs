use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
};

use crate::{
    data::{MnistBatch, MnistBatcher},
    dataset::MnistItem,
    error::MnistError,
    inference::{argmax, into_vec},
    model::Model,
};

/// Aggregate metrics of one pass over a dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Mean cross-entropy per item.
    pub loss: f64,
    /// Fraction of items whose predicted label matches the target, in `[0, 1]`.
    pub accuracy: f64,
    pub num_items: usize,
}

/// Computes loss and accuracy over the whole dataset in a single sequential pass.
///
/// Run it with a model on a non-autodiff backend so dropout stays inactive.
pub fn evaluate<B: Backend, D: Dataset<MnistItem>>(
    model: &Model<B>,
    dataset: &D,
    batch_size: usize,
    device: &B::Device,
) -> Result<Evaluation, MnistError> {
    let batcher = MnistBatcher::default();
    let loss_fn = CrossEntropyLossConfig::new().init::<B>(device);
    let batch_size = batch_size.max(1);

    let mut loss_sum = 0.0;
    let mut num_correct = 0;
    let mut num_items = 0;

    for start in (0..dataset.len()).step_by(batch_size) {
        let end = usize::min(start + batch_size, dataset.len());
        let items: Vec<MnistItem> = (start..end).filter_map(|index| dataset.get(index)).collect();
        let labels: Vec<usize> = items.iter().map(|item| item.label as usize).collect();

        let batch: MnistBatch<B> = batcher.batch(items, device);
        let output = model.forward(batch.images);
        let [_, num_classes] = output.dims();

        let loss = loss_fn.forward(output.clone(), batch.targets);
        loss_sum += loss.into_scalar().elem::<f64>() * labels.len() as f64;

        let scores = into_vec(output)?;
        num_correct += scores
            .chunks_exact(num_classes)
            .zip(&labels)
            .filter(|(scores, label)| argmax(scores) == **label)
            .count();
        num_items += labels.len();
    }

    if num_items == 0 {
        return Ok(Evaluation {
            loss: 0.0,
            accuracy: 0.0,
            num_items,
        });
    }

    Ok(Evaluation {
        loss: loss_sum / num_items as f64,
        accuracy: num_correct as f64 / num_items as f64,
        num_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::{tests::synthetic_item, MnistDataset},
        inference::predict,
        model::ModelConfig,
        TestBackend,
    };

    #[test]
    fn counts_every_item_once() {
        let device = Default::default();
        let model = ModelConfig::new().init::<TestBackend>(&device);
        let items: Vec<_> = (0..7).map(|label| synthetic_item(label % 10)).collect();
        let dataset = MnistDataset::from_items(items.clone());

        let evaluation = evaluate(&model, &dataset, 3, &device).unwrap();

        assert_eq!(evaluation.num_items, 7);
        assert!((0.0..=1.0).contains(&evaluation.accuracy));
        assert!(evaluation.loss.is_finite() && evaluation.loss > 0.0);

        // Accuracy agrees with the predictor's labels.
        let predictions = predict(&model, &items, 7, &device).unwrap();
        let correct = predictions
            .iter()
            .zip(&items)
            .filter(|(prediction, item)| prediction.label == item.label as usize)
            .count();
        assert_eq!(evaluation.accuracy, correct as f64 / 7.0);
    }

    #[test]
    fn batch_size_does_not_change_the_result() {
        let device = Default::default();
        let model = ModelConfig::new().init::<TestBackend>(&device);
        let dataset = MnistDataset::from_items((0..6).map(synthetic_item).collect());

        let whole = evaluate(&model, &dataset, 6, &device).unwrap();
        let split = evaluate(&model, &dataset, 4, &device).unwrap();

        assert_eq!(whole.accuracy, split.accuracy);
        assert!((whole.loss - split.loss).abs() < 1e-5);
    }

    #[test]
    fn empty_dataset_yields_zero_items() {
        let device = Default::default();
        let model = ModelConfig::new().init::<TestBackend>(&device);
        let dataset = MnistDataset::from_items(Vec::new());

        let evaluation = evaluate(&model, &dataset, 32, &device).unwrap();

        assert_eq!(evaluation.num_items, 0);
    }
}
