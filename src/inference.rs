use burn::{data::dataloader::batcher::Batcher, prelude::*, tensor::activation::softmax};

use crate::{
    data::{MnistBatch, MnistBatcher},
    dataset::MnistItem,
    error::MnistError,
    model::Model,
};

/// Class scores of a single image and the label they select.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Unnormalized class scores (logits).
    pub scores: Vec<f32>,
    /// Softmax of the scores.
    pub probabilities: Vec<f32>,
    /// Index of the highest score.
    pub label: usize,
}

/// Index of the maximum score. Ties resolve to the lowest index, NaN scores are never
/// selected and an empty slice yields 0.
pub fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;

    for (index, score) in scores.iter().copied().enumerate() {
        if score > best_score {
            best = index;
            best_score = score;
        }
    }

    best
}

/// Runs the model over `items` in batches and reduces every score vector to a label.
pub fn predict<B: Backend>(
    model: &Model<B>,
    items: &[MnistItem],
    batch_size: usize,
    device: &B::Device,
) -> Result<Vec<Prediction>, MnistError> {
    let batcher = MnistBatcher::default();
    let mut predictions = Vec::with_capacity(items.len());

    for chunk in items.chunks(batch_size.max(1)) {
        let batch: MnistBatch<B> = batcher.batch(chunk.to_vec(), device);
        let output = model.forward(batch.images);
        let [_, num_classes] = output.dims();

        let probabilities = into_vec(softmax(output.clone(), 1))?;
        let scores = into_vec(output)?;

        predictions.extend(
            scores
                .chunks_exact(num_classes)
                .zip(probabilities.chunks_exact(num_classes))
                .map(|(scores, probabilities)| Prediction {
                    label: argmax(scores),
                    scores: scores.to_vec(),
                    probabilities: probabilities.to_vec(),
                }),
        );
    }

    Ok(predictions)
}

/// Copies a float tensor to the host as a flat `f32` vector.
pub(crate) fn into_vec<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
) -> Result<Vec<f32>, MnistError> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| MnistError::TensorData(format!("{err:?}")))
}
