use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::dataset::{MnistItem, HEIGHT, WIDTH};

/// Largest raw intensity an MNIST pixel can take.
pub const MAX_INTENSITY: f32 = 255.0;

/// Rescales a raw intensity into `[0, 1]`.
pub fn normalize_pixel(value: u8) -> f32 {
    value as f32 / MAX_INTENSITY
}

impl MnistItem {
    /// The image with every intensity rescaled into `[0, 1]`.
    pub fn normalized_image(&self) -> [[f32; WIDTH]; HEIGHT] {
        self.image.map(|row| row.map(normalize_pixel))
    }
}

#[derive(Clone, Default)]
pub struct MnistBatcher {}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    /// Normalized images, `[batch_size, height, width]`.
    pub images: Tensor<B, 3>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, MnistBatch<B>> for MnistBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> MnistBatch<B> {
        let images = items
            .iter()
            .map(|item| TensorData::from(item.normalized_image()).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, device))
            .map(|tensor| tensor.reshape([1, HEIGHT, WIDTH]))
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data(
                    TensorData::from([(item.label as i64).elem::<B::IntElem>()]),
                    device,
                )
            })
            .collect();

        let images = Tensor::cat(images, 0);
        let targets = Tensor::cat(targets, 0);

        MnistBatch { images, targets }
    }
}
