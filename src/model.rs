use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    prelude::*,
};

use crate::dataset::{HEIGHT, NUM_CLASSES, WIDTH};

/// Two 3x3 convolutions, a 2x2 max-pool, dropout and a dense projection to class logits.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    dropout: Dropout,
    linear: Linear<B>,
    activation: Relu,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = "NUM_CLASSES")]
    pub num_classes: usize,
    #[config(default = 32)]
    pub conv1_channels: usize,
    #[config(default = 64)]
    pub conv2_channels: usize,
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 2)]
    pub pool_size: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl ModelConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let kernel = [self.kernel_size, self.kernel_size];
        let pool = [self.pool_size, self.pool_size];

        Model {
            conv1: Conv2dConfig::new([1, self.conv1_channels], kernel).init(device),
            conv2: Conv2dConfig::new([self.conv1_channels, self.conv2_channels], kernel)
                .init(device),
            pool: MaxPool2dConfig::new(pool).with_strides(pool).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            linear: LinearConfig::new(self.flattened_size(), self.num_classes).init(device),
            activation: Relu::new(),
        }
    }

    /// Feature count reaching the dense layer: two valid convolutions shrink each side by
    /// `kernel_size - 1`, then pooling divides it by `pool_size`.
    pub fn flattened_size(&self) -> usize {
        let shrink = 2 * (self.kernel_size - 1);
        let height = (HEIGHT - shrink) / self.pool_size;
        let width = (WIDTH - shrink) / self.pool_size;

        self.conv2_channels * height * width
    }
}

impl<B: Backend> Model<B> {
    /// # Shapes
    ///   - Images [batch_size, height, width]
    ///   - Output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, height, width] = images.dims();

        // Create a channel at the second dimension.
        let x = images.reshape([batch_size, 1, height, width]);

        let x = self.conv1.forward(x); // [batch_size, 32, 26, 26]
        let x = self.activation.forward(x);
        let x = self.conv2.forward(x); // [batch_size, 64, 24, 24]
        let x = self.activation.forward(x);
        let x = self.pool.forward(x); // [batch_size, 64, 12, 12]
        let x = self.dropout.forward(x);

        let x = x.flatten::<2>(1, 3); // [batch_size, 9216]

        self.linear.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;
    use burn::backend::Autodiff;
    use rstest::rstest;

    #[test]
    fn default_architecture() {
        let config = ModelConfig::new();

        assert_eq!(config.num_classes, 10);
        assert_eq!(config.conv1_channels, 32);
        assert_eq!(config.conv2_channels, 64);
        assert_eq!(config.kernel_size, 3);
        assert_eq!(config.dropout, 0.5);
        assert_eq!(config.flattened_size(), 64 * 12 * 12);
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    fn produces_ten_scores_per_image(#[case] batch_size: usize) {
        let device = Default::default();
        let model = ModelConfig::new().init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 3>::ones([batch_size, HEIGHT, WIDTH], &device);

        let output = model.forward(images);

        assert_eq!(output.dims(), [batch_size, NUM_CLASSES]);
    }

    #[test]
    fn dropout_is_inactive_without_autodiff() {
        let device = Default::default();
        let model = ModelConfig::new().init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 3>::random(
            [2, HEIGHT, WIDTH],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let first = model.forward(images.clone()).into_data();
        let second = model.forward(images).into_data();

        first.assert_eq(&second, true);
    }

    #[test]
    fn dropout_is_active_on_autodiff_backend() {
        type B = Autodiff<TestBackend>;
        let device = Default::default();
        let model = ModelConfig::new().init::<B>(&device);
        let images = Tensor::<B, 3>::random(
            [2, HEIGHT, WIDTH],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let first = model.forward(images.clone()).into_data().to_vec::<f32>().unwrap();
        let second = model.forward(images).into_data().to_vec::<f32>().unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn trains_on_autodiff_backend() {
        let device = Default::default();
        let model = ModelConfig::new().init::<Autodiff<TestBackend>>(&device);
        let images = Tensor::<Autodiff<TestBackend>, 3>::ones([2, HEIGHT, WIDTH], &device);

        let grads = model.forward(images).sum().backward();

        assert!(model.linear.weight.grad(&grads).is_some());
    }
}
