use burn::data::dataset::{vision, Dataset, InMemDataset};

use crate::error::MnistError;

/// Image width in pixels.
pub const WIDTH: usize = 28;
/// Image height in pixels.
pub const HEIGHT: usize = 28;
/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;

/// Number of items in the published train split.
pub const TRAIN_LEN: usize = 60_000;
/// Number of items in the published test split.
pub const TEST_LEN: usize = 10_000;

/// Raw 28x28 grayscale intensities, row major.
pub type MnistImage = [[u8; WIDTH]; HEIGHT];

/// MNIST item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MnistItem {
    /// Image as a 2D array of raw intensities in `0..=255`.
    pub image: MnistImage,

    /// Label of the image, in `0..=9`.
    pub label: u8,
}

impl From<vision::MnistItem> for MnistItem {
    fn from(item: vision::MnistItem) -> Self {
        // The framework stores the raw bytes as whole floats.
        let image = item.image.map(|row| row.map(|pixel| pixel as u8));

        Self {
            image,
            label: item.label,
        }
    }
}

/// One of the two disjoint MNIST partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }

    /// Number of items the published split contains.
    pub fn expected_len(&self) -> usize {
        match self {
            Split::Train => TRAIN_LEN,
            Split::Test => TEST_LEN,
        }
    }

    /// Downloads the split into the `burn-dataset` cache on first use.
    fn fetch(&self) -> vision::MnistDataset {
        match self {
            Split::Train => vision::MnistDataset::train(),
            Split::Test => vision::MnistDataset::test(),
        }
    }
}

/// In-memory MNIST partition holding raw intensities.
///
/// Items are never mutated after loading.
pub struct MnistDataset {
    dataset: InMemDataset<MnistItem>,
}

impl Dataset<MnistItem> for MnistDataset {
    fn get(&self, index: usize) -> Option<MnistItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl MnistDataset {
    pub fn train() -> Result<Self, MnistError> {
        Self::load(Split::Train)
    }

    pub fn test() -> Result<Self, MnistError> {
        Self::load(Split::Test)
    }

    /// Loads a split and checks it has the published number of items.
    pub fn load(split: Split) -> Result<Self, MnistError> {
        let dataset = Self::from_source(&split.fetch(), split)?;

        log::info!("Loaded {} MNIST {} items", dataset.len(), split.name());
        Ok(dataset)
    }

    /// Creates a dataset from already decoded items.
    pub fn from_items(items: Vec<MnistItem>) -> Self {
        Self {
            dataset: InMemDataset::new(items),
        }
    }

    fn from_source<D: Dataset<vision::MnistItem>>(
        source: &D,
        split: Split,
    ) -> Result<Self, MnistError> {
        if source.len() != split.expected_len() {
            return Err(MnistError::UnexpectedSplitSize {
                split: split.name().to_string(),
                expected: split.expected_len(),
                found: source.len(),
            });
        }

        Ok(Self::from_items(source.iter().map(MnistItem::from).collect()))
    }
}
