//! Burn Dataset Integration for multi-label images
//!
//! This module implements Burn's Dataset trait and Batcher for the fine-tuning
//! loop. Images are decoded lazily: each item resolves `image_dir/ImageId`,
//! resizes to the ViT input size and lays pixels out as CHW floats in [0, 1].
//! Normalisation with the ViT mean/std happens in the batcher.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use image::ImageReader;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::dataset::labels::LabelRecord;
use crate::dataset::{DEFAULT_IMAGE_SIZE, VIT_MEAN, VIT_STD};
use crate::utils::error::{Result, VitError};

/// A single multi-label item ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultiLabelItem {
    /// Image data as flattened CHW float array [3 * H * W], values in [0, 1]
    pub image: Vec<f32>,
    /// Multi-hot label vector
    pub target: Vec<bool>,
    /// Image path (for debugging/logging)
    pub path: String,
}

impl MultiLabelItem {
    /// Create a new item by loading and preprocessing an image
    pub fn from_path(path: &Path, target: Vec<bool>, image_size: usize) -> Result<Self> {
        let img = ImageReader::open(path)
            .map_err(|e| VitError::ImageLoad(path.to_path_buf(), e.to_string()))?
            .with_guessed_format()
            .map_err(|e| VitError::ImageLoad(path.to_path_buf(), e.to_string()))?
            .decode()
            .map_err(|e| VitError::ImageLoad(path.to_path_buf(), e.to_string()))?
            .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
            .to_rgb8();

        let plane = image_size * image_size;
        let mut image = vec![0.0f32; 3 * plane];

        for (x, y, pixel) in img.enumerate_pixels() {
            let offset = y as usize * image_size + x as usize;
            for c in 0..3 {
                image[c * plane + offset] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(Self {
            image,
            target,
            path: path.to_string_lossy().to_string(),
        })
    }
}

/// Image dataset over a partition of the label table
///
/// Images are loaded on demand; nothing is cached between epochs.
#[derive(Debug, Clone)]
pub struct MultiLabelImageDataset {
    records: Vec<LabelRecord>,
    image_dir: PathBuf,
    image_size: usize,
}

impl MultiLabelImageDataset {
    pub fn new<P: AsRef<Path>>(records: Vec<LabelRecord>, image_dir: P) -> Self {
        Self::with_image_size(records, image_dir, DEFAULT_IMAGE_SIZE)
    }

    pub fn with_image_size<P: AsRef<Path>>(
        records: Vec<LabelRecord>,
        image_dir: P,
        image_size: usize,
    ) -> Self {
        Self {
            records,
            image_dir: image_dir.as_ref().to_path_buf(),
            image_size,
        }
    }

    /// Full path of the image behind `index`
    pub fn image_path(&self, index: usize) -> Option<PathBuf> {
        self.records
            .get(index)
            .map(|r| self.image_dir.join(&r.image_id))
    }

    /// Load one item, propagating decode errors
    pub fn load(&self, index: usize) -> Result<MultiLabelItem> {
        let (record, path) = self
            .records
            .get(index)
            .zip(self.image_path(index))
            .ok_or_else(|| {
                VitError::Config(format!(
                    "index {} out of range for dataset of {}",
                    index,
                    self.records.len()
                ))
            })?;
        if !path.exists() {
            return Err(VitError::ImageLoad(path, "file not found".to_string()));
        }
        MultiLabelItem::from_path(&path, record.target.clone(), self.image_size)
    }

    /// Load several items on a rayon pool, keeping the order of `indices`
    pub fn load_parallel(&self, indices: &[usize], pool: &ThreadPool) -> Result<Vec<MultiLabelItem>> {
        pool.install(|| indices.par_iter().map(|&i| self.load(i)).collect())
    }

    pub fn records(&self) -> &[LabelRecord] {
        &self.records
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }
}

impl Dataset<MultiLabelItem> for MultiLabelImageDataset {
    fn get(&self, index: usize) -> Option<MultiLabelItem> {
        self.load(index).ok()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// A batch of images with their multi-hot targets
#[derive(Clone, Debug)]
pub struct MultiLabelBatch<B: Backend> {
    /// Normalised images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Multi-hot targets with shape [batch_size, num_classes]
    pub targets: Tensor<B, 2, Int>,
}

/// Batcher that stacks items and applies ViT normalisation
#[derive(Clone, Debug)]
pub struct MultiLabelBatcher {
    image_size: usize,
    num_classes: usize,
}

impl MultiLabelBatcher {
    pub fn new(image_size: usize, num_classes: usize) -> Self {
        Self {
            image_size,
            num_classes,
        }
    }
}

impl<B: Backend> Batcher<B, MultiLabelItem, MultiLabelBatch<B>> for MultiLabelBatcher {
    fn batch(&self, items: Vec<MultiLabelItem>, device: &B::Device) -> MultiLabelBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.iter().copied()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        // (x - mean) / std per channel
        let mean = Tensor::<B, 4>::from_floats(TensorData::new(VIT_MEAN.to_vec(), [1, 3, 1, 1]), device);
        let std = Tensor::<B, 4>::from_floats(TensorData::new(VIT_STD.to_vec(), [1, 3, 1, 1]), device);
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items
            .iter()
            .flat_map(|item| {
                (0..self.num_classes).map(move |c| item.target.get(c).copied().unwrap_or(false) as i64)
            })
            .collect();
        let targets = Tensor::<B, 2, Int>::from_data(
            TensorData::new(targets_data, [batch_size, self.num_classes]),
            device,
        );

        MultiLabelBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::labels::LabelTable;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    fn write_image(dir: &Path, name: &str, color: [u8; 3]) {
        let img = RgbImage::from_pixel(8, 6, Rgb(color));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_item_is_chw_in_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "red.png", [255, 0, 51]);

        let item = MultiLabelItem::from_path(&dir.path().join("red.png"), vec![true], 4).unwrap();
        assert_eq!(item.image.len(), 3 * 4 * 4);
        assert!(item.image[..16].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(item.image[16..32].iter().all(|&v| v.abs() < 1e-6));
        assert!(item.image[32..].iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_dataset_get_and_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", [10, 20, 30]);
        let table = LabelTable::from_rows(vec![("a.png", "x"), ("missing.png", "y")]);

        let dataset = MultiLabelImageDataset::with_image_size(table.records, dir.path(), 4);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.image_path(1), Some(dir.path().join("missing.png")));
        assert_eq!(dataset.image_path(2), None);
        assert_eq!(dataset.get(0).unwrap().target, vec![true, false]);
        assert!(dataset.get(1).is_none());
        assert!(matches!(dataset.load(1), Err(VitError::ImageLoad(_, _))));
        assert!(dataset.get(5).is_none());
    }

    #[test]
    fn test_load_parallel_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", [0, 0, 0]);
        write_image(dir.path(), "b.png", [255, 255, 255]);
        let table = LabelTable::from_rows(vec![("a.png", "x"), ("b.png", "y")]);
        let dataset = MultiLabelImageDataset::with_image_size(table.records, dir.path(), 2);

        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let items = dataset.load_parallel(&[1, 0, 1], &pool).unwrap();

        assert_eq!(items.len(), 3);
        assert!(items[0].path.ends_with("b.png"));
        assert!(items[1].path.ends_with("a.png"));
    }

    #[test]
    fn test_batcher_shapes_and_normalisation() {
        let device = Default::default();
        let items = vec![
            MultiLabelItem {
                image: vec![1.0; 3 * 2 * 2],
                target: vec![true, false, true],
                path: "a".to_string(),
            },
            MultiLabelItem {
                image: vec![0.5; 3 * 2 * 2],
                target: vec![false, true, false],
                path: "b".to_string(),
            },
        ];

        let batcher = MultiLabelBatcher::new(2, 3);
        let batch: MultiLabelBatch<TestBackend> = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 2, 2]);
        assert_eq!(batch.targets.dims(), [2, 3]);

        let pixels = batch.images.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert!((pixels[0] - 1.0).abs() < 1e-6);
        assert!(pixels[12].abs() < 1e-6);

        let targets = batch.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![1, 0, 1, 0, 1, 0]);
    }
}
