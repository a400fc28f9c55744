//! Tensor assembly: image decoding, resizing, Gaussian heatmap targets.

use crate::error::{TrainingError, TrainingResult};
use crate::records::PoseRecord;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use hourglass_config::DataFormat;
use image::imageops::FilterType;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;

/// One batch of inputs and targets, laid out per the configured data format.
#[derive(Debug, Clone)]
pub struct PoseBatch<B: Backend> {
    /// `[B, 3, H, W]` (NCHW) or `[B, H, W, 3]` (NHWC), normalized to `[0, 1]`.
    pub images: Tensor<B, 4>,
    /// `[B, C, h, h]` (NCHW) or `[B, h, h, C]` (NHWC) Gaussian heatmaps.
    pub targets: Tensor<B, 4>,
}

/// Turns pose records into batched tensors.
#[derive(Debug, Clone)]
pub struct PoseBatcher {
    images_dir: PathBuf,
    image_size: u32,
    heatmap_size: u32,
    stddev: f64,
    joint_count: usize,
    data_format: DataFormat,
    shuffle: bool,
    seed: u64,
}

impl PoseBatcher {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        images_dir: PathBuf,
        image_size: u32,
        heatmap_size: u32,
        stddev: f64,
        joint_count: usize,
        data_format: DataFormat,
        shuffle: bool,
        seed: u64,
    ) -> Self {
        Self { images_dir, image_size, heatmap_size, stddev, joint_count, data_format, shuffle, seed }
    }

    #[must_use]
    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    #[must_use]
    pub fn heatmap_size(&self) -> u32 {
        self.heatmap_size
    }

    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    #[must_use]
    pub fn data_format(&self) -> DataFormat {
        self.data_format
    }

    /// Record visit order for an epoch. Shuffles deterministically per epoch
    /// when enabled, so runs are repeatable for a fixed seed.
    #[must_use]
    pub fn epoch_order(&self, len: usize, epoch: u32) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        if self.shuffle {
            let mut rng = rand::rngs::StdRng::seed_from_u64(self.seed.wrapping_add(u64::from(epoch)));
            order.shuffle(&mut rng);
        }
        order
    }

    /// Assembles a batch from the given records.
    pub fn batch<B: Backend>(
        &self,
        records: &[PoseRecord],
        device: &B::Device,
    ) -> TrainingResult<PoseBatch<B>> {
        if records.is_empty() {
            return Err(TrainingError::Batch("cannot assemble an empty batch".to_string()));
        }

        let batch = records.len();
        let size = self.image_size as usize;
        let hm = self.heatmap_size as usize;
        let channels = self.joint_count;

        let mut images = vec![0.0f32; batch * 3 * size * size];
        let mut targets = vec![0.0f32; batch * channels * hm * hm];

        for (bi, record) in records.iter().enumerate() {
            if record.joints.len() != channels {
                return Err(TrainingError::Batch(format!(
                    "record {} has {} joints, batcher expects {channels}",
                    record.image.display(),
                    record.joints.len()
                )));
            }

            let path = self.images_dir.join(&record.image);
            let decoded = image::open(&path)
                .map_err(|source| TrainingError::Image { path: path.clone(), source })?
                .to_rgb8();
            let (orig_w, orig_h) = decoded.dimensions();
            if orig_w == 0 || orig_h == 0 {
                return Err(TrainingError::Batch(format!("empty image: {}", path.display())));
            }
            let resized =
                image::imageops::resize(&decoded, self.image_size, self.image_size, FilterType::Triangle);

            for (x, y, pixel) in resized.enumerate_pixels() {
                let (x, y) = (x as usize, y as usize);
                for c in 0..3 {
                    let value = f32::from(pixel.0[c]) / 255.0;
                    images[self.image_index(bi, c, y, x, size)] = value;
                }
            }

            for (j, [jx, jy]) in record.joints.iter().enumerate() {
                if !record.is_visible(j) {
                    continue;
                }
                let cx = jx / orig_w as f32 * hm as f32;
                let cy = jy / orig_h as f32 * hm as f32;
                self.render_gaussian(&mut targets, bi, j, cx, cy, hm, channels);
            }
        }

        let (image_shape, target_shape) = match self.data_format {
            DataFormat::Nchw => ([batch, 3, size, size], [batch, channels, hm, hm]),
            DataFormat::Nhwc => ([batch, size, size, 3], [batch, hm, hm, channels]),
        };

        Ok(PoseBatch {
            images: Tensor::from_data(TensorData::new(images, image_shape), device),
            targets: Tensor::from_data(TensorData::new(targets, target_shape), device),
        })
    }

    fn image_index(&self, bi: usize, c: usize, y: usize, x: usize, size: usize) -> usize {
        match self.data_format {
            DataFormat::Nchw => ((bi * 3 + c) * size + y) * size + x,
            DataFormat::Nhwc => ((bi * size + y) * size + x) * 3 + c,
        }
    }

    fn target_index(&self, bi: usize, c: usize, y: usize, x: usize, hm: usize, channels: usize) -> usize {
        match self.data_format {
            DataFormat::Nchw => ((bi * channels + c) * hm + y) * hm + x,
            DataFormat::Nhwc => ((bi * hm + y) * hm + x) * channels + c,
        }
    }

    fn render_gaussian(
        &self,
        targets: &mut [f32],
        bi: usize,
        joint: usize,
        cx: f32,
        cy: f32,
        hm: usize,
        channels: usize,
    ) {
        let two_sigma_sq = (2.0 * self.stddev * self.stddev) as f32;
        for y in 0..hm {
            for x in 0..hm {
                let dx = (x as f32 + 0.5) - cx;
                let dy = (y as f32 + 0.5) - cy;
                let value = (-(dx * dx + dy * dy) / two_sigma_sq).exp();
                targets[self.target_index(bi, joint, y, x, hm, channels)] = value;
            }
        }
    }
}
