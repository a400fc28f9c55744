//! A single hourglass stage: recursive pool-down / upsample-up encoder-decoder
//! with a residual skip branch at every scale.

use crate::blocks::Residual;
use burn::module::Module;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};

/// Encoder/decoder stage operating at a fixed channel width.
///
/// The recursion of the reference architecture is unrolled into per-level
/// module lists: level `i` of `down`/`skips` operates at spatial resolution
/// `size / 2^i`.
#[derive(Module, Debug)]
pub struct Hourglass<B: Backend> {
    pool: MaxPool2d,
    down: Vec<Residual<B>>,
    skips: Vec<Residual<B>>,
    bottleneck: Residual<B>,
    up: Vec<Residual<B>>,
}

impl<B: Backend> Hourglass<B> {
    pub fn new(filters: usize, levels: usize, device: &B::Device) -> Self {
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let down = (0..levels).map(|_| Residual::new(filters, filters, device)).collect();
        let skips = (0..levels).map(|_| Residual::new(filters, filters, device)).collect();
        let up = (0..levels).map(|_| Residual::new(filters, filters, device)).collect();
        Self { pool, down, skips, bottleneck: Residual::new(filters, filters, device), up }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skip_features = Vec::with_capacity(self.down.len());
        let mut x = input;
        for (down, skip) in self.down.iter().zip(self.skips.iter()) {
            skip_features.push(skip.forward(x.clone()));
            x = down.forward(self.pool.forward(x));
        }
        x = self.bottleneck.forward(x);
        for (up, skip_feature) in self.up.iter().zip(skip_features.into_iter().rev()) {
            let [_, _, height, width] = skip_feature.dims();
            x = up.forward(x);
            x = interpolate(
                x,
                [height, width],
                InterpolateOptions::new(InterpolateMode::Nearest),
            );
            x = x + skip_feature;
        }
        x
    }
}
