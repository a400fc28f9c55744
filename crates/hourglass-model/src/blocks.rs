//! Residual building blocks shared by every hourglass stage.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::tensor::Tensor;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;

/// Bottleneck convolution block: three BN → ReLU → conv steps
/// (1×1 to half width, 3×3 at half width, 1×1 back to full width).
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    bn1: BatchNorm<B, 2>,
    conv1: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let mid = (out_channels / 2).max(1);
        Self {
            bn1: BatchNormConfig::new(in_channels).init(device),
            conv1: Conv2dConfig::new([in_channels, mid], [1, 1]).init(device),
            bn2: BatchNormConfig::new(mid).init(device),
            conv2: Conv2dConfig::new([mid, mid], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            bn3: BatchNormConfig::new(mid).init(device),
            conv3: Conv2dConfig::new([mid, out_channels], [1, 1]).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(relu(self.bn1.forward(input)));
        let x = self.conv2.forward(relu(self.bn2.forward(x)));
        self.conv3.forward(relu(self.bn3.forward(x)))
    }
}

/// Skip connection: identity when channel counts match, 1×1 conv otherwise.
#[derive(Module, Debug)]
pub struct Skip<B: Backend> {
    conv: Option<Conv2d<B>>,
}

impl<B: Backend> Skip<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = (in_channels != out_channels)
            .then(|| Conv2dConfig::new([in_channels, out_channels], [1, 1]).init(device));
        Self { conv }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.conv {
            Some(conv) => conv.forward(input),
            None => input,
        }
    }
}

/// Residual unit: bottleneck block plus skip branch, added.
#[derive(Module, Debug)]
pub struct Residual<B: Backend> {
    conv_block: ConvBlock<B>,
    skip: Skip<B>,
}

impl<B: Backend> Residual<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv_block: ConvBlock::new(in_channels, out_channels, device),
            skip: Skip::new(in_channels, out_channels, device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv_block.forward(input.clone()) + self.skip.forward(input)
    }
}
