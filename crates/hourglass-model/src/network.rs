//! The stacked hourglass network: stem, stages, and supervision heads.

use crate::blocks::Residual;
use crate::error::{ModelError, ModelResult};
use crate::hourglass::Hourglass;
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::tensor::Tensor;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use hourglass_config::{DataFormat, ModelConfig};
use serde::{Deserialize, Serialize};

/// Layer-level description of a built network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    pub stages: u32,
    pub output_channels: u32,
    pub data_format: DataFormat,
    pub parameters: usize,
}

#[derive(Debug, Clone)]
struct NetworkSettings {
    data_format: DataFormat,
    intermediate_supervision: bool,
    input_size: u32,
    output_size: u32,
    output_channels: u32,
}

/// One stacked stage: hourglass, feature residual, head, and the 1×1 remaps
/// that feed supervised predictions back into the feature stream.
#[derive(Module, Debug)]
struct HourglassStage<B: Backend> {
    hourglass: Hourglass<B>,
    feature: Residual<B>,
    head: Option<Conv2d<B>>,
    remap_feature: Option<Conv2d<B>>,
    remap_head: Option<Conv2d<B>>,
}

/// Convolutional pose network built from [`ModelConfig`].
///
/// The stem downsamples `input_size` to `output_size` (stride-2 7×7 conv plus
/// 2×2 max-pool); each stage emits `output_channels` heatmaps at
/// `output_size`. `forward` returns one tensor per supervised stage, final
/// stage last.
#[derive(Module, Debug)]
pub struct HourglassNetwork<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    stem_res1: Residual<B>,
    pool: MaxPool2d,
    stem_res2: Residual<B>,
    stages: Vec<HourglassStage<B>>,
    settings: Ignored<NetworkSettings>,
}

impl<B: Backend> HourglassNetwork<B> {
    pub fn new(config: &ModelConfig, device: &B::Device) -> ModelResult<Self> {
        let params = &config.params;
        let input_size = params.input_size as usize;
        let output_size = params.output_size as usize;
        let filters = params.stage_filters as usize;
        let channels = params.output_channels as usize;
        let levels = params.downsamplings_per_stage as usize;

        if input_size != output_size * 4 {
            return Err(ModelError::geometry(format!(
                "input_size {input_size} must be 4 * output_size {output_size} \
                 (the stem downsamples twice)"
            )));
        }
        if output_size % (1 << levels) != 0 {
            return Err(ModelError::geometry(format!(
                "output_size {output_size} must be divisible by 2^downsamplings_per_stage \
                 ({levels} downsamplings)"
            )));
        }

        let half = (filters / 2).max(1);
        let stem_conv = Conv2dConfig::new([3, half], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .init(device);
        let stem_bn = BatchNormConfig::new(half).init(device);
        let stem_res1 = Residual::new(half, filters, device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let stem_res2 = Residual::new(filters, filters, device);

        let stage_count = params.stages as usize;
        let supervised = params.intermediate_supervision;
        let mut stages = Vec::with_capacity(stage_count);
        for index in 0..stage_count {
            let last = index + 1 == stage_count;
            let head = (supervised || last)
                .then(|| Conv2dConfig::new([filters, channels], [1, 1]).init(device));
            let remap_feature =
                (!last).then(|| Conv2dConfig::new([filters, filters], [1, 1]).init(device));
            let remap_head = (supervised && !last)
                .then(|| Conv2dConfig::new([channels, filters], [1, 1]).init(device));
            stages.push(HourglassStage {
                hourglass: Hourglass::new(filters, levels, device),
                feature: Residual::new(filters, filters, device),
                head,
                remap_feature,
                remap_head,
            });
        }

        Ok(Self {
            stem_conv,
            stem_bn,
            stem_res1,
            pool,
            stem_res2,
            stages,
            settings: Ignored(NetworkSettings {
                data_format: config.data_format,
                intermediate_supervision: supervised,
                input_size: params.input_size,
                output_size: params.output_size,
                output_channels: params.output_channels,
            }),
        })
    }

    #[must_use]
    pub fn data_format(&self) -> DataFormat {
        self.settings.0.data_format
    }

    /// Number of supervised outputs `forward` returns.
    #[must_use]
    pub fn supervised_stages(&self) -> usize {
        if self.settings.0.intermediate_supervision { self.stages.len() } else { 1 }
    }

    /// Heatmap channels emitted by every head.
    #[must_use]
    pub fn output_channels(&self) -> u32 {
        self.settings.0.output_channels
    }

    /// Expected input image side length.
    #[must_use]
    pub fn input_size(&self) -> u32 {
        self.settings.0.input_size
    }

    /// Heatmap side length emitted by every head.
    #[must_use]
    pub fn output_size(&self) -> u32 {
        self.settings.0.output_size
    }

    #[must_use]
    pub fn summary(&self, name: &str) -> ModelSummary {
        ModelSummary {
            name: name.to_string(),
            stages: self.stages.len() as u32,
            output_channels: self.settings.0.output_channels,
            data_format: self.settings.0.data_format,
            parameters: self.num_params(),
        }
    }

    /// Runs the network, returning one heatmap tensor per supervised stage
    /// (final stage last), in the configured data format.
    pub fn forward(&self, input: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let format = self.settings.0.data_format;
        let input = match format {
            DataFormat::Nhwc => input.permute([0, 3, 1, 2]),
            DataFormat::Nchw => input,
        };

        let mut x = relu(self.stem_bn.forward(self.stem_conv.forward(input)));
        x = self.stem_res1.forward(x);
        x = self.pool.forward(x);
        x = self.stem_res2.forward(x);

        let mut heads = Vec::with_capacity(self.supervised_stages());
        for stage in &self.stages {
            let features = stage.feature.forward(stage.hourglass.forward(x.clone()));
            let head = stage.head.as_ref().map(|conv| conv.forward(features.clone()));
            if let Some(head) = &head {
                heads.push(match format {
                    DataFormat::Nhwc => head.clone().permute([0, 2, 3, 1]),
                    DataFormat::Nchw => head.clone(),
                });
            }
            if let Some(remap_feature) = &stage.remap_feature {
                x = x + remap_feature.forward(features);
                if let (Some(remap_head), Some(head)) = (&stage.remap_head, head) {
                    x = x + remap_head.forward(head);
                }
            }
        }
        heads
    }
}
