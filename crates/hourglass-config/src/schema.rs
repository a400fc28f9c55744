use crate::error::{ConfigError, ConfigResult};
use crate::reference::{ObjectRef, ValueOrRef};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for a training run.
///
/// All four sections are required; a missing section is a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub train: TrainConfig,
}

impl RunConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.dataset.validate()?;
        self.model.validate()?;
        self.train.validate()?;
        Ok(())
    }
}

/// Where raw pose records come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "DataConfig::default_object")]
    pub object: ObjectRef,
    /// JSONL file with one pose record per line.
    pub labels_file: PathBuf,
    /// Base directory that record image paths are relative to.
    pub images_dir: PathBuf,
    /// Joint names, in channel order. Discovered from the records when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joints: Option<Vec<String>>,
}

impl DataConfig {
    fn default_object() -> ObjectRef {
        ObjectRef::new("handlers.data")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "DatasetConfig::default_object")]
    pub object: ObjectRef,
    /// Side length images are resized to before batching.
    #[serde(default = "DatasetConfig::default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub heatmap: HeatmapConfig,
    #[serde(default)]
    pub split: SplitRatios,
    #[serde(default = "DatasetConfig::default_shuffle")]
    pub shuffle: bool,
    #[serde(default = "DatasetConfig::default_seed")]
    pub seed: u64,
}

impl DatasetConfig {
    fn default_object() -> ObjectRef {
        ObjectRef::new("handlers.dataset")
    }

    fn default_image_size() -> u32 {
        256
    }

    fn default_shuffle() -> bool {
        true
    }

    fn default_seed() -> u64 {
        42
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.image_size == 0 {
            return Err(ConfigError::invalid("dataset.image_size", "must be >= 1"));
        }
        if self.heatmap.size == 0 {
            return Err(ConfigError::invalid("dataset.heatmap.size", "must be >= 1"));
        }
        if !self.heatmap.stddev.is_finite() || self.heatmap.stddev <= 0.0 {
            return Err(ConfigError::invalid("dataset.heatmap.stddev", "must be > 0"));
        }
        self.split.validate()
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            object: Self::default_object(),
            image_size: Self::default_image_size(),
            heatmap: HeatmapConfig::default(),
            split: SplitRatios::default(),
            shuffle: Self::default_shuffle(),
            seed: Self::default_seed(),
        }
    }
}

/// Geometry of the Gaussian target heatmaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapConfig {
    #[serde(default = "HeatmapConfig::default_size")]
    pub size: u32,
    #[serde(default = "HeatmapConfig::default_stddev")]
    pub stddev: f64,
}

impl HeatmapConfig {
    fn default_size() -> u32 {
        64
    }

    fn default_stddev() -> f64 {
        2.0
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self { size: Self::default_size(), stddev: Self::default_stddev() }
    }
}

/// Fractions of records assigned to each split when records carry no
/// explicit split marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    #[serde(default = "SplitRatios::default_train")]
    pub train: f64,
    #[serde(default = "SplitRatios::default_validation")]
    pub validation: f64,
    #[serde(default = "SplitRatios::default_test")]
    pub test: f64,
}

impl SplitRatios {
    fn default_train() -> f64 {
        0.8
    }

    fn default_validation() -> f64 {
        0.1
    }

    fn default_test() -> f64 {
        0.1
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, ratio) in [
            ("dataset.split.train", self.train),
            ("dataset.split.validation", self.validation),
            ("dataset.split.test", self.test),
        ] {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(ConfigError::invalid(name, "must be a non-negative number"));
            }
        }
        if self.train <= 0.0 {
            return Err(ConfigError::invalid("dataset.split.train", "must be > 0"));
        }
        if self.train + self.validation + self.test > 1.0 + 1e-6 {
            return Err(ConfigError::invalid("dataset.split", "ratios must sum to at most 1.0"));
        }
        Ok(())
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: Self::default_train(),
            validation: Self::default_validation(),
            test: Self::default_test(),
        }
    }
}

/// Memory layout of image batches at the network seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    #[serde(rename = "NHWC")]
    Nhwc,
    #[serde(rename = "NCHW")]
    Nchw,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::Nhwc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "ModelConfig::default_object")]
    pub object: ObjectRef,
    /// When set, the model stage also produces a layer/parameter summary.
    #[serde(default)]
    pub build_as_model: bool,
    #[serde(default)]
    pub data_format: DataFormat,
    #[serde(default)]
    pub params: ModelParams,
}

impl ModelConfig {
    fn default_object() -> ObjectRef {
        ObjectRef::new("handlers.model")
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.params.validate()
    }
}

/// Hyperparameters of the stacked hourglass network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default = "ModelParams::default_name")]
    pub name: String,
    #[serde(default = "ModelParams::default_input_size")]
    pub input_size: u32,
    #[serde(default = "ModelParams::default_output_size")]
    pub output_size: u32,
    #[serde(default = "ModelParams::default_stages")]
    pub stages: u32,
    #[serde(default = "ModelParams::default_stage_filters")]
    pub stage_filters: u32,
    #[serde(default = "ModelParams::default_output_channels")]
    pub output_channels: u32,
    #[serde(default = "ModelParams::default_downsamplings_per_stage")]
    pub downsamplings_per_stage: u32,
    #[serde(default = "ModelParams::default_intermediate_supervision")]
    pub intermediate_supervision: bool,
}

impl ModelParams {
    fn default_name() -> String {
        "HourglassNetwork".to_string()
    }

    fn default_input_size() -> u32 {
        256
    }

    fn default_output_size() -> u32 {
        64
    }

    fn default_stages() -> u32 {
        4
    }

    fn default_stage_filters() -> u32 {
        128
    }

    fn default_output_channels() -> u32 {
        16
    }

    fn default_downsamplings_per_stage() -> u32 {
        4
    }

    fn default_intermediate_supervision() -> bool {
        true
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.stages == 0 {
            return Err(ConfigError::invalid("model.params.stages", "must be >= 1"));
        }
        if self.stage_filters < 2 {
            return Err(ConfigError::invalid("model.params.stage_filters", "must be >= 2"));
        }
        if self.output_channels == 0 {
            return Err(ConfigError::invalid("model.params.output_channels", "must be >= 1"));
        }
        if self.downsamplings_per_stage == 0 {
            return Err(ConfigError::invalid(
                "model.params.downsamplings_per_stage",
                "must be >= 1",
            ));
        }
        if self.input_size == 0 || self.output_size == 0 {
            return Err(ConfigError::invalid(
                "model.params",
                "input_size and output_size must be >= 1",
            ));
        }
        Ok(())
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            input_size: Self::default_input_size(),
            output_size: Self::default_output_size(),
            stages: Self::default_stages(),
            stage_filters: Self::default_stage_filters(),
            output_channels: Self::default_output_channels(),
            downsamplings_per_stage: Self::default_downsamplings_per_stage(),
            intermediate_supervision: Self::default_intermediate_supervision(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    #[serde(default = "TrainConfig::default_object")]
    pub object: ObjectRef,
    pub epochs: u32,
    /// Batches per epoch; a full pass over the train split when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_size: Option<u32>,
    pub batch_size: u32,
    /// Literal rate (constant schedule) or a reference to a schedule.
    #[serde(default = "TrainConfig::default_learning_rate")]
    pub learning_rate: ValueOrRef<f64>,
    /// Literal loss name or a reference.
    #[serde(default = "TrainConfig::default_loss")]
    pub loss: ValueOrRef<String>,
    /// Literal optimizer name or a reference.
    #[serde(default = "TrainConfig::default_optimizer")]
    pub optimizer: ValueOrRef<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<ObjectRef>,
    /// Root directory for run artifacts (checkpoints, manifests).
    #[serde(default = "TrainConfig::default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

impl TrainConfig {
    fn default_object() -> ObjectRef {
        ObjectRef::new("handlers.train")
    }

    fn default_learning_rate() -> ValueOrRef<f64> {
        ValueOrRef::Value(1e-3)
    }

    fn default_loss() -> ValueOrRef<String> {
        ValueOrRef::Value("mse".to_string())
    }

    fn default_optimizer() -> ValueOrRef<String> {
        ValueOrRef::Value("adam".to_string())
    }

    fn default_artifacts_dir() -> PathBuf {
        PathBuf::from("artifacts")
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.epochs == 0 {
            return Err(ConfigError::invalid("train.epochs", "must be >= 1"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("train.batch_size", "must be >= 1"));
        }
        if self.epoch_size == Some(0) {
            return Err(ConfigError::invalid("train.epoch_size", "must be >= 1 when set"));
        }
        if let ValueOrRef::Value(rate) = &self.learning_rate {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(ConfigError::invalid("train.learning_rate", "must be > 0"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
data:
  labels_file: labels.jsonl
  images_dir: images
dataset: {}
model: {}
train:
  epochs: 10
  batch_size: 8
"#
    }

    #[test]
    fn test_section_defaults() {
        let config: RunConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.data.object.source, "handlers.data");
        assert_eq!(config.dataset.image_size, 256);
        assert_eq!(config.dataset.heatmap.size, 64);
        assert_eq!(config.model.data_format, DataFormat::Nhwc);
        assert!(!config.model.build_as_model);

        let params = &config.model.params;
        assert_eq!(params.name, "HourglassNetwork");
        assert_eq!(params.input_size, 256);
        assert_eq!(params.output_size, 64);
        assert_eq!(params.stages, 4);
        assert_eq!(params.stage_filters, 128);
        assert_eq!(params.output_channels, 16);
        assert_eq!(params.downsamplings_per_stage, 4);
        assert!(params.intermediate_supervision);
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let yaml = r#"
data:
  labels_file: labels.jsonl
  images_dir: images
dataset: {}
model: {}
"#;
        let parsed: Result<RunConfig, _> = serde_yaml::from_str(yaml);
        let err = parsed.unwrap_err().to_string();
        assert!(err.contains("train"), "error should name the section: {err}");
    }

    #[test]
    fn test_split_ratios_must_sum_to_at_most_one() {
        let mut config: RunConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.dataset.split = SplitRatios { train: 0.8, validation: 0.3, test: 0.1 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let mut config: RunConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.train.epochs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_train_section_accepts_references() {
        let yaml = r#"
epochs: 5
batch_size: 4
learning_rate:
  source: schedules.exponential_decay
  params:
    initial_rate: 0.001
    decay_rate: 0.96
    decay_steps: 1000
optimizer: sgd
metrics:
  - source: metrics.pck
    params:
      threshold: 0.5
"#;
        let train: TrainConfig = serde_yaml::from_str(yaml).unwrap();
        train.validate().unwrap();
        assert!(train.learning_rate.as_reference().is_some());
        assert_eq!(train.optimizer.as_value().map(String::as_str), Some("sgd"));
        assert_eq!(train.metrics.len(), 1);
        assert_eq!(train.metrics[0].source, "metrics.pck");
    }
}
