use crate::error::{ConfigError, ConfigResult};
use crate::schema::RunConfig;
use std::path::Path;
use tracing::debug;

/// Supported configuration document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// Picks a format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat { path: path.to_path_buf() })?;
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat { path: path.to_path_buf() }),
        }
    }
}

/// Loads and validates a run configuration from a document on disk.
pub fn load_config(path: &Path) -> ConfigResult<RunConfig> {
    let format = ConfigFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "loading run configuration");
    let raw = std::fs::read_to_string(path)?;
    parse_config_str(&raw, format)
}

/// Parses and validates a run configuration from document text.
pub fn parse_config_str(raw: &str, format: ConfigFormat) -> ConfigResult<RunConfig> {
    let config: RunConfig = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(raw)?,
        ConfigFormat::Toml => toml::from_str(raw)?,
        ConfigFormat::Json => serde_json::from_str(raw)?,
    };
    config.validate()?;
    Ok(config)
}

/// Serializes a configuration back to YAML.
pub fn to_yaml_string(config: &RunConfig) -> ConfigResult<String> {
    Ok(serde_yaml::to_string(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
data:
  labels_file: labels.jsonl
  images_dir: images
  joints: [head, neck]
dataset:
  image_size: 128
  heatmap:
    size: 32
    stddev: 1.5
  split:
    train: 0.7
    validation: 0.2
    test: 0.1
  shuffle: false
  seed: 7
model:
  build_as_model: true
  data_format: NCHW
  params:
    stages: 2
    output_channels: 14
train:
  epochs: 3
  epoch_size: 20
  batch_size: 4
  learning_rate: 0.00025
  loss: sigmoid_cross_entropy
  optimizer:
    source: optimizers.adamw
    params:
      weight_decay: 0.0001
  metrics:
    - source: metrics.mean_absolute_error
"#;

    #[test]
    fn test_yaml_round_trip_preserves_every_field() {
        let parsed = parse_config_str(YAML, ConfigFormat::Yaml).unwrap();
        let serialized = to_yaml_string(&parsed).unwrap();
        let reparsed = parse_config_str(&serialized, ConfigFormat::Yaml).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_json_round_trip_preserves_every_field() {
        let parsed = parse_config_str(YAML, ConfigFormat::Yaml).unwrap();
        let serialized = serde_json::to_string(&parsed).unwrap();
        let reparsed = parse_config_str(&serialized, ConfigFormat::Json).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_load_config_dispatches_on_extension() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("run.yaml");
        std::fs::write(&path, YAML).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.dataset.image_size, 128);
        assert_eq!(config.model.params.output_channels, 14);
    }

    #[test]
    fn test_unknown_extension_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("run.ini");
        std::fs::write(&path, "x = 1").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }
}
