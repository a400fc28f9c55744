//! Hourglass Config
//!
//! Configuration layer for the hourglass training pipeline:
//! - Typed schema for a training run (`RunConfig` and its four sections)
//! - Object references (`ObjectRef`) and the registry that resolves them
//! - Document parsing (YAML/TOML/JSON, selected by extension)
//! - Run-scoped metadata threaded through the pipeline stages

pub mod error;
pub mod metadata;
pub mod parser;
pub mod reference;
pub mod registry;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use metadata::{RunMetadata, SplitCounts};
pub use parser::{load_config, parse_config_str, to_yaml_string, ConfigFormat};
pub use reference::{ObjectRef, Params, ValueOrRef};
pub use registry::Registry;
pub use schema::{
    DataConfig, DataFormat, DatasetConfig, HeatmapConfig, ModelConfig, ModelParams, RunConfig,
    SplitRatios, TrainConfig,
};
