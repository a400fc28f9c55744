//! Hourglass Pipeline
//!
//! The orchestration layer: four handler kinds (data, dataset, model, train)
//! selected by object reference from a registry, and the manager that runs
//! them in fixed order, threading each stage's output into the next.

pub mod error;
pub mod handlers;
pub mod manager;
pub mod registries;

pub use error::{PipelineError, PipelineResult};
pub use handlers::{
    BuiltModel, DataHandler, DatasetBundle, DatasetHandler, ModelHandler, TrainHandler,
};
pub use manager::{Manager, RunSummary};
pub use registries::HandlerRegistries;
