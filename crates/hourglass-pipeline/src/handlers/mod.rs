//! Handler contracts and their default implementations.
//!
//! Each handler is constructed with its configuration section by a registry
//! factory, gets a one-time `init_handler` call, then a `run` call. Handlers
//! never touch another handler's state: stage outputs and the shared run
//! metadata are threaded by the manager.

mod data;
mod dataset;
mod model;
mod train;

pub use data::JsonlDataHandler;
pub use dataset::SplitDatasetHandler;
pub use model::NetworkModelHandler;
pub use train::TrainerHandler;

use crate::error::PipelineResult;
use hourglass_config::{DataFormat, RunMetadata};
use hourglass_model::{HourglassNetwork, ModelSummary};
use hourglass_training::{
    PoseBatcher, ProgressSink, RecordSet, SplitSets, TrainReport, TrainingBackend,
    TrainingRegistries,
};

/// Output of the dataset stage: split record sets plus the batcher that
/// turns them into tensors.
#[derive(Debug, Clone)]
pub struct DatasetBundle {
    pub splits: SplitSets,
    pub batcher: PoseBatcher,
}

/// Output of the model stage.
pub struct BuiltModel {
    pub network: HourglassNetwork<TrainingBackend>,
    /// Present when `build_as_model` is configured.
    pub summary: Option<ModelSummary>,
}

/// Loads raw pose records from the configured backing store.
pub trait DataHandler {
    fn init_handler(&mut self, meta: &mut RunMetadata) -> PipelineResult<()>;
    fn run(&mut self, meta: &mut RunMetadata) -> PipelineResult<RecordSet>;
}

/// Turns raw records into split, batchable datasets.
pub trait DatasetHandler {
    fn init_handler(&mut self, meta: &mut RunMetadata) -> PipelineResult<()>;
    fn run(
        &mut self,
        meta: &mut RunMetadata,
        records: RecordSet,
        data_format: DataFormat,
    ) -> PipelineResult<DatasetBundle>;
}

/// Builds the network from hyperparameters.
pub trait ModelHandler {
    fn init_handler(&mut self, meta: &mut RunMetadata) -> PipelineResult<()>;
    fn run(&mut self, meta: &mut RunMetadata) -> PipelineResult<BuiltModel>;
}

/// Compiles the model and runs the fit loop.
pub trait TrainHandler {
    fn init_handler(
        &mut self,
        registries: &TrainingRegistries,
        meta: &mut RunMetadata,
    ) -> PipelineResult<()>;
    fn run(
        &mut self,
        meta: &mut RunMetadata,
        model: BuiltModel,
        datasets: &DatasetBundle,
        progress: &dyn ProgressSink,
    ) -> PipelineResult<TrainReport>;
}
