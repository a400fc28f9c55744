//! Built-in registry population.
//!
//! Every object a configuration can name by reference is registered here at
//! startup: the four default handlers plus the training-object registries.

use crate::handlers::{
    DataHandler, DatasetHandler, JsonlDataHandler, ModelHandler, NetworkModelHandler,
    SplitDatasetHandler, TrainHandler, TrainerHandler,
};
use hourglass_config::{DataConfig, DatasetConfig, ModelConfig, Registry, TrainConfig};
use hourglass_training::TrainingRegistries;

/// All registries a manager resolves against.
#[derive(Debug)]
pub struct HandlerRegistries {
    pub data: Registry<DataConfig, Box<dyn DataHandler>>,
    pub dataset: Registry<DatasetConfig, Box<dyn DatasetHandler>>,
    pub model: Registry<ModelConfig, Box<dyn ModelHandler>>,
    pub train: Registry<TrainConfig, Box<dyn TrainHandler>>,
    pub training: TrainingRegistries,
}

impl Default for HandlerRegistries {
    fn default() -> Self {
        Self::builtin()
    }
}

impl HandlerRegistries {
    #[must_use]
    pub fn builtin() -> Self {
        let mut data: Registry<DataConfig, Box<dyn DataHandler>> = Registry::new("data handlers");
        data.register("handlers.data", |config: &DataConfig, _params| {
            Ok(Box::new(JsonlDataHandler::new(config.clone())) as Box<dyn DataHandler>)
        });

        let mut dataset: Registry<DatasetConfig, Box<dyn DatasetHandler>> =
            Registry::new("dataset handlers");
        dataset.register("handlers.dataset", |config: &DatasetConfig, _params| {
            Ok(Box::new(SplitDatasetHandler::new(config.clone())) as Box<dyn DatasetHandler>)
        });

        let mut model: Registry<ModelConfig, Box<dyn ModelHandler>> =
            Registry::new("model handlers");
        model.register("handlers.model", |config: &ModelConfig, _params| {
            Ok(Box::new(NetworkModelHandler::new(config.clone())) as Box<dyn ModelHandler>)
        });

        let mut train: Registry<TrainConfig, Box<dyn TrainHandler>> =
            Registry::new("train handlers");
        train.register("handlers.train", |config: &TrainConfig, _params| {
            Ok(Box::new(TrainerHandler::new(config.clone())) as Box<dyn TrainHandler>)
        });

        Self { data, dataset, model, train, training: TrainingRegistries::builtin() }
    }
}
