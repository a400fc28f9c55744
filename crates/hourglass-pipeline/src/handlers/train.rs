use crate::error::PipelineResult;
use crate::handlers::{BuiltModel, DatasetBundle, TrainHandler};
use hourglass_config::{RunMetadata, TrainConfig};
use hourglass_training::{PoseTrainer, ProgressSink, TrainReport, TrainingRegistries};

/// Default train handler: drives the compile-then-fit trainer.
pub struct TrainerHandler {
    trainer: PoseTrainer,
}

impl TrainerHandler {
    #[must_use]
    pub fn new(config: TrainConfig) -> Self {
        Self { trainer: PoseTrainer::new(config) }
    }
}

impl TrainHandler for TrainerHandler {
    fn init_handler(
        &mut self,
        registries: &TrainingRegistries,
        _meta: &mut RunMetadata,
    ) -> PipelineResult<()> {
        self.trainer.init_handler(registries)?;
        Ok(())
    }

    fn run(
        &mut self,
        meta: &mut RunMetadata,
        model: BuiltModel,
        datasets: &DatasetBundle,
        progress: &dyn ProgressSink,
    ) -> PipelineResult<TrainReport> {
        let report =
            self.trainer.run(model.network, &datasets.splits, &datasets.batcher, meta, progress)?;
        Ok(report)
    }
}
