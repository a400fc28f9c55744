use crate::error::PipelineResult;
use crate::handlers::{BuiltModel, ModelHandler};
use hourglass_config::{ModelConfig, RunMetadata};
use hourglass_model::HourglassNetwork;
use hourglass_training::TrainingBackend;
use tracing::info;

/// Default model handler: builds the stacked hourglass network.
pub struct NetworkModelHandler {
    config: ModelConfig,
}

impl NetworkModelHandler {
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

impl ModelHandler for NetworkModelHandler {
    fn init_handler(&mut self, _meta: &mut RunMetadata) -> PipelineResult<()> {
        self.config.validate()?;
        Ok(())
    }

    fn run(&mut self, _meta: &mut RunMetadata) -> PipelineResult<BuiltModel> {
        let device = Default::default();
        let network = HourglassNetwork::<TrainingBackend>::new(&self.config, &device)?;
        let summary = self
            .config
            .build_as_model
            .then(|| network.summary(&self.config.params.name));
        if let Some(summary) = &summary {
            info!(
                name = %summary.name,
                stages = summary.stages,
                parameters = summary.parameters,
                "built model"
            );
        }
        Ok(BuiltModel { network, summary })
    }
}
