use crate::error::{PipelineError, PipelineResult};
use crate::handlers::{DatasetBundle, DatasetHandler};
use hourglass_config::{DataFormat, DatasetConfig, RunMetadata, SplitCounts};
use hourglass_training::{split_records, PoseBatcher, RecordSet};
use tracing::info;

/// Default dataset handler: seeded ratio/declared splits plus tensor batching.
pub struct SplitDatasetHandler {
    config: DatasetConfig,
}

impl SplitDatasetHandler {
    #[must_use]
    pub fn new(config: DatasetConfig) -> Self {
        Self { config }
    }
}

impl DatasetHandler for SplitDatasetHandler {
    fn init_handler(&mut self, _meta: &mut RunMetadata) -> PipelineResult<()> {
        self.config.validate()?;
        Ok(())
    }

    fn run(
        &mut self,
        meta: &mut RunMetadata,
        records: RecordSet,
        data_format: DataFormat,
    ) -> PipelineResult<DatasetBundle> {
        let joint_count = meta
            .joint_count
            .ok_or_else(|| PipelineError::handler("joint count missing from run metadata"))?;

        let splits = split_records(
            records,
            &self.config.split,
            self.config.shuffle,
            self.config.seed,
        )?;
        meta.split_counts = SplitCounts {
            train: splits.train.len(),
            validation: splits.validation.len(),
            test: splits.test.len(),
        };
        meta.image_size = Some(self.config.image_size);
        meta.heatmap_size = Some(self.config.heatmap.size);

        info!(
            train = splits.train.len(),
            validation = splits.validation.len(),
            test = splits.test.len(),
            image_size = self.config.image_size,
            heatmap_size = self.config.heatmap.size,
            "built dataset splits"
        );

        let batcher = PoseBatcher::new(
            std::path::PathBuf::new(),
            self.config.image_size,
            self.config.heatmap.size,
            self.config.heatmap.stddev,
            joint_count,
            data_format,
            self.config.shuffle,
            self.config.seed,
        );
        Ok(DatasetBundle { splits, batcher })
    }
}
