use crate::error::{PipelineError, PipelineResult};
use crate::handlers::DataHandler;
use hourglass_config::{DataConfig, RunMetadata};
use hourglass_training::{read_jsonl_records, record_set_id, validate_records, RecordSet};
use tracing::info;

/// Default data handler: reads pose records from the configured JSONL file.
pub struct JsonlDataHandler {
    config: DataConfig,
}

impl JsonlDataHandler {
    #[must_use]
    pub fn new(config: DataConfig) -> Self {
        Self { config }
    }
}

impl DataHandler for JsonlDataHandler {
    fn init_handler(&mut self, meta: &mut RunMetadata) -> PipelineResult<()> {
        if !self.config.labels_file.exists() {
            return Err(PipelineError::handler(format!(
                "labels file does not exist: {}",
                self.config.labels_file.display()
            )));
        }
        if !self.config.images_dir.is_dir() {
            return Err(PipelineError::handler(format!(
                "images directory does not exist: {}",
                self.config.images_dir.display()
            )));
        }
        if let Some(joints) = &self.config.joints {
            meta.joint_names = Some(joints.clone());
        }
        Ok(())
    }

    fn run(&mut self, meta: &mut RunMetadata) -> PipelineResult<RecordSet> {
        let mut records = read_jsonl_records(&self.config.labels_file)?;
        validate_records(&records)?;

        // Downstream stages see full image paths; the backing store stays
        // this handler's concern.
        for record in &mut records {
            record.image = self.config.images_dir.join(&record.image);
        }

        let joint_count = records[0].joints.len();
        if let Some(names) = &self.config.joints {
            if names.len() != joint_count {
                return Err(PipelineError::handler(format!(
                    "configured {} joint names but records carry {joint_count} joints",
                    names.len()
                )));
            }
        }

        meta.joint_count = Some(joint_count);
        meta.record_count = records.len();
        meta.record_set_id = Some(record_set_id(&records)?);
        info!(
            records = records.len(),
            joints = joint_count,
            labels_file = %self.config.labels_file.display(),
            "loaded pose records"
        );
        Ok(records)
    }
}
