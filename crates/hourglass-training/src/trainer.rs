//! Compile-then-fit trainer over the stacked hourglass network.

use crate::artifacts::{make_artifact, ArtifactKind, RunId, TrainingManifest};
use crate::batch::PoseBatcher;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::RunLayout;
use crate::objects::{LossFn, LrSchedule, MetricFn, ModelStepFn, OptimizerSpec, TrainingRegistries};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::records::RecordSet;
use crate::splits::SplitSets;
use crate::{CpuBackend, TrainingBackend};
use burn::module::{AutodiffModule, Module};
use burn::optim::GradientsParams;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use hourglass_config::{DataFormat, RunMetadata, TrainConfig};
use hourglass_model::HourglassNetwork;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Lifecycle of a trainer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerState {
    Constructed,
    Initialized,
    Compiled,
    Fitting,
    Done,
    Failed(String),
}

/// Metric values gathered over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub train_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validation: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub test: BTreeMap<String, f64>,
}

/// Outcome of a completed fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub run_id: RunId,
    pub epochs_completed: u32,
    pub batch_size: u32,
    pub train_batches_per_epoch: usize,
    pub validation_evaluated: bool,
    pub test_evaluated: bool,
    pub metrics: ReportMetrics,
    pub checkpoint_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Drives optimization of a built network over the split datasets.
///
/// `run` is a fixed two-step sequence: `compile` resolves the schedule, loss,
/// optimizer and metrics and validates geometry; `fit` only ever starts after
/// a successful compile. A failure in either step is terminal for the
/// instance and propagates to the caller unchanged.
pub struct PoseTrainer {
    config: TrainConfig,
    run_id: RunId,
    state: TrainerState,
    schedule: Option<LrSchedule>,
    loss: Option<LossFn>,
    optimizer: Option<OptimizerSpec>,
    metrics: Vec<MetricFn>,
    step: Option<ModelStepFn>,
    record_set_id: Option<String>,
}

impl PoseTrainer {
    #[must_use]
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            run_id: RunId::new(),
            state: TrainerState::Constructed,
            schedule: None,
            loss: None,
            optimizer: None,
            metrics: Vec::new(),
            step: None,
            record_set_id: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// One-time setup: resolves every configured training object.
    /// Resolution failures are configuration errors.
    pub fn init_handler(&mut self, registries: &TrainingRegistries) -> TrainingResult<()> {
        if self.state != TrainerState::Constructed {
            return Err(self.fail("init_handler called more than once"));
        }
        let resolved = (|| -> TrainingResult<_> {
            let schedule = registries.resolve_schedule(&self.config.learning_rate)?;
            let loss = registries.resolve_loss(&self.config.loss)?;
            let optimizer = registries.resolve_optimizer(&self.config.optimizer)?;
            let metrics = registries.resolve_metrics(&self.config.metrics)?;
            Ok((schedule, loss, optimizer, metrics))
        })();
        match resolved {
            Ok((schedule, loss, optimizer, metrics)) => {
                self.schedule = Some(schedule);
                self.loss = Some(loss);
                self.optimizer = Some(optimizer);
                self.metrics = metrics;
                self.state = TrainerState::Initialized;
                Ok(())
            }
            Err(err) => {
                self.state = TrainerState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Validates geometry agreement and instantiates the optimizer.
    pub fn compile(
        &mut self,
        model: &HourglassNetwork<TrainingBackend>,
        meta: &RunMetadata,
    ) -> TrainingResult<()> {
        if self.state != TrainerState::Initialized {
            return Err(self.fail("compile requires an initialized trainer"));
        }

        if let Some(joints) = meta.joint_count {
            if joints as u32 != model.output_channels() {
                return Err(self.fail(format!(
                    "record joint count {joints} does not match model output_channels {}",
                    model.output_channels()
                )));
            }
        }
        if let Some(image_size) = meta.image_size {
            if image_size != model.input_size() {
                return Err(self.fail(format!(
                    "dataset image_size {image_size} does not match model input_size {}",
                    model.input_size()
                )));
            }
        }
        if let Some(heatmap_size) = meta.heatmap_size {
            if heatmap_size != model.output_size() {
                return Err(self.fail(format!(
                    "dataset heatmap size {heatmap_size} does not match model output_size {}",
                    model.output_size()
                )));
            }
        }

        let Some(optimizer) = self.optimizer.as_ref() else {
            return Err(self.fail("optimizer was not resolved"));
        };
        self.step = Some(optimizer.build());
        self.record_set_id = meta.record_set_id.clone();
        self.state = TrainerState::Compiled;
        info!(run_id = %self.run_id, "trainer compiled");
        Ok(())
    }

    /// Optimizes over the train split; evaluates validation after each epoch
    /// and test after the final one, when those splits are present.
    pub fn fit(
        &mut self,
        model: HourglassNetwork<TrainingBackend>,
        splits: &SplitSets,
        batcher: &PoseBatcher,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainReport> {
        if self.state != TrainerState::Compiled {
            return Err(self.fail("fit called before compile succeeded"));
        }
        self.state = TrainerState::Fitting;
        match self.fit_inner(model, splits, batcher, progress) {
            Ok(report) => {
                self.state = TrainerState::Done;
                Ok(report)
            }
            Err(err) => {
                self.state = TrainerState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// The fixed two-step sequence: compile, then fit.
    pub fn run(
        &mut self,
        model: HourglassNetwork<TrainingBackend>,
        splits: &SplitSets,
        batcher: &PoseBatcher,
        meta: &RunMetadata,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainReport> {
        self.compile(&model, meta)?;
        self.fit(model, splits, batcher, progress)
    }

    fn fail(&mut self, message: impl Into<String>) -> TrainingError {
        let message = message.into();
        self.state = TrainerState::Failed(message.clone());
        TrainingError::Trainer(message)
    }

    fn fit_inner(
        &mut self,
        mut model: HourglassNetwork<TrainingBackend>,
        splits: &SplitSets,
        batcher: &PoseBatcher,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainReport> {
        let schedule = self
            .schedule
            .clone()
            .ok_or_else(|| TrainingError::Trainer("schedule was not resolved".to_string()))?;
        let loss_fn = self
            .loss
            .ok_or_else(|| TrainingError::Trainer("loss was not resolved".to_string()))?;
        let mut step = self
            .step
            .take()
            .ok_or_else(|| TrainingError::Trainer("optimizer was not compiled".to_string()))?;

        let device = <TrainingBackend as Backend>::Device::default();
        let batch_size = self.config.batch_size as usize;
        let epochs = self.config.epochs;
        let run_id = self.run_id.clone();

        progress.on_event(ProgressEvent::Started { run_id: run_id.clone() });
        info!(
            run_id = %run_id,
            epochs,
            batch_size,
            train_records = splits.train.len(),
            "starting fit"
        );

        let mut metrics = ReportMetrics::default();
        let mut global_step: u64 = 0;
        let mut batches_per_epoch = 0usize;

        for epoch in 1..=epochs {
            let order = batcher.epoch_order(splits.train.len(), epoch);
            let mut loss_sum = 0.0f64;
            let mut batches = 0usize;

            for chunk in order.chunks(batch_size) {
                if let Some(cap) = self.config.epoch_size {
                    if batches >= cap as usize {
                        break;
                    }
                }
                let records: Vec<_> = chunk.iter().map(|&i| splits.train[i].clone()).collect();
                let batch = batcher.batch::<TrainingBackend>(&records, &device)?;

                let heads = model.forward(batch.images);
                let loss = heads
                    .into_iter()
                    .map(|head| loss_fn.forward(head, batch.targets.clone()))
                    .reduce(|a, b| a + b)
                    .ok_or_else(|| TrainingError::Trainer("model produced no heads".to_string()))?;

                loss_sum += scalar(&loss);
                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = step(schedule.rate_at(global_step), model, grads);
                global_step += 1;
                batches += 1;
            }

            let avg_loss = loss_sum / batches.max(1) as f64;
            batches_per_epoch = batches;
            metrics.train_loss = Some(avg_loss);
            info!(run_id = %run_id, epoch, avg_loss, "epoch completed");
            progress.on_event(ProgressEvent::EpochCompleted {
                run_id: run_id.clone(),
                epoch,
                total: epochs,
                train_loss: avg_loss,
            });

            if splits.has_validation() && !self.metrics.is_empty() {
                metrics.validation =
                    self.evaluate(&model.valid(), &splits.validation, batcher)?;
            }
        }

        if splits.has_test() && !self.metrics.is_empty() {
            metrics.test = self.evaluate(&model.valid(), &splits.test, batcher)?;
        } else if !splits.has_test() {
            warn!(run_id = %run_id, "no test split; skipping final evaluation");
        }

        let layout = RunLayout::for_artifacts_dir(&self.config.artifacts_dir);
        layout.ensure_run_dirs(&run_id)?;
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let checkpoint_base = layout.checkpoints_dir(&run_id).join("hourglass");
        model.clone().save_file(checkpoint_base.clone(), &recorder)?;
        let checkpoint_path = checkpoint_base.with_extension("bin");

        let manifest = TrainingManifest {
            run_id: run_id.clone(),
            created_at: chrono::Utc::now(),
            record_set_id: self.record_set_id.clone().unwrap_or_default(),
            epochs,
            metrics: metrics.clone(),
            artifacts: vec![make_artifact(ArtifactKind::Checkpoint, checkpoint_path.clone())?],
        };
        let manifest_path = layout.manifest_path(&run_id);
        std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;

        progress.on_event(ProgressEvent::Finished { run_id: run_id.clone() });

        Ok(TrainReport {
            run_id,
            epochs_completed: epochs,
            batch_size: self.config.batch_size,
            train_batches_per_epoch: batches_per_epoch,
            validation_evaluated: splits.has_validation() && !self.metrics.is_empty(),
            test_evaluated: splits.has_test() && !self.metrics.is_empty(),
            metrics,
            checkpoint_path,
            manifest_path,
        })
    }

    fn evaluate(
        &self,
        model: &HourglassNetwork<CpuBackend>,
        records: &RecordSet,
        batcher: &PoseBatcher,
    ) -> TrainingResult<BTreeMap<String, f64>> {
        let device = <CpuBackend as Backend>::Device::default();
        let batch_size = self.config.batch_size as usize;

        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        let mut total = 0usize;
        for chunk in records.chunks(batch_size) {
            let batch = batcher.batch::<CpuBackend>(chunk, &device)?;
            let heads = model.forward(batch.images);
            let head = heads
                .into_iter()
                .next_back()
                .ok_or_else(|| TrainingError::Trainer("model produced no heads".to_string()))?;
            // Metrics expect NCHW order.
            let (head, targets) = match batcher.data_format() {
                DataFormat::Nchw => (head, batch.targets),
                DataFormat::Nhwc => {
                    (head.permute([0, 3, 1, 2]), batch.targets.permute([0, 3, 1, 2]))
                }
            };
            let (pred, target) = to_nchw_data(head, targets)?;
            let dims = pred.1;
            for metric in &self.metrics {
                let value = metric.evaluate(&pred.0, &target.0, dims);
                *sums.entry(metric.name()).or_insert(0.0) += value * chunk.len() as f64;
            }
            total += chunk.len();
        }

        Ok(sums
            .into_iter()
            .map(|(name, sum)| (name, sum / total.max(1) as f64))
            .collect())
    }
}

fn scalar(tensor: &Tensor<TrainingBackend, 1>) -> f64 {
    tensor
        .clone()
        .into_data()
        .to_vec::<f32>()
        .ok()
        .and_then(|v| v.first().copied())
        .map_or(0.0, f64::from)
}

type PlaneData = (Vec<f32>, [usize; 4]);

fn to_nchw_data(
    pred: Tensor<CpuBackend, 4>,
    target: Tensor<CpuBackend, 4>,
) -> TrainingResult<(PlaneData, PlaneData)> {
    let flatten = |tensor: Tensor<CpuBackend, 4>| -> TrainingResult<PlaneData> {
        let dims = tensor.dims();
        let values = tensor
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| TrainingError::Trainer(format!("failed to read tensor data: {e:?}")))?;
        Ok((values, dims))
    };
    Ok((flatten(pred)?, flatten(target)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PoseRecord;
    use hourglass_config::{
        DataFormat as Format, ModelConfig, ModelParams, ObjectRef, RunMetadata, TrainConfig,
        ValueOrRef,
    };
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for CountingSink {
        fn on_event(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl CountingSink {
        fn started_count(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, ProgressEvent::Started { .. }))
                .count()
        }
    }

    fn tiny_model_config() -> ModelConfig {
        ModelConfig {
            object: ObjectRef::new("handlers.model"),
            build_as_model: false,
            data_format: Format::Nchw,
            params: ModelParams {
                input_size: 16,
                output_size: 4,
                stages: 1,
                stage_filters: 4,
                output_channels: 2,
                downsamplings_per_stage: 2,
                intermediate_supervision: true,
                ..ModelParams::default()
            },
        }
    }

    fn tiny_train_config(artifacts_dir: std::path::PathBuf) -> TrainConfig {
        TrainConfig {
            object: ObjectRef::new("handlers.train"),
            epochs: 1,
            epoch_size: None,
            batch_size: 2,
            learning_rate: ValueOrRef::Value(1e-3),
            loss: ValueOrRef::Value("mse".to_string()),
            optimizer: ValueOrRef::Value("sgd".to_string()),
            metrics: vec![ObjectRef::new("metrics.mean_absolute_error")],
            artifacts_dir,
        }
    }

    fn fixture(temp: &TempDir) -> (SplitSets, PoseBatcher, RunMetadata) {
        for name in ["a.png", "b.png", "c.png"] {
            let img = image::RgbImage::from_pixel(16, 16, image::Rgb([100, 50, 25]));
            img.save(temp.path().join(name)).unwrap();
        }
        let record = |name: &str| PoseRecord {
            image: name.into(),
            joints: vec![[4.0, 4.0], [12.0, 12.0]],
            visible: vec![],
            split: None,
        };
        let splits = SplitSets {
            train: vec![record("a.png"), record("b.png")],
            validation: vec![record("c.png")],
            test: Vec::new(),
        };
        let batcher = PoseBatcher::new(
            temp.path().to_path_buf(),
            16,
            4,
            1.0,
            2,
            Format::Nchw,
            false,
            0,
        );
        let meta = RunMetadata {
            joint_count: Some(2),
            image_size: Some(16),
            heatmap_size: Some(4),
            record_set_id: Some("test-set".to_string()),
            ..RunMetadata::default()
        };
        (splits, batcher, meta)
    }

    fn built_model() -> HourglassNetwork<TrainingBackend> {
        HourglassNetwork::new(&tiny_model_config(), &Default::default()).unwrap()
    }

    #[test]
    fn test_run_compiles_then_fits_once() {
        let temp = TempDir::new().unwrap();
        let (splits, batcher, meta) = fixture(&temp);
        let mut trainer = PoseTrainer::new(tiny_train_config(temp.path().join("artifacts")));
        trainer.init_handler(&TrainingRegistries::builtin()).unwrap();

        let sink = CountingSink::default();
        let report = trainer.run(built_model(), &splits, &batcher, &meta, &sink).unwrap();

        assert_eq!(trainer.state(), &TrainerState::Done);
        assert_eq!(sink.started_count(), 1);
        assert_eq!(report.epochs_completed, 1);
        assert_eq!(report.batch_size, 2);
        assert_eq!(report.train_batches_per_epoch, 1);
        assert!(report.validation_evaluated);
        assert!(!report.test_evaluated);
        assert!(report.metrics.validation.contains_key("mean_absolute_error"));
        assert!(report.checkpoint_path.exists());
        assert!(report.manifest_path.exists());
    }

    #[test]
    fn test_fit_before_compile_is_rejected() {
        let temp = TempDir::new().unwrap();
        let (splits, batcher, _meta) = fixture(&temp);
        let mut trainer = PoseTrainer::new(tiny_train_config(temp.path().join("artifacts")));
        trainer.init_handler(&TrainingRegistries::builtin()).unwrap();

        let sink = CountingSink::default();
        let err = trainer.fit(built_model(), &splits, &batcher, &sink).unwrap_err();
        assert!(err.to_string().contains("compile"));
        assert_eq!(sink.started_count(), 0);
    }

    #[test]
    fn test_run_never_fits_when_compile_fails() {
        let temp = TempDir::new().unwrap();
        let (splits, batcher, mut meta) = fixture(&temp);
        meta.joint_count = Some(3);

        let mut trainer = PoseTrainer::new(tiny_train_config(temp.path().join("artifacts")));
        trainer.init_handler(&TrainingRegistries::builtin()).unwrap();

        let sink = CountingSink::default();
        let err = trainer.run(built_model(), &splits, &batcher, &meta, &sink).unwrap_err();
        assert!(err.to_string().contains("joint count"));
        assert_eq!(sink.started_count(), 0);
        assert!(matches!(trainer.state(), TrainerState::Failed(_)));
    }

    #[test]
    fn test_init_resolution_failure_names_the_path() {
        let temp = TempDir::new().unwrap();
        let mut config = tiny_train_config(temp.path().join("artifacts"));
        config.optimizer = ValueOrRef::Value("rmsprop".to_string());

        let mut trainer = PoseTrainer::new(config);
        let err = trainer.init_handler(&TrainingRegistries::builtin()).unwrap_err();
        assert!(err.to_string().contains("rmsprop"));
        assert!(matches!(trainer.state(), TrainerState::Failed(_)));
    }

    #[test]
    fn test_state_machine_progression() {
        let temp = TempDir::new().unwrap();
        let (splits, batcher, meta) = fixture(&temp);
        let mut trainer = PoseTrainer::new(tiny_train_config(temp.path().join("artifacts")));
        assert_eq!(trainer.state(), &TrainerState::Constructed);

        trainer.init_handler(&TrainingRegistries::builtin()).unwrap();
        assert_eq!(trainer.state(), &TrainerState::Initialized);

        let model = built_model();
        trainer.compile(&model, &meta).unwrap();
        assert_eq!(trainer.state(), &TrainerState::Compiled);

        trainer.fit(model, &splits, &batcher, &StdoutSinkForTest).unwrap();
        assert_eq!(trainer.state(), &TrainerState::Done);
    }

    struct StdoutSinkForTest;

    impl ProgressSink for StdoutSinkForTest {
        fn on_event(&self, _event: ProgressEvent) {}
    }
}
