//! End-to-end tests for the four-stage pipeline.

use hourglass_config::{parse_config_str, ConfigFormat, RunMetadata};
use hourglass_pipeline::handlers::NetworkModelHandler;
use hourglass_pipeline::{DatasetBundle, DatasetHandler, Manager, ModelHandler, PipelineError};
use hourglass_training::{write_jsonl_records, PoseRecord, ProgressEvent, ProgressSink};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
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

fn write_fixture(temp: &TempDir, record_count: usize) {
    let images_dir = temp.path().join("images");
    std::fs::create_dir_all(&images_dir).unwrap();

    let mut records = Vec::new();
    for i in 0..record_count {
        let name = format!("img_{i}.png");
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([90, 60, 30]));
        img.save(images_dir.join(&name)).unwrap();
        records.push(PoseRecord {
            image: name.into(),
            joints: vec![[4.0, 4.0], [12.0, 12.0]],
            visible: vec![],
            split: None,
        });
    }
    write_jsonl_records(&temp.path().join("labels.jsonl"), &records).unwrap();
}

fn tiny_config_yaml(root: &Path) -> String {
    format!(
        r#"
data:
  labels_file: "{root}/labels.jsonl"
  images_dir: "{root}/images"
  joints: [head, tail]
dataset:
  image_size: 16
  heatmap:
    size: 4
    stddev: 1.0
  split:
    train: 0.6
    validation: 0.2
    test: 0.2
  shuffle: false
  seed: 3
model:
  build_as_model: true
  data_format: NCHW
  params:
    input_size: 16
    output_size: 4
    stages: 1
    stage_filters: 4
    output_channels: 2
    downsamplings_per_stage: 2
train:
  epochs: 1
  batch_size: 2
  learning_rate: 0.001
  loss: mse
  optimizer: sgd
  metrics:
    - source: metrics.mean_absolute_error
  artifacts_dir: "{root}/artifacts"
"#,
        root = root.display()
    )
}

fn tiny_manager(temp: &TempDir) -> Manager {
    write_fixture(temp, 5);
    let config_path = temp.path().join("run.yaml");
    std::fs::write(&config_path, tiny_config_yaml(temp.path())).unwrap();
    Manager::from_file(&config_path, false).unwrap()
}

#[test]
fn test_end_to_end_run_threads_outputs_through_stages() {
    let temp = TempDir::new().unwrap();
    let mut manager = tiny_manager(&temp);

    let sink = CountingSink::default();
    let summary = manager.run_with_progress(&sink).unwrap();

    assert_eq!(summary.metadata.record_count, 5);
    assert_eq!(summary.metadata.joint_count, Some(2));
    assert_eq!(summary.metadata.split_counts.train, 3);
    assert_eq!(summary.metadata.split_counts.validation, 1);
    assert_eq!(summary.metadata.split_counts.test, 1);
    assert!(summary.metadata.record_set_id.is_some());

    let model = summary.model.expect("build_as_model requests a summary");
    assert_eq!(model.stages, 1);
    assert_eq!(model.output_channels, 2);

    assert_eq!(sink.started_count(), 1);
    assert_eq!(summary.report.batch_size, 2);
    assert_eq!(summary.report.epochs_completed, 1);
    assert!(summary.report.checkpoint_path.exists());
    assert!(summary.report.manifest_path.exists());
}

#[test]
fn test_built_model_has_configured_channels_and_stages() {
    // model.params.stages=4, output_channels=16 must surface in the built
    // network exactly.
    let yaml = r#"
data:
  labels_file: labels.jsonl
  images_dir: images
dataset: {}
model:
  params:
    input_size: 64
    output_size: 16
    stages: 4
    stage_filters: 8
    output_channels: 16
    downsamplings_per_stage: 4
train:
  epochs: 10
  batch_size: 8
"#;
    let config = parse_config_str(yaml, ConfigFormat::Yaml).unwrap();
    let mut handler = NetworkModelHandler::new(config.model);
    let mut meta = RunMetadata::new();
    handler.init_handler(&mut meta).unwrap();
    let built = handler.run(&mut meta).unwrap();

    assert_eq!(built.network.output_channels(), 16);
    assert_eq!(built.network.supervised_stages(), 4);
}

#[test]
fn test_failure_at_a_stage_prevents_any_later_stage() {
    let temp = TempDir::new().unwrap();
    let mut manager = tiny_manager(&temp);

    struct FailingDatasetHandler;

    impl DatasetHandler for FailingDatasetHandler {
        fn init_handler(&mut self, _meta: &mut RunMetadata) -> Result<(), PipelineError> {
            Ok(())
        }

        fn run(
            &mut self,
            _meta: &mut RunMetadata,
            _records: hourglass_training::RecordSet,
            _data_format: hourglass_config::DataFormat,
        ) -> Result<DatasetBundle, PipelineError> {
            Err(PipelineError::handler("injected dataset failure"))
        }
    }

    let model_constructions = Arc::new(AtomicUsize::new(0));
    {
        let registries = manager.registries_mut();
        registries.dataset.register("handlers.dataset", |_config, _params| {
            Ok(Box::new(FailingDatasetHandler) as Box<dyn DatasetHandler>)
        });
        let counter = Arc::clone(&model_constructions);
        registries.model.register("handlers.model", move |config, _params| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NetworkModelHandler::new(config.clone())) as Box<dyn ModelHandler>)
        });
    }

    let err = manager.run().unwrap_err();
    assert!(err.to_string().contains("dataset stage failed"), "got: {err}");
    assert!(err.to_string().contains("injected dataset failure"), "got: {err}");
    assert_eq!(model_constructions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_reference_in_first_section_halts_before_any_handler() {
    let temp = TempDir::new().unwrap();
    write_fixture(&temp, 5);
    let config_path = temp.path().join("run.yaml");
    std::fs::write(&config_path, tiny_config_yaml(temp.path())).unwrap();

    let mut config = hourglass_config::load_config(&config_path).unwrap();
    config.data.object.source = "nonexistent.module.Foo".to_string();
    let mut manager = Manager::with_config(config, false);

    let later_constructions = Arc::new(AtomicUsize::new(0));
    {
        let registries = manager.registries_mut();
        let counter = Arc::clone(&later_constructions);
        registries.dataset.register("handlers.dataset", move |_config, _params| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(hourglass_config::ConfigError::invalid("unreachable", "never constructed"))
        });
    }

    let err = manager.run().unwrap_err();
    assert!(err.to_string().contains("data stage failed"), "got: {err}");
    assert!(err.to_string().contains("nonexistent.module.Foo"), "got: {err}");
    assert_eq!(later_constructions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_config_fails_at_construction() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("run.yaml");
    // Missing the train section entirely.
    std::fs::write(
        &config_path,
        "data:\n  labels_file: l.jsonl\n  images_dir: imgs\ndataset: {}\nmodel: {}\n",
    )
    .unwrap();

    let err = Manager::from_file(&config_path, false).unwrap_err();
    assert!(err.to_string().contains("train"), "got: {err}");
}
