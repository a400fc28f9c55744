//! Integration tests for the `hourglass` binary.

use assert_cmd::Command;
use hourglass_training::{write_jsonl_records, PoseRecord};
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn write_fixture(temp: &TempDir) -> std::path::PathBuf {
    let images_dir = temp.path().join("images");
    std::fs::create_dir_all(&images_dir).unwrap();

    let mut records = Vec::new();
    for i in 0..4 {
        let name = format!("img_{i}.png");
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([80, 40, 20]));
        img.save(images_dir.join(&name)).unwrap();
        records.push(PoseRecord {
            image: name.into(),
            joints: vec![[4.0, 4.0], [12.0, 12.0]],
            visible: vec![],
            split: None,
        });
    }
    write_jsonl_records(&temp.path().join("labels.jsonl"), &records).unwrap();

    let config_path = temp.path().join("run.yaml");
    std::fs::write(&config_path, config_yaml(temp.path())).unwrap();
    config_path
}

fn config_yaml(root: &Path) -> String {
    format!(
        r#"
data:
  labels_file: "{root}/labels.jsonl"
  images_dir: "{root}/images"
dataset:
  image_size: 16
  heatmap:
    size: 4
    stddev: 1.0
  split:
    train: 0.75
    validation: 0.25
    test: 0.0
  shuffle: false
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

#[test]
fn test_check_reports_resolved_plan() {
    let temp = TempDir::new().unwrap();
    let config_path = write_fixture(&temp);

    let mut cmd = Command::cargo_bin("hourglass").unwrap();
    cmd.arg("check")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration ok"))
        .stdout(predicate::str::contains("handlers.train"));
}

#[test]
fn test_check_rejects_unknown_reference() {
    let temp = TempDir::new().unwrap();
    let config_path = write_fixture(&temp);
    let patched = std::fs::read_to_string(&config_path).unwrap().replace(
        "model:\n",
        "model:\n  object:\n    source: nonexistent.module.Foo\n",
    );
    std::fs::write(&config_path, patched).unwrap();

    let mut cmd = Command::cargo_bin("hourglass").unwrap();
    cmd.arg("check")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nonexistent.module.Foo"));
}

#[test]
fn test_train_runs_pipeline_and_writes_checkpoint() {
    let temp = TempDir::new().unwrap();
    let config_path = write_fixture(&temp);

    let mut cmd = Command::cargo_bin("hourglass").unwrap();
    cmd.arg("train")
        .arg("--config")
        .arg(&config_path)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("finished"))
        .stdout(predicate::str::contains("checkpoint"));

    assert!(temp.path().join("artifacts").join("runs").is_dir());
}

#[test]
fn test_missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("hourglass").unwrap();
    cmd.arg("train")
        .arg("--config")
        .arg("/does/not/exist.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("exist.yaml"));
}
