//! The pipeline orchestrator.

use crate::error::{PipelineError, PipelineResult};
use crate::registries::HandlerRegistries;
use hourglass_config::{load_config, RunConfig, RunMetadata};
use hourglass_model::ModelSummary;
use hourglass_training::{ProgressEvent, ProgressSink, StdoutProgressSink, TrainReport};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Everything a finished run reports back.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub metadata: RunMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSummary>,
    pub report: TrainReport,
}

struct SilentSink;

impl ProgressSink for SilentSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Parses the configuration once at construction, then runs the four-stage
/// pipeline in fixed order: data → dataset → model → train.
///
/// Each stage's output is passed explicitly into the next stage; the shared
/// [`RunMetadata`] is threaded by mutable reference in the same order. The
/// first error halts the pipeline and is surfaced wrapped with the stage
/// name.
pub struct Manager {
    config: RunConfig,
    metadata: RunMetadata,
    registries: HandlerRegistries,
    verbose: bool,
}

impl Manager {
    /// Loads and validates the configuration document exactly once.
    pub fn from_file(path: &Path, verbose: bool) -> PipelineResult<Self> {
        let config = load_config(path)?;
        Ok(Self::with_config(config, verbose))
    }

    /// Builds a manager around an already-validated configuration.
    #[must_use]
    pub fn with_config(config: RunConfig, verbose: bool) -> Self {
        Self {
            config,
            metadata: RunMetadata::new(),
            registries: HandlerRegistries::builtin(),
            verbose,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[must_use]
    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Registry access for callers that register custom handlers.
    pub fn registries_mut(&mut self) -> &mut HandlerRegistries {
        &mut self.registries
    }

    /// Executes the pipeline with the default progress sink.
    pub fn run(&mut self) -> PipelineResult<RunSummary> {
        if self.verbose {
            self.run_with_progress(&StdoutProgressSink)
        } else {
            self.run_with_progress(&SilentSink)
        }
    }

    /// Executes the pipeline, emitting training progress into `progress`.
    pub fn run_with_progress(&mut self, progress: &dyn ProgressSink) -> PipelineResult<RunSummary> {
        let meta = &mut self.metadata;

        info!(stage = "data", source = %self.config.data.object.source, "starting stage");
        let records = stage("data", || {
            let mut handler = self.registries.data.resolve(&self.config.data.object, &self.config.data)?;
            handler.init_handler(meta)?;
            handler.run(meta)
        })?;

        info!(stage = "dataset", source = %self.config.dataset.object.source, "starting stage");
        let datasets = stage("dataset", || {
            let mut handler = self
                .registries
                .dataset
                .resolve(&self.config.dataset.object, &self.config.dataset)?;
            handler.init_handler(meta)?;
            handler.run(meta, records, self.config.model.data_format)
        })?;

        info!(stage = "model", source = %self.config.model.object.source, "starting stage");
        let built = stage("model", || {
            let mut handler =
                self.registries.model.resolve(&self.config.model.object, &self.config.model)?;
            handler.init_handler(meta)?;
            handler.run(meta)
        })?;
        let model_summary = built.summary.clone();

        info!(stage = "train", source = %self.config.train.object.source, "starting stage");
        let report = stage("train", || {
            let mut handler =
                self.registries.train.resolve(&self.config.train.object, &self.config.train)?;
            handler.init_handler(&self.registries.training, meta)?;
            handler.run(meta, built, &datasets, progress)
        })?;

        info!(run_id = %report.run_id, "pipeline completed");
        Ok(RunSummary { metadata: self.metadata.clone(), model: model_summary, report })
    }
}

fn stage<T>(
    name: &'static str,
    body: impl FnOnce() -> PipelineResult<T>,
) -> PipelineResult<T> {
    body().map_err(|source| PipelineError::Stage { stage: name, source: Box::new(source) })
}
