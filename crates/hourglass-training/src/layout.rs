use crate::artifacts::RunId;
use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

/// Filesystem layout for training run artifacts.
///
/// Default layout is `<artifacts_dir>/runs/<run_id>/...`
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create a layout rooted in a configured artifacts directory.
    #[must_use]
    pub fn for_artifacts_dir(artifacts_dir: &Path) -> Self {
        Self::new(artifacts_dir.join("runs"))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join(run_id.0.as_str())
    }

    #[must_use]
    pub fn manifest_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("training_manifest.json")
    }

    #[must_use]
    pub fn checkpoints_dir(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("checkpoints")
    }

    pub fn ensure_run_dirs(&self, run_id: &RunId) -> TrainingResult<()> {
        std::fs::create_dir_all(self.run_dir(run_id))?;
        std::fs::create_dir_all(self.checkpoints_dir(run_id))?;
        Ok(())
    }
}
