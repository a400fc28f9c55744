use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Identifier for a training run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Checkpoint,
    Config,
    Metrics,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub sha256: String,
}

/// Record of a finished run, written next to its artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingManifest {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub record_set_id: String,
    pub epochs: u32,
    #[serde(default)]
    pub metrics: crate::trainer::ReportMetrics,
    pub artifacts: Vec<TrainingArtifact>,
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn make_artifact(kind: ArtifactKind, path: PathBuf) -> TrainingResult<TrainingArtifact> {
    if !path.exists() {
        return Err(TrainingError::Artifact(format!(
            "artifact path does not exist: {}",
            path.display()
        )));
    }

    let hash = sha256_file(&path)?;
    Ok(TrainingArtifact { kind, path, sha256: hash })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_make_artifact_hashes_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ckpt.bin");
        std::fs::write(&path, b"weights").unwrap();

        let artifact = make_artifact(ArtifactKind::Checkpoint, path).unwrap();
        assert_eq!(artifact.sha256.len(), 64);
    }

    #[test]
    fn test_make_artifact_rejects_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.bin");
        assert!(make_artifact(ArtifactKind::Checkpoint, missing).is_err());
    }
}
