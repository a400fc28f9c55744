use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Split a record is pinned to, when the label file declares one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Validation,
    Test,
}

/// A single labeled pose sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    /// Image path, relative to the configured images directory.
    pub image: PathBuf,
    /// Joint positions in source-image pixel coordinates, channel order.
    pub joints: Vec<[f32; 2]>,
    /// Per-joint visibility; empty means every joint is visible.
    #[serde(default)]
    pub visible: Vec<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Split>,
}

impl PoseRecord {
    #[must_use]
    pub fn is_visible(&self, joint: usize) -> bool {
        self.visible.get(joint).copied().unwrap_or(true)
    }
}

pub type RecordSet = Vec<PoseRecord>;

pub fn write_jsonl_records(path: &Path, records: &[PoseRecord]) -> TrainingResult<()> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

pub fn read_jsonl_records(path: &Path) -> TrainingResult<RecordSet> {
    let contents = std::fs::read_to_string(path)?;
    let mut records = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: PoseRecord = serde_json::from_str(line).map_err(|e| {
            TrainingError::Records(format!("failed to parse jsonl line {}: {}", idx + 1, e))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Checks structural invariants shared by every consumer of a record set:
/// non-empty, a single joint count across records, visibility vectors that
/// match it, and finite non-negative coordinates.
pub fn validate_records(records: &[PoseRecord]) -> TrainingResult<()> {
    if records.is_empty() {
        return Err(TrainingError::Records("record set must not be empty".to_string()));
    }
    let joint_count = records[0].joints.len();
    if joint_count == 0 {
        return Err(TrainingError::Records("record[0] has no joints".to_string()));
    }
    for (idx, record) in records.iter().enumerate() {
        if record.joints.len() != joint_count {
            return Err(TrainingError::Records(format!(
                "record[{idx}] has {} joints, expected {joint_count}",
                record.joints.len()
            )));
        }
        if !record.visible.is_empty() && record.visible.len() != joint_count {
            return Err(TrainingError::Records(format!(
                "record[{idx}] visibility length {} does not match joint count {joint_count}",
                record.visible.len()
            )));
        }
        for (j, [x, y]) in record.joints.iter().enumerate() {
            if !x.is_finite() || !y.is_finite() || *x < 0.0 || *y < 0.0 {
                return Err(TrainingError::Records(format!(
                    "record[{idx}] joint[{j}] has invalid coordinates ({x}, {y})"
                )));
            }
        }
    }
    Ok(())
}

/// Stable content hash of a record set (hex SHA-256).
pub fn record_set_id(records: &[PoseRecord]) -> TrainingResult<String> {
    let mut hasher = Sha256::new();
    for record in records {
        let bytes = serde_json::to_vec(record)?;
        hasher.update(bytes);
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}
