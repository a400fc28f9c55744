use serde::{Deserialize, Serialize};

/// Record counts per dataset split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

/// Run-scoped facts accumulated across pipeline stages.
///
/// Created once by the manager and threaded by mutable reference through the
/// stages in pipeline order, so each stage's writes are visible to every later
/// stage without shared aliasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Joint names in channel order, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_names: Option<Vec<String>>,
    /// Joint count discovered while loading records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_count: Option<usize>,
    /// Total records loaded by the data stage.
    #[serde(default)]
    pub record_count: usize,
    /// Split sizes published by the dataset stage.
    #[serde(default)]
    pub split_counts: SplitCounts,
    /// Image side length published by the dataset stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<u32>,
    /// Heatmap side length published by the dataset stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap_size: Option<u32>,
    /// Content hash of the loaded record set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_set_id: Option<String>,
}

impl RunMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
