//! Hourglass Training
//!
//! Training-side primitives for the hourglass pipeline:
//! - Pose records and their JSONL on-disk form
//! - Split assignment and batched tensor assembly
//! - Registry-resolvable schedules, losses, optimizers and metrics
//! - The compile-then-fit trainer and its run artifacts
//!
//! Gradients, optimizer math and checkpoint encoding are Burn's; image
//! decoding is the `image` crate's.

pub mod artifacts;
pub mod batch;
pub mod error;
pub mod layout;
pub mod objects;
pub mod progress;
pub mod records;
pub mod splits;
pub mod trainer;

pub use artifacts::{make_artifact, sha256_file, ArtifactKind, RunId, TrainingArtifact, TrainingManifest};
pub use batch::{PoseBatch, PoseBatcher};
pub use error::{TrainingError, TrainingResult};
pub use layout::RunLayout;
pub use objects::{
    loss_registry, metric_registry, optimizer_registry, schedule_registry, LossFn, LrSchedule,
    MetricFn, OptimizerSpec, TrainingRegistries,
};
pub use progress::{ProgressEvent, ProgressSink, StdoutProgressSink};
pub use records::{read_jsonl_records, record_set_id, validate_records, write_jsonl_records, PoseRecord, RecordSet, Split};
pub use splits::{split_records, SplitSets};
pub use trainer::{PoseTrainer, ReportMetrics, TrainReport, TrainerState};

/// CPU backend used for evaluation and inference.
pub type CpuBackend = burn::backend::NdArray<f32>;

/// Autodiff backend the trainer optimizes on.
pub type TrainingBackend = burn::backend::Autodiff<CpuBackend>;
