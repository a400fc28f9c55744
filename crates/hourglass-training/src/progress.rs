use crate::artifacts::RunId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { run_id: RunId },
    Message { run_id: RunId, message: String },
    EpochCompleted { run_id: RunId, epoch: u32, total: u32, train_loss: f64 },
    Finished { run_id: RunId },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { run_id } => println!("[train:{run_id}] started"),
            ProgressEvent::Message { run_id, message } => println!("[train:{run_id}] {message}"),
            ProgressEvent::EpochCompleted { run_id, epoch, total, train_loss } => {
                println!("[train:{run_id}] epoch {epoch}/{total}: loss {train_loss:.4}");
            }
            ProgressEvent::Finished { run_id } => println!("[train:{run_id}] finished"),
        }
    }
}
