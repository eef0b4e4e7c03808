//! Services that run beside the request workflow

pub mod progress;

pub use progress::{
    ProcessingStage, ProgressHandle, ProgressReporter, ProgressSink, ProgressUpdate, StageUpdater,
};
