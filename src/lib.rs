// Library exports for the watermark-removal workflow

pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{ArchiveError, ConfigError, ErrorKind, InpaintError, ProcessError, RemoteError},
    types::{BatchItem, BatchReport, ItemReport, ProcessingState, ProgressFn, StopToken},
};

pub use middleware::{RetryController, RetryPolicy};

pub use orchestration::{BatchOrchestrator, RunOptions};

pub use services::{
    archive::{build_archive, entry_name},
    strategy::{LocalInpaintParams, LocalInpaintStrategy, RemoteInferenceStrategy, RemovalStrategy},
};
