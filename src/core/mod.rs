pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ArchiveError, ConfigError, ErrorKind, InpaintError, ProcessError, RemoteError,
};
pub use types::{BatchItem, BatchReport, ItemReport, ProcessingState, ProgressFn, StopToken};
