// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Automatic Display/Error trait implementations

use thiserror::Error;

/// Region filler errors
#[derive(Debug, Error)]
pub enum InpaintError {
    #[error("image is {image_width}x{image_height} but mask is {mask_width}x{mask_height}")]
    DimensionMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("mask covers the entire image, nothing to sample from")]
    FullyMasked,

    #[error("inpaint radius must be >= 1, got {0}")]
    InvalidRadius(u32),
}

/// Remote restoration service errors
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("content safety layer rejected the image: {reason}")]
    SafetyBlocked { reason: String },

    #[error("generation stopped before an image was produced: {reason}")]
    GenerationStopped { reason: String },

    #[error("response contained no image payload")]
    NoImageReturned,

    #[error("network error: {message}")]
    Network { message: String },

    #[error("rate limit still in effect after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("API request failed: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Per-item processing errors
///
/// Every variant is fatal for its item only; the batch keeps going.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Inpaint(#[from] InpaintError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("failed to encode result image: {0}")]
    Encode(image::ImageError),
}

/// Flat classification of a per-item failure, stored in `ProcessingState::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Encode,
    Inpaint,
    Network,
    RateLimitExceeded,
    SafetyBlocked,
    GenerationStopped,
    NoImageReturned,
    Api,
    /// Worker crashed (panic or cancellation) before producing a result.
    Internal,
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::Decode(_) => ErrorKind::Decode,
            ProcessError::Encode(_) => ErrorKind::Encode,
            ProcessError::Inpaint(_) => ErrorKind::Inpaint,
            ProcessError::Remote(e) => match e {
                RemoteError::SafetyBlocked { .. } => ErrorKind::SafetyBlocked,
                RemoteError::GenerationStopped { .. } => ErrorKind::GenerationStopped,
                RemoteError::NoImageReturned => ErrorKind::NoImageReturned,
                RemoteError::Network { .. } => ErrorKind::Network,
                RemoteError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
                RemoteError::Api { .. } => ErrorKind::Api,
            },
        }
    }
}

/// Archive building errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
///
/// These are the only batch-fatal errors; they are surfaced once, before
/// any item is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API key configured (set GEMINI_API_KEY) but remote strategy selected")]
    MissingApiKey,

    #[error("brightness threshold must be in [150, 250], got {0}")]
    InvalidBrightnessThreshold(u32),

    #[error("inpaint radius must be >= 1, got {0}")]
    InvalidInpaintRadius(u32),

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("concurrency must be > 0, got {0}")]
    InvalidConcurrency(usize),

    #[error("environment variable parsing failed: {0}")]
    EnvVarError(String),
}

// Convenience type aliases for Results
pub type InpaintResult<T> = Result<T, InpaintError>;
pub type RemoteResult<T> = Result<T, RemoteError>;
pub type ProcessResult<T> = Result<T, ProcessError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
