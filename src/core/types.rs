// Shared types for the watermark-removal workflow

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::errors::ErrorKind;

/// Lifecycle state of one batch item.
///
/// `Success` and `Failed` are terminal: the orchestrator never mutates them
/// again within a run. Terminal states are retained until the batch is
/// cleared, which is what makes skip-already-succeeded re-runs possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    Pending,
    InProgress,
    Success { processed_bytes: Arc<Vec<u8>> },
    Failed { kind: ErrorKind, message: String },
}

impl ProcessingState {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingState::Success { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingState::Success { .. } | ProcessingState::Failed { .. }
        )
    }

    /// Cleaned output bytes, if this item has succeeded.
    pub fn processed_bytes(&self) -> Option<&[u8]> {
        match self {
            ProcessingState::Success { processed_bytes } => Some(processed_bytes),
            _ => None,
        }
    }
}

/// One image in the batch arena.
///
/// The original encoded bytes are held behind an `Arc` so workers and retries
/// share them without copying; they are never mutated after construction.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Stable identity, typically the upload filename.
    pub name: String,
    /// Original encoded bytes (PNG/JPEG/WEBP), untouched by processing.
    pub original_bytes: Arc<Vec<u8>>,
    /// Declared MIME type, e.g. "image/png".
    pub mime_type: String,
    pub state: ProcessingState,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_bytes: Arc::new(bytes),
            mime_type: mime_type.into(),
            state: ProcessingState::Pending,
        }
    }
}

/// Per-item summary row in a batch report.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Serializable summary of one orchestrator run.
///
/// The item arena itself holds the processed bytes; this report carries only
/// what a presentation layer needs to render per-item status.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Items left untouched because they were already `Success`.
    pub skipped: usize,
    pub processing_time_ms: f64,
    pub results: Vec<ItemReport>,
}

/// Cooperative stop signal.
///
/// Checked by the orchestrator between items and by the retry controller
/// before each backoff sleep. Once raised, in-flight items finish or fail
/// normally but no new items start.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress observer invoked after each item with `(completed, total)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_token_latches() {
        let token = StopToken::new();
        assert!(!token.is_stopped());
        token.stop();
        assert!(token.is_stopped());

        let clone = token.clone();
        assert!(clone.is_stopped());
    }

    #[test]
    fn terminal_states() {
        assert!(!ProcessingState::Pending.is_terminal());
        assert!(!ProcessingState::InProgress.is_terminal());
        assert!(ProcessingState::Success {
            processed_bytes: Arc::new(vec![1, 2, 3])
        }
        .is_terminal());
        assert!(ProcessingState::Failed {
            kind: ErrorKind::Network,
            message: "timeout".to_string()
        }
        .is_terminal());
    }
}
