// Removal strategies: the polymorphic capability behind the orchestrator.
//
// Two variants exist: a purely local restoration pipeline and a remote
// generative service. The orchestrator only sees this trait; strategy
// selection happens once, at batch-configuration time.

pub mod local;
pub mod remote;

pub use local::{LocalInpaintParams, LocalInpaintStrategy};
pub use remote::RemoteInferenceStrategy;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::errors::ProcessResult;

/// One watermark-removal strategy applied to a single image.
///
/// Takes the original encoded bytes plus the declared MIME type and yields
/// re-encoded cleaned bytes or a typed per-item failure. Implementations
/// must never mutate the input bytes.
#[async_trait]
pub trait RemovalStrategy: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    async fn process(&self, image_bytes: Arc<Vec<u8>>, mime_type: &str) -> ProcessResult<Vec<u8>>;
}
