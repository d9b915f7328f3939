pub mod retry;

pub use retry::{CallOutcome, RetryController, RetryError, RetryPolicy};
