pub mod retry;
pub mod timeout;

pub use retry::{retry_with_policy, RetryConfig, RetryOutcome, RetryPolicy};
pub use timeout::{with_logged_timeout, TimeoutExt};
