pub mod cancel;
pub mod executor;
pub mod policy;

pub use cancel::CancelSignal;
pub use executor::run_with_retry;
pub use policy::{PolicyError, RetryPolicy};
