pub mod limiter;
pub mod window;

pub use limiter::{RateKey, RateLimit, RateLimiter};
pub use window::RateWindow;
