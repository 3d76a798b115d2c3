pub mod client;
pub mod rate_limiter;
pub mod paginator;

pub use client::{GitHubClient, RetryPolicy};
pub use rate_limiter::RateLimiter;
pub use paginator::Paginator;
