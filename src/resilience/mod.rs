//! Launch throttling for bulk jobs.
//!
//! ## Rate Limiter
//!
//! The rate limiter bounds how fast new submissions start using a sliding
//! window log: at most `limit` permits in any trailing `interval`.
//!
//! ```rust
//! use bulk_provision::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = RateLimiterConfig::new()
//!     .with_limit(100)
//!     .with_interval(Duration::from_secs(1));
//! let limiter = RateLimiter::new(config);
//!
//! // Suspends until the window has room.
//! limiter.acquire().await;
//! # }
//! ```
//!
//! A limit of zero turns the limiter into a pass-through.

pub mod rate_limiter;
