//! Utility modules.

/// Timestamp parsing shared by providers and the rate limiter.
pub mod datetime;
