//! DNS Provider implementations

/// Shared utilities used by provider implementations.
pub mod common;

#[cfg(feature = "cloudflare")]
mod cloudflare;
#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "cloudflare")]
pub use cloudflare::CloudflareProvider;
#[cfg(feature = "memory")]
pub use memory::InMemoryProvider;
