//! # dns-converge-core
//!
//! The reconciliation driver: loads the desired configuration, builds
//! provider instances from credentials, and runs each `(zone, provider)`
//! pair through audit → fetch → plan → apply, collecting a [`RunReport`].
//!
//! Storage is abstracted behind [`CredentialStore`] and [`ProviderRegistry`],
//! so the CLI (or any other front end) only injects its own implementations
//! through [`ServiceContext`].
//!
//! [`RunReport`]: types::RunReport

pub mod error;
pub mod services;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use error::{CoreError, CoreResult, ZoneError};
pub use services::{ReconcileService, ServiceContext, ZoneService, ZoneSnapshot};
pub use traits::{CredentialStore, InMemoryProviderRegistry, ProviderRegistry};
