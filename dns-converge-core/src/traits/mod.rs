//! Storage layer abstraction trait definition

mod credential_store;
mod provider_registry;

pub use credential_store::{CredentialStore, CredentialsMap};
pub use provider_registry::{InMemoryProviderRegistry, ProviderRegistry};
