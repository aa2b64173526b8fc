//! # dns-converge-provider
//!
//! The reconciliation kernel for declarative DNS: a canonical record model,
//! a differ that turns desired and existing zone state into ordered
//! corrections, a shared rate limiter, and provider adapters.
//!
//! ## Supported Providers
//!
//! | Provider | Feature Flag | Auth Method | Granularity |
//! |----------|-------------|-------------|-------------|
//! | [Cloudflare](https://www.cloudflare.com/) | `cloudflare` | Bearer Token | per record |
//! | In-memory | `memory` | none | per record / per group / whole zone |
//!
//! ## Feature Flags
//!
//! ### Provider Selection
//!
//! - **`all-providers`** *(default)* — Enable all providers listed above.
//! - **`cloudflare`** — Enable only the Cloudflare provider.
//! - **`memory`** — Enable only the in-memory provider.
//!
//! ### TLS Backend
//!
//! - **`native-tls`** *(default)* — Use the platform's native TLS implementation.
//! - **`rustls`** — Use rustls. Recommended for cross-compilation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//!
//! use dns_converge_provider::{
//!     create_provider, DomainConfig, ProviderCredentials, Record, RecordType,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = create_provider(ProviderCredentials::Cloudflare {
//!         api_token: "your-token".to_string(),
//!         account_id: None,
//!         endpoint_url: None,
//!     })?;
//!     let cancel = CancellationToken::new();
//!
//!     // 1. Describe the desired zone
//!     let dc = DomainConfig::new("example.com").with_records(vec![
//!         Record::parse("@", "example.com", 3600, RecordType::A, "192.0.2.1")?,
//!         Record::parse("www", "example.com", 3600, RecordType::Cname, "@")?,
//!     ]);
//!
//!     // 2. Fetch what the provider has
//!     let existing = provider
//!         .get_zone_records(&dc.name, &BTreeMap::new(), &cancel)
//!         .await?;
//!
//!     // 3. Plan and apply
//!     let (corrections, _) = provider.get_zone_records_corrections(&dc, &existing)?;
//!     for c in corrections {
//!         println!("{}", c.message);
//!         c.apply(cancel.clone()).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All provider operations return [`Result<T, ProviderError>`](ProviderError).
//! [`ProviderError::kind`] routes each failure to one of the categories in
//! [`ErrorKind`]:
//!
//! - [`ErrorKind::Validation`] — bad input; fatal for the zone
//! - [`ErrorKind::Transport`] — network or API failure
//! - [`ErrorKind::NotFound`] — zone or record missing
//! - [`ErrorKind::Conflict`] — concurrent change at the provider
//!
//! Throttling is absorbed by the per-provider [`RateLimiter`] and the HTTP
//! retry loop, so callers normally never see [`ProviderError::RateLimited`].

mod audit;
mod correction;
pub mod diff;
mod domain;
mod error;
mod factory;
mod http_client;
mod providers;
mod rate_limiter;
pub mod record;
mod traits;
mod types;
mod utils;

// Re-export error types
pub use error::{ErrorKind, ProviderError, Result};

// Re-export factory functions
pub use factory::{create_provider, get_all_provider_metadata};

// Re-export core trait only (internal traits are not exported)
pub use traits::DnsProvider;

pub use audit::{AuditError, audit_records};
pub use correction::{Correction, CorrectionAction};
pub use diff::{ChangeKind, ChangeSet, Correlation, DiffError, Differ};
pub use domain::{DomainConfig, IgnoreTarget};
pub use rate_limiter::{RateLimitVerdict, RateLimiter};
pub use record::{NormalizeOptions, Record, RecordData, RecordKey, RecordType};

// Re-export types
pub use types::{
    ApexNsPolicy, CorrectionGranularity, CredentialValidationError, FieldType,
    ProviderCapabilities, ProviderCredentialField, ProviderCredentials, ProviderMetadata,
    ProviderType,
};

// Re-export concrete providers (behind feature flags)
#[cfg(feature = "cloudflare")]
pub use providers::CloudflareProvider;

#[cfg(feature = "memory")]
pub use providers::InMemoryProvider;
