//! Provider factory functions and metadata.

use std::sync::Arc;

use crate::error::Result;
use crate::traits::DnsProvider;
use crate::types::{ProviderCredentials, ProviderMetadata};

#[cfg(feature = "cloudflare")]
use crate::providers::CloudflareProvider;
#[cfg(feature = "memory")]
use crate::providers::InMemoryProvider;

/// Creates a [`DnsProvider`] instance from the given credentials.
///
/// The concrete provider type is determined by the [`ProviderCredentials`] variant.
/// The returned provider is wrapped in `Arc<dyn DnsProvider>` so one adapter
/// value (and its rate limiter) can be shared by every zone of a run.
///
/// # Examples
///
/// ```rust,no_run
/// use dns_converge_provider::{create_provider, ProviderCredentials};
///
/// let provider = create_provider(ProviderCredentials::Cloudflare {
///     api_token: "your-token".to_string(),
///     account_id: None,
///     endpoint_url: None,
/// }).unwrap();
/// ```
pub fn create_provider(credentials: ProviderCredentials) -> Result<Arc<dyn DnsProvider>> {
    match credentials {
        #[cfg(feature = "cloudflare")]
        ProviderCredentials::Cloudflare {
            api_token,
            account_id,
            endpoint_url,
        } => Ok(Arc::new(CloudflareProvider::new(
            api_token,
            account_id,
            endpoint_url,
        )?)),
        #[cfg(feature = "memory")]
        ProviderCredentials::Memory { granularity } => {
            Ok(Arc::new(InMemoryProvider::new(granularity)))
        }
    }
}

/// Returns metadata for all providers enabled via feature flags.
pub fn get_all_provider_metadata() -> Vec<ProviderMetadata> {
    vec![
        #[cfg(feature = "cloudflare")]
        CloudflareProvider::metadata(),
        #[cfg(feature = "memory")]
        InMemoryProvider::metadata(),
    ]
}
