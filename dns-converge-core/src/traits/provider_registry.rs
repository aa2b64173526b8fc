//! Provider registry abstract Trait

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use dns_converge_provider::DnsProvider;

/// Provider Registry Trait
///
/// Holds one adapter value per configured provider instance for the duration
/// of a run, indexed by the instance name used in the credentials file.
/// Every zone pushed to the same instance shares that adapter (and its rate
/// limiter).
#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    /// Register a Provider instance
    ///
    /// # Arguments
    /// * `name` - Instance name
    /// * `provider` - Provider instance
    async fn register(&self, name: String, provider: Arc<dyn DnsProvider>);

    /// Get Provider instance
    async fn get(&self, name: &str) -> Option<Arc<dyn DnsProvider>>;

    /// List all registered instance names, sorted
    async fn list_names(&self) -> Vec<String>;
}

/// In-memory Provider registry
///
/// Default implementation, available on all platforms.
#[derive(Clone)]
pub struct InMemoryProviderRegistry {
    providers: Arc<RwLock<HashMap<String, Arc<dyn DnsProvider>>>>,
}

impl InMemoryProviderRegistry {
    /// Create a new memory registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderRegistry for InMemoryProviderRegistry {
    async fn register(&self, name: String, provider: Arc<dyn DnsProvider>) {
        self.providers.write().await.insert(name, provider);
    }

    async fn get(&self, name: &str) -> Option<Arc<dyn DnsProvider>> {
        self.providers.read().await.get(name).cloned()
    }

    async fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
