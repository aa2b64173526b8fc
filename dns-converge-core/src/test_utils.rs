//! 测试辅助模块
//!
//! 提供 mock 实现和便捷的测试工厂方法。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use dns_converge_provider::{
    ApexNsPolicy, Correction, CorrectionGranularity, DnsProvider, DomainConfig, InMemoryProvider,
    ProviderCapabilities, ProviderCredentials, ProviderError, ProviderMetadata, Record, RecordType,
    Result as ProviderResult,
};

use crate::error::CoreResult;
use crate::services::ServiceContext;
use crate::traits::{CredentialStore, CredentialsMap, InMemoryProviderRegistry};

/// `example.com` 下的一条记录
pub fn rec(label: &str, rtype: RecordType, ttl: u32, rdata: &str) -> Record {
    Record::parse(label, "example.com", ttl, rtype, rdata).unwrap()
}

pub fn memory_credentials() -> ProviderCredentials {
    ProviderCredentials::Memory {
        granularity: CorrectionGranularity::PerRecord,
    }
}

// ===== MockCredentialStore =====

#[derive(Default)]
pub struct MockCredentialStore {
    credentials: RwLock<HashMap<String, ProviderCredentials>>,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: &str, credentials: ProviderCredentials) {
        self.credentials
            .write()
            .await
            .insert(name.to_string(), credentials);
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn load_all(&self) -> CoreResult<CredentialsMap> {
        Ok(self.credentials.read().await.clone())
    }
}

// ===== MockProvider =====

/// 包装 `InMemoryProvider`，可脚本化能力、读取错误与 correction 失败。
///
/// 每次执行 correction 都会记录到 `attempts`。
pub struct MockProvider {
    inner: InMemoryProvider,
    caps: ProviderCapabilities,
    /// message 包含其中任一子串的 correction 返回 `Conflict`
    fail_on: Vec<String>,
    min_ttl: u32,
    fetch_error: Option<ProviderError>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        let inner = InMemoryProvider::new(CorrectionGranularity::PerRecord);
        let caps = inner.capabilities();
        Self {
            inner,
            caps,
            fail_on: Vec::new(),
            min_ttl: 0,
            fetch_error: None,
            attempts: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_failure(mut self, pattern: &str) -> Self {
        self.fail_on.push(pattern.to_string());
        self
    }

    #[must_use]
    pub fn with_supported_types(mut self, types: Vec<RecordType>) -> Self {
        self.caps.supported_types = types;
        self
    }

    #[must_use]
    pub fn with_apex_ns_policy(mut self, policy: ApexNsPolicy) -> Self {
        self.caps.apex_ns_policy = policy;
        self
    }

    #[must_use]
    pub fn with_min_ttl(mut self, min_ttl: u32) -> Self {
        self.min_ttl = min_ttl;
        self
    }

    #[must_use]
    pub fn with_fetch_error(mut self, err: ProviderError) -> Self {
        self.fetch_error = Some(err);
        self
    }

    #[must_use]
    pub fn without_zone_creation(mut self) -> Self {
        self.caps.can_create_zones = false;
        self
    }

    pub async fn seed(&self, zone: &str, records: Vec<Record>) {
        self.inner.seed(zone, records).await;
    }

    pub async fn snapshot(&self, zone: &str) -> Option<Vec<Record>> {
        self.inner.snapshot(zone).await
    }

    /// 已执行过的 correction message
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn wrap(&self, c: Correction) -> Correction {
        let retryable = c.retryable;
        let message = c.message.clone();
        let fail = self.fail_on.iter().any(|p| message.contains(p.as_str()));
        let attempts = Arc::clone(&self.attempts);

        let wrapped = Correction::new(message.clone(), move |cancel: CancellationToken| {
            async move {
                if let Ok(mut a) = attempts.lock() {
                    a.push(message.clone());
                }
                if fail {
                    return Err(ProviderError::Conflict {
                        provider: "mock".to_string(),
                        detail: format!("scripted failure: {message}"),
                    });
                }
                c.apply(cancel).await
            }
            .boxed()
        });
        if retryable {
            wrapped
        } else {
            wrapped.non_retryable()
        }
    }
}

#[async_trait]
impl DnsProvider for MockProvider {
    fn id(&self) -> &'static str {
        "mock"
    }

    fn metadata() -> ProviderMetadata {
        InMemoryProvider::metadata()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.caps.clone()
    }

    fn normalize_ttl(&self, ttl: u32) -> u32 {
        ttl.max(self.min_ttl)
    }

    async fn get_zone_records(
        &self,
        domain: &str,
        meta: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Record>> {
        if let Some(err) = &self.fetch_error {
            return Err(err.clone());
        }
        self.inner.get_zone_records(domain, meta, cancel).await
    }

    fn get_zone_records_corrections(
        &self,
        dc: &DomainConfig,
        existing: &[Record],
    ) -> ProviderResult<(Vec<Correction>, usize)> {
        let (corrections, count) = self.inner.get_zone_records_corrections(dc, existing)?;
        Ok((
            corrections.into_iter().map(|c| self.wrap(c)).collect(),
            count,
        ))
    }

    async fn ensure_zone_exists(
        &self,
        domain: &str,
        meta: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> ProviderResult<()> {
        self.inner.ensure_zone_exists(domain, meta, cancel).await
    }

    async fn list_zones(&self, cancel: &CancellationToken) -> ProviderResult<Vec<String>> {
        self.inner.list_zones(cancel).await
    }
}

// ===== 工厂方法 =====

/// 创建测试用 `ServiceContext`，返回 context 与其凭证存储
pub fn create_test_context() -> (Arc<ServiceContext>, Arc<MockCredentialStore>) {
    let store = Arc::new(MockCredentialStore::new());
    let ctx = Arc::new(ServiceContext::new(
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        Arc::new(InMemoryProviderRegistry::new()),
    ));
    (ctx, store)
}
