//! 业务逻辑服务层

mod reconcile_service;
mod zone_service;

pub use reconcile_service::ReconcileService;
pub use zone_service::{ZoneService, ZoneSnapshot, batch_exit_code};

use std::sync::Arc;

use dns_converge_provider::{DnsProvider, DomainConfig, create_provider};

use crate::error::{CoreError, CoreResult};
use crate::traits::{CredentialStore, ProviderRegistry};

/// 服务上下文 - 持有所有依赖
///
/// 平台层需要创建此上下文，并注入平台特定的存储实现。
pub struct ServiceContext {
    /// 凭证存储
    pub credential_store: Arc<dyn CredentialStore>,
    /// Provider 注册表
    pub provider_registry: Arc<dyn ProviderRegistry>,
}

impl ServiceContext {
    /// 创建服务上下文
    #[must_use]
    pub fn new(
        credential_store: Arc<dyn CredentialStore>,
        provider_registry: Arc<dyn ProviderRegistry>,
    ) -> Self {
        Self {
            credential_store,
            provider_registry,
        }
    }

    /// 从凭证存储构建全部 provider 实例并注册，返回实例数
    pub async fn restore_providers(&self) -> CoreResult<usize> {
        let credentials = self.credential_store.load_all().await?;
        let mut names: Vec<&String> = credentials.keys().collect();
        names.sort();

        for name in names {
            let creds = credentials[name].clone();
            let provider_type = creds.provider_type();
            let provider = create_provider(creds)?;
            log::debug!("Registered provider instance {name} ({provider_type})");
            self.provider_registry.register(name.clone(), provider).await;
        }
        Ok(credentials.len())
    }

    /// 获取 Provider 实例
    pub async fn get_provider(&self, name: &str) -> CoreResult<Arc<dyn DnsProvider>> {
        self.provider_registry
            .get(name)
            .await
            .ok_or_else(|| CoreError::ProviderNotFound(name.to_string()))
    }
}

/// 按 `--domains` 过滤后展开为 `(zone, provider 实例)` 组合
pub(crate) fn zone_jobs(
    configs: &[DomainConfig],
    filter: Option<&[String]>,
) -> CoreResult<Vec<(DomainConfig, String)>> {
    if let Some(filter) = filter {
        for wanted in filter {
            let wanted = wanted.trim_end_matches('.').to_lowercase();
            if !configs.iter().any(|dc| dc.name == wanted) {
                return Err(CoreError::DomainNotFound(wanted));
            }
        }
    }

    let selected = configs.iter().filter(|dc| {
        filter.is_none_or(|f| {
            f.iter()
                .any(|w| w.trim_end_matches('.').eq_ignore_ascii_case(&dc.name))
        })
    });

    Ok(selected
        .flat_map(|dc| dc.providers.iter().map(move |p| (dc.clone(), p.clone())))
        .collect())
}
