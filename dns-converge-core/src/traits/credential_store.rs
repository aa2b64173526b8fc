//! 凭证存储抽象 Trait

use async_trait::async_trait;
use dns_converge_provider::ProviderCredentials;
use std::collections::HashMap;

use crate::error::CoreResult;

/// 凭证映射类型：provider 实例名 -> ProviderCredentials（类型安全）
pub type CredentialsMap = HashMap<String, ProviderCredentials>;

/// 凭证存储 Trait
///
/// 平台实现:
/// - CLI: `JsonFileCredentialStore`（JSON 文件，只读）
/// - 测试: `MockCredentialStore`
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 加载所有凭证
    ///
    /// 运行开始时调用一次，用于构建全部 provider 实例。
    async fn load_all(&self) -> CoreResult<CredentialsMap>;

    /// 获取单个实例的凭证
    ///
    /// # Returns
    /// * `Ok(Some(credentials))` - 凭证存在
    /// * `Ok(None)` - 凭证不存在
    async fn get(&self, name: &str) -> CoreResult<Option<ProviderCredentials>> {
        Ok(self.load_all().await?.remove(name))
    }
}
