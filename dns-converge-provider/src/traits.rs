use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::audit::{self, AuditError};
use crate::correction::Correction;
use crate::diff::{ChangeSet, Differ};
use crate::domain::DomainConfig;
use crate::error::{ProviderError, Result};
use crate::record::Record;
use crate::types::{ProviderCapabilities, ProviderMetadata};

/// 原始 API 错误（内部使用）
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// 错误码（各 Provider 格式不同）
    pub code: Option<String>,
    /// 原始错误消息
    pub message: String,
}

impl RawApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// 错误上下文信息（内部使用）
/// 用于在映射错误时提供额外信息
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorContext {
    /// 记录名称（用于 `RecordExists` 等错误）
    pub record_name: Option<String>,
    /// 记录 ID（用于 `RecordNotFound` 等错误）
    pub record_id: Option<String>,
    /// Zone 名称（用于 `ZoneNotFound` 等错误）
    pub zone: Option<String>,
}

/// Provider 错误映射 Trait（内部使用）
/// 各 Provider 实现此 trait 以将原始 API 错误映射到统一错误类型
pub(crate) trait ProviderErrorMapper {
    /// 返回 Provider 标识符
    fn provider_name(&self) -> &'static str;

    /// 将原始 API 错误映射到统一错误类型
    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError;

    /// 快捷方法：解析错误
    fn parse_error(&self, detail: impl ToString) -> ProviderError {
        ProviderError::ParseError {
            provider: self.provider_name().to_string(),
            detail: detail.to_string(),
        }
    }

    /// 快捷方法：未知错误（fallback）
    fn unknown_error(&self, raw: RawApiError) -> ProviderError {
        ProviderError::Unknown {
            provider: self.provider_name().to_string(),
            raw_code: raw.code,
            raw_message: raw.message,
        }
    }
}

/// DNS 提供商 Trait
///
/// 一个 adapter 值持有其全部状态（HTTP client、rate limiter、缓存）。
/// 所有对外请求都接受 `CancellationToken`。
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// 提供商标识符
    fn id(&self) -> &'static str;

    /// 获取 Provider 元数据（类型级别）
    ///
    /// 此方法不需要实例，可以在创建 Provider 之前调用。
    fn metadata() -> ProviderMetadata
    where
        Self: Sized;

    /// 该实例的能力声明
    fn capabilities(&self) -> ProviderCapabilities;

    /// 将 TTL 归一化为服务端实际存储的值（默认不变）
    fn normalize_ttl(&self, ttl: u32) -> u32 {
        ttl
    }

    /// 注册商侧使用的 NS 列表；默认返回空
    async fn get_nameservers(&self, _domain: &str, _cancel: &CancellationToken) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// 获取 zone 的全部现有记录（分页、重试、限流均在内部处理）
    async fn get_zone_records(
        &self,
        domain: &str,
        meta: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>>;

    /// 规划：计算差异并转换为有序的 corrections，不修改任何状态
    ///
    /// 返回 corrections 与结构性变更数量。
    fn get_zone_records_corrections(
        &self,
        dc: &DomainConfig,
        existing: &[Record],
    ) -> Result<(Vec<Correction>, usize)>;

    /// 幂等地创建 zone；不支持时返回 `Unimplemented`
    async fn ensure_zone_exists(
        &self,
        _domain: &str,
        _meta: &BTreeMap<String, String>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(ProviderError::Unimplemented {
            provider: self.id().to_string(),
            operation: "ensure_zone_exists".to_string(),
        })
    }

    /// 列出账号下的 zone；不支持时返回 `Unimplemented`
    async fn list_zones(&self, _cancel: &CancellationToken) -> Result<Vec<String>> {
        Err(ProviderError::Unimplemented {
            provider: self.id().to_string(),
            operation: "list_zones".to_string(),
        })
    }

    /// 预检：返回无法在该 provider 表示的记录
    fn audit_records(&self, records: &[Record]) -> Vec<AuditError> {
        audit::audit_records(&self.capabilities(), records)
    }

    /// 以该 provider 的比较规则运行 differ
    fn compute_changes(&self, dc: &DomainConfig, existing: &[Record]) -> Result<ChangeSet> {
        let caps = self.capabilities();
        let keys: Vec<&str> = caps.compared_metadata.iter().map(String::as_str).collect();
        Differ::new(dc)
            .with_metadata_keys(&keys)
            .diff(existing)
            .map_err(|e| e.into_provider_error(self.id()))
    }
}
