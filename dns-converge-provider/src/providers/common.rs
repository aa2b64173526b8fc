//! Provider 公共工具函数

use std::time::Duration;

use reqwest::Client;

use crate::error::{ProviderError, Result};

/// 默认连接超时（秒）
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// 默认请求超时（秒）
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// 创建带超时配置的 HTTP Client
pub fn create_http_client(provider: &str) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| ProviderError::NetworkError {
            provider: provider.to_string(),
            detail: format!("failed to create HTTP client: {e}"),
        })
}

/// 去掉域名末尾的点并转为小写
pub fn normalize_zone_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}
