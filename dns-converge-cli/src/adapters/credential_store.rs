//! JSON 文件凭证存储（只读）
//!
//! 文件格式见 [`parse_credentials`]。首次读取后缓存在内存中，
//! 同一次运行内不会重复读盘。

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dns_converge_core::error::{CoreError, CoreResult};
use dns_converge_core::traits::{CredentialStore, CredentialsMap};
use dns_converge_core::types::parse_credentials;

/// 从本地 JSON 文件读取凭证
pub struct JsonFileCredentialStore {
    path: PathBuf,
    cache: Arc<RwLock<Option<CredentialsMap>>>,
}

impl JsonFileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Arc::new(RwLock::new(None)),
        }
    }
}

#[async_trait]
impl CredentialStore for JsonFileCredentialStore {
    async fn load_all(&self) -> CoreResult<CredentialsMap> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::CredentialError(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let credentials = parse_credentials(&json)?;
        log::debug!(
            "Loaded {} provider instance(s) from {}",
            credentials.len(),
            self.path.display()
        );

        *self.cache.write().await = Some(credentials.clone());
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("dnsconverge-{}-{name}", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn loads_and_caches() {
        let path = temp_file("creds.json", r#"{"mem": {"type": "memory"}}"#);
        let store = JsonFileCredentialStore::new(&path);

        let first = store.load_all().await.unwrap();
        assert!(first.contains_key("mem"));

        // 缓存命中后不再读盘
        std::fs::remove_file(&path).unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);
        assert!(store.get("mem").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_file_is_credential_error() {
        let store = JsonFileCredentialStore::new("/nonexistent/dnsconverge/creds.json");
        let res = store.load_all().await;
        assert!(matches!(res, Err(CoreError::CredentialError(_))));
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let path = temp_file("bad.json", r#"{"mem": {"type": "memory", "api_key": "x"}}"#);
        let res = JsonFileCredentialStore::new(&path).load_all().await;
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(CoreError::CredentialValidation(_))));
    }
}
