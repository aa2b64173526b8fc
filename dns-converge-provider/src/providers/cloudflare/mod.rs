//! Cloudflare DNS Provider

mod convert;
mod error;
mod http;
mod provider;
mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::providers::common::create_http_client;
use crate::rate_limiter::RateLimiter;

pub(crate) use types::{
    CloudflareDnsRecord, CloudflareHandle, CloudflareRecordBody, CloudflareResponse, CloudflareZone,
};

pub(crate) const CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";
/// Cloudflare Zones API 单页最大记录数
pub(crate) const MAX_PAGE_SIZE_ZONES: u32 = 50;
/// Cloudflare DNS Records API 单页最大记录数
pub(crate) const MAX_PAGE_SIZE_RECORDS: u32 = 100;
/// 1200 requests / 5 minutes
const BASE_REQUEST_DELAY: Duration = Duration::from_millis(250);
/// 幂等请求的最大重试次数
pub(crate) const MAX_RETRIES: u32 = 3;

/// Cloudflare DNS Provider
///
/// Cheap to clone: clones share the HTTP client, the rate limiter and the
/// zone-id cache.
#[derive(Clone)]
pub struct CloudflareProvider {
    pub(crate) client: Client,
    pub(crate) api_token: String,
    pub(crate) account_id: Option<String>,
    pub(crate) base_url: String,
    pub(crate) limiter: Arc<RateLimiter>,
    /// zone name -> zone id
    pub(crate) zone_ids: Arc<RwLock<HashMap<String, String>>>,
}

impl CloudflareProvider {
    pub fn new(
        api_token: String,
        account_id: Option<String>,
        endpoint_url: Option<String>,
    ) -> Result<Self> {
        let base_url = endpoint_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| CF_API_BASE.to_string());
        Ok(Self {
            client: create_http_client("cloudflare")?,
            api_token,
            account_id,
            base_url,
            limiter: Arc::new(RateLimiter::new("cloudflare", BASE_REQUEST_DELAY)),
            zone_ids: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
