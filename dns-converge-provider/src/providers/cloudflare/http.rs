//! Cloudflare HTTP 请求方法

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, Result};
use crate::http_client::{HttpUtils, RequestInfo, clip_body};
use crate::providers::common::normalize_zone_name;
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};

use super::{
    CloudflareHandle, CloudflareProvider, CloudflareRecordBody, CloudflareResponse, CloudflareZone,
    MAX_PAGE_SIZE_ZONES, MAX_RETRIES,
};

impl CloudflareProvider {
    /// 执行一次 API 调用并检查 `success` 字段
    ///
    /// POST 不是幂等的，只有在请求确定未到达服务端时才会重试。
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        context: ErrorContext,
        cancel: &CancellationToken,
    ) -> Result<CloudflareResponse<T>> {
        let url = format!("{}{path}", self.base_url);
        let idempotent = method != Method::POST;

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_token);
        if let Some(body) = body {
            log::debug!(
                "[cloudflare] Request Body: {}",
                clip_body(&body.to_string())
            );
            builder = builder.json(body);
        }

        let info = RequestInfo {
            provider: self.provider_name(),
            method: method.as_str(),
            target: &url,
        };
        let (_status, text) = HttpUtils::execute_request_with_retry(
            builder,
            &self.limiter,
            cancel,
            info,
            MAX_RETRIES,
            idempotent,
        )
        .await?;

        let response: CloudflareResponse<T> = HttpUtils::parse_json(&text, self.provider_name())?;
        if !response.success {
            let raw = response.errors.first().map_or_else(
                || RawApiError::new("Unknown error"),
                |e| RawApiError::with_code(e.code.to_string(), e.message.clone()),
            );
            let err = self.map_error(raw, context);
            if let ProviderError::RateLimited { retry_after, .. } = &err {
                self.limiter.handle_rate_limited(*retry_after);
            }
            if err.is_expected() {
                log::warn!("{err}");
            } else {
                log::error!("{err}");
            }
            return Err(err);
        }
        Ok(response)
    }

    fn result_of<T>(&self, response: CloudflareResponse<T>) -> Result<T> {
        response
            .result
            .ok_or_else(|| self.parse_error("响应中缺少 result 字段"))
    }

    /// 读取全部分页
    pub(crate) async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        per_page: u32,
        context: &ErrorContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let response: CloudflareResponse<Vec<T>> = self
                .call(
                    Method::GET,
                    &format!("{path}{sep}page={page}&per_page={per_page}"),
                    None,
                    context.clone(),
                    cancel,
                )
                .await?;
            let (current, total_pages) = response
                .result_info
                .as_ref()
                .map_or((page, 1), |info| (info.page, info.total_pages));
            items.extend(response.result.unwrap_or_default());
            if current >= total_pages {
                break;
            }
            page = current + 1;
        }
        Ok(items)
    }

    /// 按名称查找 zone
    pub(crate) async fn find_zone(
        &self,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CloudflareZone>> {
        let domain = normalize_zone_name(domain);
        let context = ErrorContext {
            zone: Some(domain.clone()),
            ..ErrorContext::default()
        };
        let path = format!("/zones?name={}", urlencoding::encode(&domain));
        let zones: Vec<CloudflareZone> = self
            .get_all_pages(&path, MAX_PAGE_SIZE_ZONES, &context, cancel)
            .await?;
        Ok(zones
            .into_iter()
            .find(|z| z.name.eq_ignore_ascii_case(&domain)))
    }

    /// zone 名称 -> zone id（带缓存）
    pub(crate) async fn zone_id(&self, domain: &str, cancel: &CancellationToken) -> Result<String> {
        let domain = normalize_zone_name(domain);
        if let Some(id) = self.zone_ids.read().await.get(&domain) {
            return Ok(id.clone());
        }
        let zone = self
            .find_zone(&domain, cancel)
            .await?
            .ok_or_else(|| ProviderError::ZoneNotFound {
                provider: self.provider_name().to_string(),
                zone: domain.clone(),
                raw_message: None,
            })?;
        self.zone_ids.write().await.insert(domain, zone.id.clone());
        Ok(zone.id)
    }

    /// 创建 zone（需要 `account_id`）
    pub(crate) async fn create_zone(&self, domain: &str, cancel: &CancellationToken) -> Result<CloudflareZone> {
        let Some(account_id) = &self.account_id else {
            return Err(ProviderError::InvalidParameter {
                provider: self.provider_name().to_string(),
                param: "account_id".to_string(),
                detail: "creating zones requires an account_id credential".to_string(),
            });
        };
        let domain = normalize_zone_name(domain);
        let body = json!({
            "name": domain,
            "account": { "id": account_id },
            "type": "full",
        });
        let context = ErrorContext {
            zone: Some(domain.clone()),
            ..ErrorContext::default()
        };
        let response = self
            .call(Method::POST, "/zones", Some(&body), context, cancel)
            .await?;
        let zone: CloudflareZone = self.result_of(response)?;
        self.zone_ids.write().await.insert(domain, zone.id.clone());
        Ok(zone)
    }

    fn body_value(&self, body: &CloudflareRecordBody) -> Result<Value> {
        serde_json::to_value(body).map_err(|e| ProviderError::SerializationError {
            provider: self.provider_name().to_string(),
            detail: e.to_string(),
        })
    }

    pub(crate) async fn create_record(
        &self,
        zone_id: &str,
        body: &CloudflareRecordBody,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let value = self.body_value(body)?;
        let context = ErrorContext {
            record_name: Some(body.name.clone()),
            ..ErrorContext::default()
        };
        self.call::<Value>(
            Method::POST,
            &format!("/zones/{zone_id}/dns_records"),
            Some(&value),
            context,
            cancel,
        )
        .await?;
        Ok(())
    }

    /// 整体覆盖一条记录（PUT，幂等）
    pub(crate) async fn overwrite_record(
        &self,
        handle: &CloudflareHandle,
        body: &CloudflareRecordBody,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let value = self.body_value(body)?;
        let context = ErrorContext {
            record_name: Some(body.name.clone()),
            record_id: Some(handle.record_id.clone()),
            ..ErrorContext::default()
        };
        self.call::<Value>(
            Method::PUT,
            &format!("/zones/{}/dns_records/{}", handle.zone_id, handle.record_id),
            Some(&value),
            context,
            cancel,
        )
        .await?;
        Ok(())
    }

    /// 删除记录；记录已不存在时视为成功
    pub(crate) async fn delete_record(
        &self,
        handle: &CloudflareHandle,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let context = ErrorContext {
            record_id: Some(handle.record_id.clone()),
            ..ErrorContext::default()
        };
        let res = self
            .call::<Value>(
                Method::DELETE,
                &format!("/zones/{}/dns_records/{}", handle.zone_id, handle.record_id),
                None,
                context,
                cancel,
            )
            .await;
        match res {
            Ok(_) => Ok(()),
            Err(ProviderError::RecordNotFound { record_id, .. }) => {
                log::warn!("[cloudflare] Record {record_id} already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
