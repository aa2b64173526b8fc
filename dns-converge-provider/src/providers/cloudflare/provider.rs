//! Cloudflare DnsProvider trait 实现

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::audit::{self, AuditError};
use crate::correction::Correction;
use crate::domain::DomainConfig;
use crate::error::{ProviderError, Result};
use crate::providers::common::normalize_zone_name;
use crate::record::{Record, RecordType};
use crate::traits::{DnsProvider, ErrorContext, ProviderErrorMapper};
use crate::types::{
    ApexNsPolicy, CorrectionGranularity, FieldType, ProviderCapabilities, ProviderCredentialField,
    ProviderMetadata, ProviderType,
};

use super::convert::{PROXY_KEY, SUPPORTED_TYPES, is_proxiable};
use super::{
    CloudflareDnsRecord, CloudflareHandle, CloudflareProvider, CloudflareZone,
    MAX_PAGE_SIZE_RECORDS, MAX_PAGE_SIZE_ZONES,
};

/// TTL 1 means "automatic" at Cloudflare.
const AUTO_TTL: u32 = 1;
const MIN_TTL: u32 = 60;
const MAX_TTL: u32 = 86_400;

impl CloudflareProvider {
    fn static_capabilities() -> ProviderCapabilities {
        let mut supported_types = SUPPORTED_TYPES.to_vec();
        supported_types.push(RecordType::Svcb);
        ProviderCapabilities {
            supported_types,
            apex_ns_policy: ApexNsPolicy::WarnAndSkip,
            granularity: CorrectionGranularity::PerRecord,
            can_create_zones: true,
            can_list_zones: true,
            can_get_nameservers: true,
            allows_null_targets: false,
            wildcard_forbidden: Vec::new(),
            dnskey_apex_only: true,
            compared_metadata: vec![PROXY_KEY.to_string()],
        }
    }

    /// Fill in defaults the API applies on its side, so the diff compares
    /// against what Cloudflare actually stores.
    fn prepare_desired(dc: &DomainConfig) -> DomainConfig {
        let mut dc = dc.clone();
        for r in &mut dc.records {
            if !is_proxiable(r.record_type()) {
                continue;
            }
            let proxied = r
                .metadata
                .entry(PROXY_KEY.to_string())
                .or_insert_with(|| "off".to_string());
            // proxied records are always served with automatic TTL
            if *proxied == "on" {
                r.ttl = AUTO_TTL;
            }
        }
        dc
    }

    fn handle_of(&self, record: &Record) -> Result<CloudflareHandle> {
        record
            .original()
            .and_then(|h| h.downcast_ref::<CloudflareHandle>())
            .cloned()
            .ok_or_else(|| ProviderError::InvalidParameter {
                provider: self.provider_name().to_string(),
                param: "record".to_string(),
                detail: format!("{record} was not read from Cloudflare"),
            })
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    fn id(&self) -> &'static str {
        "cloudflare"
    }

    fn metadata() -> ProviderMetadata {
        ProviderMetadata {
            id: ProviderType::Cloudflare,
            name: "Cloudflare".to_string(),
            description: "Cloudflare DNS".to_string(),
            credential_fields: vec![
                ProviderCredentialField::new("api_token", "API Token", FieldType::Password, true)
                    .with_help("在 Cloudflare Dashboard -> My Profile -> API Tokens 创建，需要 Zone:DNS:Edit 权限"),
                ProviderCredentialField::new("account_id", "Account ID", FieldType::Text, false)
                    .with_help("仅在 create-domains 创建 zone 时需要"),
                ProviderCredentialField::new("endpoint_url", "API Endpoint", FieldType::Text, false),
            ],
            capabilities: Self::static_capabilities(),
        }
    }

    fn capabilities(&self) -> ProviderCapabilities {
        Self::static_capabilities()
    }

    fn normalize_ttl(&self, ttl: u32) -> u32 {
        match ttl {
            0 | AUTO_TTL => AUTO_TTL,
            t => t.clamp(MIN_TTL, MAX_TTL),
        }
    }

    async fn get_nameservers(&self, domain: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        let zone = self
            .find_zone(domain, cancel)
            .await?
            .ok_or_else(|| ProviderError::ZoneNotFound {
                provider: self.provider_name().to_string(),
                zone: normalize_zone_name(domain),
                raw_message: None,
            })?;
        Ok(zone.name_servers)
    }

    async fn get_zone_records(
        &self,
        domain: &str,
        _meta: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        let zone_name = normalize_zone_name(domain);
        let zone_id = self.zone_id(&zone_name, cancel).await?;
        let context = ErrorContext {
            zone: Some(zone_name.clone()),
            ..ErrorContext::default()
        };

        let raw: Vec<CloudflareDnsRecord> = self
            .get_all_pages(
                &format!("/zones/{zone_id}/dns_records"),
                MAX_PAGE_SIZE_RECORDS,
                &context,
                cancel,
            )
            .await?;

        let mut records = Vec::with_capacity(raw.len());
        for cf in raw {
            if let Some(record) = self.record_from_cf(cf, &zone_id, &zone_name)? {
                records.push(record);
            }
        }
        log::info!(
            "[cloudflare] Fetched {} records for {zone_name}",
            records.len()
        );
        Ok(records)
    }

    fn get_zone_records_corrections(
        &self,
        dc: &DomainConfig,
        existing: &[Record],
    ) -> Result<(Vec<Correction>, usize)> {
        let dc = Self::prepare_desired(dc);
        let changes = self.compute_changes(&dc, existing)?;
        let count = changes.change_count();
        let mut corrections = Vec::with_capacity(count);

        for c in &changes.delete {
            let Some(existing) = &c.existing else { continue };
            let handle = self.handle_of(existing)?;
            let this = self.clone();
            corrections.push(Correction::new(c.message.clone(), move |cancel| {
                async move { this.delete_record(&handle, &cancel).await }.boxed()
            }));
        }

        for c in &changes.modify {
            let (Some(existing), Some(desired)) = (&c.existing, &c.desired) else {
                continue;
            };
            let handle = self.handle_of(existing)?;
            let body = self.record_to_body(desired)?;
            let this = self.clone();
            corrections.push(Correction::new(c.message.clone(), move |cancel| {
                async move { this.overwrite_record(&handle, &body, &cancel).await }.boxed()
            }));
        }

        for c in &changes.create {
            let Some(desired) = &c.desired else { continue };
            let body = self.record_to_body(desired)?;
            let domain = dc.name.clone();
            let this = self.clone();
            let correction = Correction::new(c.message.clone(), move |cancel| {
                async move {
                    let zone_id = this.zone_id(&domain, &cancel).await?;
                    this.create_record(&zone_id, &body, &cancel).await
                }
                .boxed()
            });
            corrections.push(correction.non_retryable());
        }

        Ok((corrections, count))
    }

    async fn ensure_zone_exists(
        &self,
        domain: &str,
        _meta: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(zone) = self.find_zone(domain, cancel).await? {
            log::debug!("[cloudflare] Zone {} already exists ({})", zone.name, zone.id);
            self.zone_ids.write().await.insert(zone.name, zone.id);
            return Ok(());
        }
        let zone = self.create_zone(domain, cancel).await?;
        log::info!("[cloudflare] Created zone {} ({})", zone.name, zone.id);
        Ok(())
    }

    async fn list_zones(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let zones: Vec<CloudflareZone> = self
            .get_all_pages("/zones", MAX_PAGE_SIZE_ZONES, &ErrorContext::default(), cancel)
            .await?;
        Ok(zones.into_iter().map(|z| z.name).collect())
    }

    fn audit_records(&self, records: &[Record]) -> Vec<AuditError> {
        let mut errors = audit::audit_records(&self.capabilities(), records);
        for r in records {
            let Some(value) = r.metadata.get(PROXY_KEY) else { continue };
            if value != "on" && value != "off" {
                errors.push(AuditError {
                    record: r.to_string(),
                    reason: format!("{PROXY_KEY} must be \"on\" or \"off\", got \"{value}\""),
                });
            } else if value == "on" && !is_proxiable(r.record_type()) {
                errors.push(AuditError {
                    record: r.to_string(),
                    reason: format!("{} records cannot be proxied", r.record_type()),
                });
            }
        }
        errors
    }
}
