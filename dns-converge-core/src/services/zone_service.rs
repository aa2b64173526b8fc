//! Zone 查询与创建服务（`get-zones` / `create-domains`）

use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use dns_converge_provider::record::{normalize_records, sort_records};
use dns_converge_provider::{DomainConfig, Record};

use crate::error::{CoreError, CoreResult, ZoneError};
use crate::services::{ServiceContext, zone_jobs};
use crate::types::{DEFAULT_CONCURRENCY, EXIT_INVALID, EXIT_OK, EXIT_ZONE_FAILED};
use crate::utils::idn;

/// 某个 provider 上一个 zone 的现有状态
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSnapshot {
    pub zone: String,
    pub provider: String,
    pub records: Vec<Record>,
}

impl ZoneSnapshot {
    /// 以 zone 文件格式渲染，每行一条记录
    pub fn to_zone_file(&self) -> String {
        let mut out = format!("; {} @ {}\n", self.zone, self.provider);
        for r in &self.records {
            out.push_str(&r.to_string());
            out.push('\n');
        }
        out
    }
}

/// 批量结果对应的退出码：校验错误优先于其他失败
pub fn batch_exit_code<T>(results: &[Result<T, ZoneError>]) -> u8 {
    let errors = results.iter().filter_map(|r| r.as_ref().err());
    let mut code = EXIT_OK;
    for e in errors {
        if e.source.is_validation() {
            return EXIT_INVALID;
        }
        code = EXIT_ZONE_FAILED;
    }
    code
}

/// Zone 服务
pub struct ZoneService {
    ctx: Arc<ServiceContext>,
    concurrency: usize,
}

impl ZoneService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 读取每个 `(zone, provider)` 的现有记录，规范化并排序
    pub async fn get_zones(
        &self,
        configs: &[DomainConfig],
        domains: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<Result<ZoneSnapshot, ZoneError>>> {
        let jobs = zone_jobs(configs, domains)?;
        let mut results: Vec<Result<ZoneSnapshot, ZoneError>> = stream::iter(jobs)
            .map(|(dc, provider)| async move {
                self.snapshot(&dc, &provider, cancel)
                    .await
                    .map_err(|e| log_zone_error(ZoneError::new(&dc.name, &provider, e)))
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|r| match r {
            Ok(s) => (s.zone.clone(), s.provider.clone()),
            Err(e) => (e.zone.clone(), e.provider.clone()),
        });
        Ok(results)
    }

    async fn snapshot(
        &self,
        dc: &DomainConfig,
        provider_name: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<ZoneSnapshot> {
        let provider = self.ctx.get_provider(provider_name).await?;
        let zone = idn::to_ascii(&dc.name)?;
        let mut records = provider
            .get_zone_records(&zone, &dc.metadata, cancel)
            .await?;
        idn::punycode_records(&mut records, &zone)?;
        let mut records = normalize_records(records, &dc.normalize_options());
        for r in &mut records {
            r.clear_original();
        }
        sort_records(&mut records);
        log::debug!("[{zone} @ {provider_name}] {} record(s)", records.len());
        Ok(ZoneSnapshot {
            zone,
            provider: provider_name.to_string(),
            records,
        })
    }

    /// 对每个 `(zone, provider)` 幂等地创建 zone
    pub async fn create_domains(
        &self,
        configs: &[DomainConfig],
        domains: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<Result<(String, String), ZoneError>>> {
        let jobs = zone_jobs(configs, domains)?;
        let mut results: Vec<Result<(String, String), ZoneError>> = stream::iter(jobs)
            .map(|(dc, provider)| async move {
                match self.ensure_zone(&dc, &provider, cancel).await {
                    Ok(zone) => Ok((zone, provider)),
                    Err(e) => Err(log_zone_error(ZoneError::new(&dc.name, &provider, e))),
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|r| match r {
            Ok(pair) => pair.clone(),
            Err(e) => (e.zone.clone(), e.provider.clone()),
        });
        Ok(results)
    }

    async fn ensure_zone(
        &self,
        dc: &DomainConfig,
        provider_name: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<String> {
        let provider = self.ctx.get_provider(provider_name).await?;
        if !provider.capabilities().can_create_zones {
            return Err(CoreError::ValidationError(format!(
                "{} cannot create zones",
                provider.id()
            )));
        }
        let zone = idn::to_ascii(&dc.name)?;
        provider
            .ensure_zone_exists(&zone, &dc.metadata, cancel)
            .await?;
        log::info!("[{zone} @ {provider_name}] zone exists");
        Ok(zone)
    }
}

fn log_zone_error(err: ZoneError) -> ZoneError {
    if err.source.is_expected() {
        log::warn!("{err}");
    } else {
        log::error!("{err}");
    }
    err
}
