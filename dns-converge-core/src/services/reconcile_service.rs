//! 同步驱动：审计 → IDN 转换 → 建 zone → 读取 → 计划 → 应用
//!
//! 不同 zone 并发处理（上限由 `ReconcileOptions::concurrency` 控制），
//! 同一 zone 的 correction 严格按 provider 给出的顺序串行执行。

use std::sync::Arc;

use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

use dns_converge_provider::record::normalize_records;
use dns_converge_provider::{
    ApexNsPolicy, Correction, Differ, DnsProvider, DomainConfig, ErrorKind, Record, RecordType,
};

use crate::error::{CoreError, CoreResult, ZoneError};
use crate::services::{ServiceContext, zone_jobs};
use crate::types::{
    CorrectionOutcome, CorrectionStatus, ReconcileOptions, RunMode, RunReport, ZoneReport,
};
use crate::utils::idn;

fn is_apex_ns(r: &Record) -> bool {
    r.record_type() == RecordType::Ns && r.label() == "@"
}

/// 按 provider 能力准备期望状态：IDN、apex NS 策略、TTL 规范化、审计。
///
/// 返回 `(期望状态, 因 WarnAndSkip 被丢弃的 apex NS 记录)`。
fn prepare_desired(
    provider: &Arc<dyn DnsProvider>,
    dc: &DomainConfig,
) -> CoreResult<(DomainConfig, Vec<Record>)> {
    let caps = provider.capabilities();
    let mut desired = dc.clone();

    let origin = idn::to_ascii(&dc.name)?;
    idn::punycode_records(&mut desired.records, &origin)?;
    desired.name = origin;

    let (apex_ns, mut records): (Vec<Record>, Vec<Record>) = std::mem::take(&mut desired.records)
        .into_iter()
        .partition(is_apex_ns);
    let skipped = match caps.apex_ns_policy {
        ApexNsPolicy::Manage => {
            records.extend(apex_ns);
            Vec::new()
        }
        ApexNsPolicy::WarnAndSkip => {
            for r in &apex_ns {
                log::warn!(
                    "[{}] {} manages apex NS itself, skipping {r}",
                    desired.name,
                    provider.id()
                );
            }
            apex_ns
        }
        ApexNsPolicy::Reject => {
            if !apex_ns.is_empty() {
                let list: Vec<String> = apex_ns.iter().map(ToString::to_string).collect();
                return Err(CoreError::ValidationError(format!(
                    "{} does not accept apex NS records: {}",
                    provider.id(),
                    list.join(", ")
                )));
            }
            Vec::new()
        }
    };

    let hook_provider = Arc::clone(provider);
    let opts = desired
        .normalize_options()
        .with_ttl_hook(Arc::new(move |ttl| hook_provider.normalize_ttl(ttl)));
    desired.records = normalize_records(records, &opts);

    // 忽略规则在任何 provider 调用之前检查（create-domains 会先建 zone）
    Differ::new(&desired).check_ignored()?;

    let errors = provider.audit_records(&desired.records);
    if !errors.is_empty() {
        return Err(CoreError::AuditFailed(errors));
    }
    Ok((desired, skipped))
}

/// 同步服务
pub struct ReconcileService {
    ctx: Arc<ServiceContext>,
}

impl ReconcileService {
    /// 创建同步服务实例
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// 对配置中的全部 `(zone, provider)` 组合运行一次
    pub async fn run(
        &self,
        configs: &[DomainConfig],
        opts: &ReconcileOptions,
        cancel: &CancellationToken,
    ) -> CoreResult<RunReport> {
        let jobs = zone_jobs(configs, opts.domains.as_deref())?;
        let mut report = RunReport::new(opts.mode);
        log::info!(
            "Run {}: {} zone/provider pair(s), mode {:?}, concurrency {}",
            report.run_id,
            jobs.len(),
            opts.mode,
            opts.concurrency
        );

        let zones: Vec<ZoneReport> = stream::iter(jobs)
            .map(|(dc, provider)| async move {
                self.reconcile_zone(&dc, &provider, opts, cancel).await
            })
            .buffer_unordered(opts.concurrency.max(1))
            .collect()
            .await;

        report.finish(zones);
        log::info!(
            "Run {} finished: {} change(s), exit code {}",
            report.run_id,
            report.change_count(),
            report.exit_code()
        );
        Ok(report)
    }

    /// 处理单个 zone；zone 级错误写入报告而不是向上返回
    pub async fn reconcile_zone(
        &self,
        dc: &DomainConfig,
        provider_name: &str,
        opts: &ReconcileOptions,
        cancel: &CancellationToken,
    ) -> ZoneReport {
        let mut report = ZoneReport::new(&dc.name, provider_name);
        if let Err(e) = self
            .run_zone(dc, provider_name, opts, cancel, &mut report)
            .await
        {
            let err = ZoneError::new(&dc.name, provider_name, e);
            if err.source.is_expected() {
                log::warn!("{err}");
            } else {
                log::error!("{err}");
            }
            report.fail(&err);
        }
        report.finish();
        report
    }

    async fn run_zone(
        &self,
        dc: &DomainConfig,
        provider_name: &str,
        opts: &ReconcileOptions,
        cancel: &CancellationToken,
        report: &mut ZoneReport,
    ) -> CoreResult<()> {
        let provider = self.ctx.get_provider(provider_name).await?;
        let (desired, skipped) = prepare_desired(&provider, dc)?;
        for r in skipped {
            report.corrections.push(CorrectionOutcome::new(
                format!("SKIP apex NS {r}"),
                CorrectionStatus::Skipped,
                false,
            ));
        }

        if opts.create_domains {
            if !provider.capabilities().can_create_zones {
                return Err(CoreError::ValidationError(format!(
                    "{} cannot create zones",
                    provider.id()
                )));
            }
            provider
                .ensure_zone_exists(&desired.name, &desired.metadata, cancel)
                .await?;
        }

        let existing = fetch_existing(provider.as_ref(), &desired, cancel).await?;
        let (corrections, count) = provider.get_zone_records_corrections(&desired, &existing)?;
        report.change_count = count;
        log::info!(
            "[{} @ {provider_name}] {count} change(s), {} correction(s)",
            desired.name,
            corrections.len()
        );

        match opts.mode {
            RunMode::Preview => {
                for c in corrections {
                    log::info!("[{}] {}", desired.name, c.message);
                    let status = if c.is_informational() {
                        CorrectionStatus::Skipped
                    } else {
                        CorrectionStatus::Planned
                    };
                    report
                        .corrections
                        .push(CorrectionOutcome::new(c.message, status, c.retryable));
                }
            }
            RunMode::Push => {
                apply_corrections(&desired.name, corrections, opts, cancel, report).await;
            }
        }
        Ok(())
    }
}

async fn fetch_existing(
    provider: &dyn DnsProvider,
    desired: &DomainConfig,
    cancel: &CancellationToken,
) -> CoreResult<Vec<Record>> {
    let mut existing = provider
        .get_zone_records(&desired.name, &desired.metadata, cancel)
        .await?;
    idn::punycode_records(&mut existing, &desired.name)?;
    if provider.capabilities().apex_ns_policy != ApexNsPolicy::Manage {
        existing.retain(|r| !is_apex_ns(r));
    }
    Ok(existing)
}

/// 串行应用；每条 correction 最多执行一次
async fn apply_corrections(
    zone: &str,
    corrections: Vec<Correction>,
    opts: &ReconcileOptions,
    cancel: &CancellationToken,
    report: &mut ZoneReport,
) {
    let mut halted = false;

    for c in corrections {
        if halted {
            report.corrections.push(CorrectionOutcome::new(
                c.message,
                CorrectionStatus::Skipped,
                c.retryable,
            ));
            continue;
        }
        if c.is_informational() {
            report.corrections.push(CorrectionOutcome::new(
                c.message,
                CorrectionStatus::Skipped,
                c.retryable,
            ));
            continue;
        }

        let message = c.message.clone();
        let retryable = c.retryable;
        if cancel.is_cancelled() {
            log::warn!("[{zone}] cancelled before: {message}");
            report.corrections.push(CorrectionOutcome::new(
                message,
                CorrectionStatus::Cancelled,
                retryable,
            ));
            halted = true;
            continue;
        }

        match c.apply(cancel.clone()).await {
            Ok(()) => {
                log::info!("[{zone}] {message}");
                report.corrections.push(CorrectionOutcome::new(
                    message,
                    CorrectionStatus::Applied,
                    retryable,
                ));
            }
            Err(e) if e.kind() == ErrorKind::Cancelled => {
                log::warn!("[{zone}] cancelled: {message}");
                report.corrections.push(
                    CorrectionOutcome::new(message, CorrectionStatus::Cancelled, retryable)
                        .with_error(e.to_string()),
                );
                halted = true;
            }
            Err(e) => {
                if e.is_expected() {
                    log::warn!("[{zone}] failed: {message}: {e}");
                } else {
                    log::error!("[{zone}] failed: {message}: {e}");
                }
                report.corrections.push(
                    CorrectionOutcome::new(message, CorrectionStatus::Failed, retryable)
                        .with_error(e.to_string()),
                );
                if !opts.continue_on_error {
                    halted = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockProvider, create_test_context, rec};
    use crate::types::{EXIT_INVALID, EXIT_OK, EXIT_ZONE_FAILED, ZoneStatus};

    const ZONE: &str = "example.com";

    fn desired(records: Vec<Record>) -> DomainConfig {
        let mut dc = DomainConfig::new(ZONE).with_records(records);
        dc.providers = vec!["mock".to_string()];
        dc
    }

    /// 3 个独立变更：删除 old、修改 www、新建 api
    async fn setup(provider: MockProvider) -> (ReconcileService, Arc<MockProvider>, DomainConfig) {
        let provider = Arc::new(provider);
        provider
            .seed(
                ZONE,
                vec![
                    rec("old", RecordType::A, 300, "192.0.2.1"),
                    rec("www", RecordType::A, 300, "192.0.2.2"),
                ],
            )
            .await;
        let (ctx, _store) = create_test_context();
        ctx.provider_registry
            .register("mock".to_string(), Arc::clone(&provider) as Arc<dyn DnsProvider>)
            .await;
        let dc = desired(vec![
            rec("www", RecordType::A, 600, "192.0.2.2"),
            rec("api", RecordType::A, 300, "192.0.2.3"),
        ]);
        (ReconcileService::new(ctx), provider, dc)
    }

    #[tokio::test]
    async fn preview_plans_without_mutation() {
        let (service, provider, dc) = setup(MockProvider::new()).await;
        let report = service
            .run(&[dc], &ReconcileOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.exit_code(), EXIT_OK);
        let zone = &report.zones[0];
        assert_eq!(zone.change_count, 3);
        assert_eq!(zone.planned(), 3);
        assert!(provider.attempts().is_empty());
        assert_eq!(provider.snapshot(ZONE).await.map(|r| r.len()), Some(2));
    }

    #[tokio::test]
    async fn push_converges_and_second_run_is_empty() {
        let (service, provider, dc) = setup(MockProvider::new()).await;
        let cancel = CancellationToken::new();
        let report = service
            .run(std::slice::from_ref(&dc), &ReconcileOptions::push(), &cancel)
            .await
            .unwrap();
        assert_eq!(report.exit_code(), EXIT_OK);
        assert_eq!(report.zones[0].applied(), 3);
        assert_eq!(provider.attempts().len(), 3);

        let again = service
            .run(&[dc], &ReconcileOptions::push(), &cancel)
            .await
            .unwrap();
        assert_eq!(again.change_count(), 0);
        assert!(again.zones[0].corrections.is_empty());
    }

    #[tokio::test]
    async fn failing_correction_does_not_block_the_rest() {
        let (service, provider, dc) = setup(MockProvider::new().with_failure("DELETE")).await;
        let report = service
            .run(&[dc], &ReconcileOptions::push(), &CancellationToken::new())
            .await
            .unwrap();

        let zone = &report.zones[0];
        assert_eq!(zone.status, ZoneStatus::Failed);
        assert_eq!((zone.applied(), zone.failed(), zone.skipped()), (2, 1, 0));
        assert_eq!(report.exit_code(), EXIT_ZONE_FAILED);
        // 每条 correction 只尝试一次
        assert_eq!(provider.attempts().len(), 3);
    }

    #[tokio::test]
    async fn abort_on_error_skips_the_rest() {
        let (service, provider, dc) = setup(MockProvider::new().with_failure("DELETE")).await;
        let opts = ReconcileOptions::push().with_continue_on_error(false);
        let report = service
            .run(&[dc], &opts, &CancellationToken::new())
            .await
            .unwrap();

        let zone = &report.zones[0];
        assert_eq!((zone.applied(), zone.failed(), zone.skipped()), (0, 1, 2));
        assert_eq!(provider.attempts().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_the_zone() {
        let (service, provider, dc) = setup(MockProvider::new()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = service
            .run(&[dc], &ReconcileOptions::push(), &cancel)
            .await
            .unwrap();

        let zone = &report.zones[0];
        assert_eq!((zone.cancelled(), zone.skipped()), (1, 2));
        assert_eq!(zone.status, ZoneStatus::Failed);
        assert!(provider.attempts().is_empty());
    }

    #[tokio::test]
    async fn audit_failure_is_invalid() {
        let (service, provider, _) = setup(
            MockProvider::new().with_supported_types(vec![RecordType::A, RecordType::Aaaa]),
        )
        .await;
        let dc = desired(vec![rec("@", RecordType::Txt, 300, "hello")]);
        let report = service
            .run(&[dc], &ReconcileOptions::push(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.zones[0].status, ZoneStatus::Invalid);
        assert_eq!(report.zones[0].error_kind, Some(ErrorKind::Validation));
        assert_eq!(report.exit_code(), EXIT_INVALID);
        assert!(provider.attempts().is_empty());
    }

    #[tokio::test]
    async fn ignored_name_modification_is_invalid() {
        let (service, _provider, dc) = setup(MockProvider::new()).await;
        let dc = dc.with_ignored_names(["api"]);
        let report = service
            .run(&[dc], &ReconcileOptions::push(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.zones[0].status, ZoneStatus::Invalid);
    }

    #[tokio::test]
    async fn apex_ns_policies() {
        let ns = || rec("@", RecordType::Ns, 3600, "ns1.example.net.");

        // WarnAndSkip: 双方的 apex NS 都被忽略
        let (service, provider, _) =
            setup(MockProvider::new().with_apex_ns_policy(ApexNsPolicy::WarnAndSkip)).await;
        let mut seeded = provider.snapshot(ZONE).await.unwrap_or_default();
        seeded.push(rec("@", RecordType::Ns, 3600, "ns.provider.net."));
        provider.seed(ZONE, seeded.clone()).await;
        let dc = desired(vec![ns()]).with_keep_unknown(false);
        let report = service
            .run(&[dc.clone()], &ReconcileOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        let zone = &report.zones[0];
        assert_eq!(zone.status, ZoneStatus::Ok);
        // old + www 被删除；provider 的 NS 不动
        assert_eq!(zone.change_count, 2);
        assert_eq!(zone.skipped(), 1);

        // Reject: 期望状态中出现 apex NS 即失败
        let (service, _, _) =
            setup(MockProvider::new().with_apex_ns_policy(ApexNsPolicy::Reject)).await;
        let report = service
            .run(&[dc], &ReconcileOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.zones[0].status, ZoneStatus::Invalid);
    }

    #[tokio::test]
    async fn ttl_hook_is_applied_before_diff() {
        let (service, _provider, _) = setup(MockProvider::new().with_min_ttl(600)).await;
        let dc = desired(vec![
            rec("old", RecordType::A, 300, "192.0.2.1"),
            rec("www", RecordType::A, 300, "192.0.2.2"),
        ]);
        let report = service
            .run(&[dc], &ReconcileOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        // 期望的 300 被提升为 600，现有记录仍是 300
        assert_eq!(report.zones[0].change_count, 2);

        let (service, provider, _) = setup(MockProvider::new().with_min_ttl(60)).await;
        let dc = desired(vec![
            rec("old", RecordType::A, 30, "192.0.2.1"),
            rec("www", RecordType::A, 300, "192.0.2.2"),
        ]);
        provider
            .seed(
                ZONE,
                vec![
                    rec("old", RecordType::A, 60, "192.0.2.1"),
                    rec("www", RecordType::A, 300, "192.0.2.2"),
                ],
            )
            .await;
        let report = service
            .run(&[dc], &ReconcileOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.zones[0].change_count, 0);
    }

    #[tokio::test]
    async fn missing_zone_fails_unless_created() {
        let (service, provider, _) = setup(MockProvider::new()).await;
        let mut dc = DomainConfig::new("new.test").with_records(vec![
            Record::parse("@", "new.test", 300, RecordType::A, "192.0.2.9").unwrap(),
        ]);
        dc.providers = vec!["mock".to_string()];

        let report = service
            .run(std::slice::from_ref(&dc), &ReconcileOptions::push(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.zones[0].status, ZoneStatus::Failed);
        assert_eq!(report.zones[0].error_kind, Some(ErrorKind::NotFound));

        let opts = ReconcileOptions::push().with_create_domains(true);
        let report = service
            .run(&[dc], &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.zones[0].status, ZoneStatus::Ok);
        assert_eq!(provider.snapshot("new.test").await.map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn ignored_name_is_rejected_before_zone_creation() {
        let (service, provider, _) = setup(MockProvider::new()).await;
        let mut dc = DomainConfig::new("new.test")
            .with_records(vec![
                Record::parse("api", "new.test", 300, RecordType::A, "192.0.2.9").unwrap(),
            ])
            .with_ignored_names(["api"]);
        dc.providers = vec!["mock".to_string()];

        let opts = ReconcileOptions::push().with_create_domains(true);
        let report = service
            .run(&[dc], &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.zones[0].status, ZoneStatus::Invalid);
        assert_eq!(report.exit_code(), EXIT_INVALID);
        assert!(provider.snapshot("new.test").await.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_fails_only_that_zone() {
        let (service, _, dc) = setup(MockProvider::new().with_fetch_error(
            dns_converge_provider::ProviderError::Timeout {
                provider: "mock".to_string(),
                detail: "30s".to_string(),
            },
        ))
        .await;
        let report = service
            .run(&[dc], &ReconcileOptions::push(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.zones[0].status, ZoneStatus::Failed);
        assert_eq!(report.zones[0].error_kind, Some(ErrorKind::Transport));
        assert_eq!(report.exit_code(), EXIT_ZONE_FAILED);
    }

    #[tokio::test]
    async fn unknown_provider_is_invalid() {
        let (service, _, mut dc) = setup(MockProvider::new()).await;
        dc.providers = vec!["nope".to_string()];
        let report = service
            .run(&[dc], &ReconcileOptions::push(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.zones[0].status, ZoneStatus::Invalid);
        assert_eq!(report.zones[0].provider, "nope");
    }

    #[tokio::test]
    async fn zones_run_concurrently_and_report_sorted() {
        let (service, provider, _) = setup(MockProvider::new()).await;
        let mut configs = Vec::new();
        for name in ["c.test", "a.test", "b.test"] {
            provider.seed(name, Vec::new()).await;
            let mut dc = DomainConfig::new(name).with_records(vec![
                Record::parse("@", name, 300, RecordType::A, "192.0.2.1").unwrap(),
            ]);
            dc.providers = vec!["mock".to_string()];
            configs.push(dc);
        }
        let opts = ReconcileOptions::push().with_concurrency(2);
        let report = service
            .run(&configs, &opts, &CancellationToken::new())
            .await
            .unwrap();
        let names: Vec<&str> = report.zones.iter().map(|z| z.zone.as_str()).collect();
        assert_eq!(names, vec!["a.test", "b.test", "c.test"]);
        assert_eq!(report.change_count(), 3);
        assert_eq!(report.exit_code(), EXIT_OK);
    }
}
