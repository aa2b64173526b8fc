//! 端到端：JSON 配置 + JSON 凭证 → 内存 provider 上的完整同步

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dns_converge_core::traits::CredentialsMap;
use dns_converge_core::types::{
    DesiredConfig, EXIT_INVALID, EXIT_OK, ReconcileOptions, ZoneStatus, parse_credentials,
};
use dns_converge_core::{
    CoreResult, CredentialStore, InMemoryProviderRegistry, ReconcileService, ServiceContext,
    ZoneService,
};
use dns_converge_provider::RecordType;

const CREDENTIALS: &str = r#"{
    "mem": { "type": "memory", "granularity": "per_group" }
}"#;

const CONFIG: &str = r#"{
    "defaultTtl": 600,
    "domains": [{
        "name": "Example.COM.",
        "providers": ["mem"],
        "records": [
            { "name": "@", "type": "A", "value": "192.0.2.1" },
            { "name": "@", "type": "MX", "ttl": 3600, "value": "10 mail" },
            { "name": "@", "type": "TXT", "value": "\"v=spf1 mx -all\"" },
            { "name": "www", "type": "CNAME", "value": "@" },
            { "name": "_sip._tcp", "type": "SRV", "value": "10 60 5060 sip.example.com." }
        ]
    }]
}"#;

struct StaticCredentialStore(String);

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn load_all(&self) -> CoreResult<CredentialsMap> {
        parse_credentials(&self.0)
    }
}

async fn context() -> Arc<ServiceContext> {
    let ctx = Arc::new(ServiceContext::new(
        Arc::new(StaticCredentialStore(CREDENTIALS.to_string())),
        Arc::new(InMemoryProviderRegistry::new()),
    ));
    let restored = ctx.restore_providers().await;
    assert!(restored.is_ok());
    ctx
}

#[tokio::test]
async fn push_then_preview_is_empty() {
    let ctx = context().await;
    let cancel = CancellationToken::new();
    let configs = DesiredConfig::from_json(CONFIG)
        .and_then(|c| c.to_domain_configs())
        .unwrap();
    let service = ReconcileService::new(Arc::clone(&ctx));

    let opts = ReconcileOptions::push().with_create_domains(true);
    let report = service.run(&configs, &opts, &cancel).await.unwrap();
    assert_eq!(report.exit_code(), EXIT_OK);
    let zone = &report.zones[0];
    assert_eq!(zone.zone, "example.com");
    assert_eq!(zone.change_count, 5);
    // per_group：每个 RRSet 一条 correction
    assert_eq!(zone.applied(), 5);

    let again = service
        .run(&configs, &ReconcileOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(again.change_count(), 0);
    assert_eq!(again.zones[0].status, ZoneStatus::Ok);

    let zones = ZoneService::new(ctx)
        .get_zones(&configs, None, &cancel)
        .await
        .unwrap();
    assert!(zones[0].is_ok());
    let Ok(snap) = &zones[0] else { return };
    assert_eq!(snap.records.len(), 5);
    let mx = snap
        .records
        .iter()
        .find(|r| r.record_type() == RecordType::Mx);
    assert!(mx.is_some_and(|r| r.to_string() == "example.com 3600 IN MX 10 mail.example.com."));
    assert!(
        snap.records
            .iter()
            .filter(|r| r.record_type() != RecordType::Mx)
            .all(|r| r.to_string().contains(" 600 IN "))
    );
}

#[tokio::test]
async fn unknown_domain_filter_is_rejected() {
    let ctx = context().await;
    let configs = DesiredConfig::from_json(CONFIG)
        .and_then(|c| c.to_domain_configs())
        .unwrap();
    let opts = ReconcileOptions::default().with_domains(vec!["other.test".to_string()]);
    let res = ReconcileService::new(ctx)
        .run(&configs, &opts, &CancellationToken::new())
        .await;
    assert!(res.is_err_and(|e| e.is_validation()));
}

#[tokio::test]
async fn invalid_inputs_are_reported() {
    let ctx = context().await;
    let config = r#"{
        "domains": [{
            "name": "bad.test",
            "providers": ["mem"],
            "records": [{ "name": "@", "type": "A", "value": "not-an-address" }]
        }]
    }"#;
    let parsed = DesiredConfig::from_json(config).and_then(|c| c.to_domain_configs());
    assert!(parsed.is_err_and(|e| e.is_validation()));

    // 配置本身合法，但 zone 不存在且未开启 create_domains
    let config = r#"{
        "domains": [{ "name": "absent.test", "providers": ["mem", "ghost"] }]
    }"#;
    let configs = DesiredConfig::from_json(config)
        .and_then(|c| c.to_domain_configs())
        .unwrap();
    let report = ReconcileService::new(ctx)
        .run(&configs, &ReconcileOptions::push(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.zones.len(), 2);
    assert_eq!(report.zones[0].provider, "ghost");
    assert_eq!(report.zones[0].status, ZoneStatus::Invalid);
    assert_eq!(report.zones[1].status, ZoneStatus::Failed);
    assert_eq!(report.exit_code(), EXIT_INVALID);
}
