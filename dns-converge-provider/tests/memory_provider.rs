//! In-memory provider 端到端测试：读取 → 计划 → 应用 → 再计划

mod common;

use std::collections::BTreeMap;

use common::{ORIGIN, rec, rendered, zone};
use dns_converge_provider::{
    CorrectionGranularity, DnsProvider, InMemoryProvider, ProviderError, Record, RecordType,
};
use tokio_util::sync::CancellationToken;

fn existing_zone() -> Vec<Record> {
    vec![
        rec("@", RecordType::A, 300, "192.0.2.1"),
        rec("www", RecordType::A, 300, "192.0.2.2"),
        rec("www", RecordType::A, 300, "192.0.2.3"),
        rec("old", RecordType::Txt, 300, "to be removed"),
        rec("@", RecordType::Mx, 300, "10 mx1"),
    ]
}

fn desired_zone() -> Vec<Record> {
    vec![
        rec("@", RecordType::A, 300, "192.0.2.1"),
        rec("www", RecordType::A, 600, "192.0.2.2"),
        rec("www", RecordType::A, 300, "192.0.2.4"),
        rec("@", RecordType::Mx, 300, "10 mx1"),
        rec("@", RecordType::Mx, 300, "20 mx2"),
        rec("_sip._tcp", RecordType::Srv, 300, "10 5 5060 sip"),
    ]
}

/// 跑一遍完整流程，返回 `(correction 数, change 数)`
async fn converge(provider: &InMemoryProvider) -> (usize, usize) {
    let cancel = CancellationToken::new();
    let dc = zone(desired_zone());

    let existing = require_ok!(
        provider
            .get_zone_records(ORIGIN, &BTreeMap::new(), &cancel)
            .await,
        "fetch failed"
    );
    let (corrections, count) = require_ok!(provider.get_zone_records_corrections(&dc, &existing));
    let planned = corrections.len();
    for c in corrections {
        let message = c.message.clone();
        let res = c.apply(cancel.clone()).await;
        assert!(res.is_ok(), "apply '{message}' failed: {res:?}");
    }

    let snapshot = require_some!(provider.snapshot(ORIGIN).await);
    assert_eq!(rendered(snapshot.iter()), rendered(dc.records.iter()));

    // 第二轮必须收敛为零变更
    let again = require_ok!(
        provider
            .get_zone_records(ORIGIN, &BTreeMap::new(), &cancel)
            .await
    );
    let (corrections, count2) = require_ok!(provider.get_zone_records_corrections(&dc, &again));
    assert!(corrections.is_empty());
    assert_eq!(count2, 0);

    (planned, count)
}

#[tokio::test]
async fn per_record_converges() {
    let p = InMemoryProvider::new(CorrectionGranularity::PerRecord);
    p.seed(ORIGIN, existing_zone()).await;
    let (planned, count) = converge(&p).await;
    // delete old TXT, modify two www A, create MX + SRV
    assert_eq!(count, 5);
    assert_eq!(planned, count);
}

#[tokio::test]
async fn per_group_converges() {
    let p = InMemoryProvider::new(CorrectionGranularity::PerGroup);
    p.seed(ORIGIN, existing_zone()).await;
    let (planned, count) = converge(&p).await;
    assert_eq!(count, 5);
    // old/TXT, www/A, @/MX, _sip._tcp/SRV
    assert_eq!(planned, 4);
}

#[tokio::test]
async fn whole_zone_converges_in_one_correction() {
    let p = InMemoryProvider::new(CorrectionGranularity::WholeZone);
    p.seed(ORIGIN, existing_zone()).await;
    let (planned, count) = converge(&p).await;
    assert_eq!(count, 5);
    assert_eq!(planned, 1);
}

#[tokio::test]
async fn whole_zone_message_lists_every_change() {
    let p = InMemoryProvider::new(CorrectionGranularity::WholeZone);
    p.seed(ORIGIN, existing_zone()).await;
    let cancel = CancellationToken::new();
    let existing = require_ok!(p.get_zone_records(ORIGIN, &BTreeMap::new(), &cancel).await);
    let (corrections, _) = require_ok!(p.get_zone_records_corrections(&zone(desired_zone()), &existing));
    let message = &corrections[0].message;
    assert!(message.starts_with("UPDATE ZONE example.com (5 changes)"), "{message}");
    assert_eq!(message.lines().count(), 6);
}

#[tokio::test]
async fn cancelled_correction_changes_nothing() {
    let p = InMemoryProvider::new(CorrectionGranularity::PerRecord);
    p.seed(ORIGIN, existing_zone()).await;
    let cancel = CancellationToken::new();
    let existing = require_ok!(p.get_zone_records(ORIGIN, &BTreeMap::new(), &cancel).await);
    let (corrections, _) = require_ok!(p.get_zone_records_corrections(&zone(desired_zone()), &existing));

    cancel.cancel();
    for c in corrections {
        let res = c.apply(cancel.clone()).await;
        assert!(matches!(res, Err(ProviderError::Cancelled { .. })), "{res:?}");
    }
    let snapshot = require_some!(p.snapshot(ORIGIN).await);
    assert_eq!(rendered(snapshot.iter()), rendered(existing_zone().iter()));
}

#[tokio::test]
async fn stale_plan_fails_without_partial_writes() {
    let p = InMemoryProvider::new(CorrectionGranularity::WholeZone);
    p.seed(ORIGIN, existing_zone()).await;
    let cancel = CancellationToken::new();
    let existing = require_ok!(p.get_zone_records(ORIGIN, &BTreeMap::new(), &cancel).await);
    let (corrections, _) = require_ok!(p.get_zone_records_corrections(&zone(desired_zone()), &existing));

    // 计划之后 zone 被别人整体替换，原有记录 id 全部失效
    let replaced = vec![rec("@", RecordType::A, 300, "203.0.113.1")];
    p.seed(ORIGIN, replaced.clone()).await;

    for c in corrections {
        let res = c.apply(cancel.clone()).await;
        assert!(matches!(res, Err(ProviderError::RecordNotFound { .. })), "{res:?}");
    }
    let snapshot = require_some!(p.snapshot(ORIGIN).await);
    assert_eq!(rendered(snapshot.iter()), rendered(replaced.iter()));
}

#[tokio::test]
async fn records_from_another_source_are_rejected() {
    let p = InMemoryProvider::new(CorrectionGranularity::PerRecord);
    p.seed(ORIGIN, Vec::new()).await;
    // existing 没有经过 get_zone_records，不带原生句柄
    let res = p.get_zone_records_corrections(&zone(Vec::new()), &existing_zone());
    assert!(matches!(res, Err(ProviderError::InvalidParameter { .. })), "{res:?}");
}
