//! In-memory DNS provider
//!
//! Holds zones in process memory. Used for dry runs, tests and as the
//! reference implementation of all three correction granularities.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::correction::Correction;
use crate::diff::ChangeSet;
use crate::domain::DomainConfig;
use crate::error::{ProviderError, Result};
use crate::providers::common::normalize_zone_name;
use crate::record::{NativeHandle, NormalizeOptions, Record, RecordKey, RecordType};
use crate::traits::DnsProvider;
use crate::types::{
    ApexNsPolicy, CorrectionGranularity, FieldType, ProviderCapabilities, ProviderCredentialField,
    ProviderMetadata, ProviderType,
};

const PROVIDER: &str = "memory";

/// Back-reference to a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoryHandle {
    id: String,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    record: Record,
}

type Zones = BTreeMap<String, Vec<StoredRecord>>;

/// One mutation inside a correction.
#[derive(Debug, Clone)]
enum Op {
    Delete(String),
    Replace(String, Record),
    Add(Record),
}

impl Op {
    fn rank(&self) -> u8 {
        match self {
            Self::Delete(_) => 0,
            Self::Replace(..) => 1,
            Self::Add(_) => 2,
        }
    }
}

/// In-memory provider
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    granularity: CorrectionGranularity,
    zones: Arc<RwLock<Zones>>,
}

impl std::fmt::Debug for InMemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProvider")
            .field("granularity", &self.granularity)
            .finish_non_exhaustive()
    }
}

fn not_found(zone: &str) -> ProviderError {
    ProviderError::ZoneNotFound {
        provider: PROVIDER.to_string(),
        zone: zone.to_string(),
        raw_message: None,
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Apply `ops` to one zone. Ids are checked before anything changes, so a
/// failing batch leaves the zone untouched.
fn apply_ops(records: &mut Vec<StoredRecord>, mut ops: Vec<Op>) -> Result<()> {
    let known: BTreeSet<&str> = records.iter().map(|s| s.id.as_str()).collect();
    for op in &ops {
        if let Op::Delete(id) | Op::Replace(id, _) = op
            && !known.contains(id.as_str())
        {
            return Err(ProviderError::RecordNotFound {
                provider: PROVIDER.to_string(),
                record_id: id.clone(),
                raw_message: None,
            });
        }
    }

    // deletes before anything that could collide with them
    ops.sort_by_key(Op::rank);
    for op in ops {
        match op {
            Op::Delete(id) => records.retain(|s| s.id != id),
            Op::Replace(id, record) => {
                if let Some(slot) = records.iter_mut().find(|s| s.id == id) {
                    slot.record = record;
                }
            }
            Op::Add(record) => records.push(StoredRecord {
                id: new_id(),
                record,
            }),
        }
    }
    Ok(())
}

fn strip(record: &Record) -> Record {
    let mut r = record.clone();
    r.clear_original();
    r
}

impl InMemoryProvider {
    pub fn new(granularity: CorrectionGranularity) -> Self {
        Self {
            granularity,
            zones: Arc::default(),
        }
    }

    fn static_capabilities(granularity: CorrectionGranularity) -> ProviderCapabilities {
        ProviderCapabilities {
            supported_types: RecordType::ALL.to_vec(),
            apex_ns_policy: ApexNsPolicy::Manage,
            granularity,
            can_create_zones: true,
            can_list_zones: true,
            can_get_nameservers: false,
            allows_null_targets: true,
            wildcard_forbidden: Vec::new(),
            dnskey_apex_only: true,
            compared_metadata: Vec::new(),
        }
    }

    /// Replace the content of a zone, creating it if needed.
    pub async fn seed(&self, zone: &str, records: Vec<Record>) {
        let stored = records
            .into_iter()
            .map(|r| StoredRecord {
                id: new_id(),
                record: strip(&r),
            })
            .collect();
        self.zones
            .write()
            .await
            .insert(normalize_zone_name(zone), stored);
    }

    /// Current content of a zone, sorted canonically.
    pub async fn snapshot(&self, zone: &str) -> Option<Vec<Record>> {
        let zones = self.zones.read().await;
        let mut records: Vec<Record> = zones
            .get(&normalize_zone_name(zone))?
            .iter()
            .map(|s| s.record.clone())
            .collect();
        crate::record::sort_records(&mut records);
        Some(records)
    }

    fn id_of(record: &Record) -> Result<String> {
        record
            .original()
            .and_then(|h| h.downcast_ref::<MemoryHandle>())
            .map(|h| h.id.clone())
            .ok_or_else(|| ProviderError::InvalidParameter {
                provider: PROVIDER.to_string(),
                param: "record".to_string(),
                detail: format!("{record} was not read from this provider"),
            })
    }

    /// Ops for each change, keyed by RRSet, in delete/modify/create order.
    fn ops_by_group(changes: &ChangeSet) -> Result<BTreeMap<RecordKey, (Vec<String>, Vec<Op>)>> {
        let mut groups: BTreeMap<RecordKey, (Vec<String>, Vec<Op>)> = BTreeMap::new();
        for c in changes.changes() {
            let op = match (&c.existing, &c.desired) {
                (Some(e), Some(d)) => Op::Replace(Self::id_of(e)?, strip(d)),
                (Some(e), None) => Op::Delete(Self::id_of(e)?),
                (None, Some(d)) => Op::Add(strip(d)),
                (None, None) => continue,
            };
            let Some(key) = c.key() else { continue };
            let entry = groups.entry(key).or_default();
            entry.0.push(c.message.clone());
            entry.1.push(op);
        }
        Ok(groups)
    }

    fn correction(&self, zone: &str, message: String, ops: Vec<Op>) -> Correction {
        let zones = Arc::clone(&self.zones);
        let zone = zone.to_string();
        Correction::new(message, move |cancel: CancellationToken| {
            async move {
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled {
                        provider: PROVIDER.to_string(),
                    });
                }
                let mut zones = zones.write().await;
                let records = zones.get_mut(&zone).ok_or_else(|| not_found(&zone))?;
                apply_ops(records, ops)
            }
            .boxed()
        })
    }
}

#[async_trait]
impl DnsProvider for InMemoryProvider {
    fn id(&self) -> &'static str {
        PROVIDER
    }

    fn metadata() -> ProviderMetadata {
        ProviderMetadata {
            id: ProviderType::Memory,
            name: "In-memory".to_string(),
            description: "Process-local zone store, for dry runs and tests".to_string(),
            credential_fields: vec![
                ProviderCredentialField::new("granularity", "Granularity", FieldType::Choice, false)
                    .with_help("per_record | per_group | whole_zone"),
            ],
            capabilities: Self::static_capabilities(CorrectionGranularity::default()),
        }
    }

    fn capabilities(&self) -> ProviderCapabilities {
        Self::static_capabilities(self.granularity)
    }

    async fn get_zone_records(
        &self,
        domain: &str,
        _meta: &BTreeMap<String, String>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        let zone = normalize_zone_name(domain);
        let zones = self.zones.read().await;
        let stored = zones.get(&zone).ok_or_else(|| not_found(&zone))?;
        let opts = NormalizeOptions::default();
        Ok(stored
            .iter()
            .map(|s| {
                let mut r = s.record.clone().with_original(NativeHandle::new(MemoryHandle {
                    id: s.id.clone(),
                }));
                r.normalize(&opts);
                r
            })
            .collect())
    }

    fn get_zone_records_corrections(
        &self,
        dc: &DomainConfig,
        existing: &[Record],
    ) -> Result<(Vec<Correction>, usize)> {
        let changes = self.compute_changes(dc, existing)?;
        let count = changes.change_count();
        if count == 0 {
            return Ok((Vec::new(), 0));
        }
        let zone = normalize_zone_name(&dc.name);

        let corrections = match self.granularity {
            CorrectionGranularity::PerRecord => {
                let mut out = Vec::with_capacity(count);
                for c in changes.changes() {
                    let op = match (&c.existing, &c.desired) {
                        (Some(e), Some(d)) => Op::Replace(Self::id_of(e)?, strip(d)),
                        (Some(e), None) => Op::Delete(Self::id_of(e)?),
                        (None, Some(d)) => Op::Add(strip(d)),
                        (None, None) => continue,
                    };
                    out.push(self.correction(&zone, c.message.clone(), vec![op]));
                }
                out
            }
            CorrectionGranularity::PerGroup => Self::ops_by_group(&changes)?
                .into_iter()
                .map(|(key, (messages, ops))| {
                    let message = format!("REWRITE {key}:\n{}", messages.join("\n"));
                    self.correction(&zone, message, ops)
                })
                .collect(),
            CorrectionGranularity::WholeZone => {
                let mut messages = Vec::with_capacity(count);
                let mut ops = Vec::with_capacity(count);
                for (_, (m, o)) in Self::ops_by_group(&changes)? {
                    messages.extend(m);
                    ops.extend(o);
                }
                let message = format!("UPDATE ZONE {zone} ({count} changes):\n{}", messages.join("\n"));
                vec![self.correction(&zone, message, ops)]
            }
        };
        Ok((corrections, count))
    }

    async fn ensure_zone_exists(
        &self,
        domain: &str,
        _meta: &BTreeMap<String, String>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        let zone = normalize_zone_name(domain);
        let mut zones = self.zones.write().await;
        if !zones.contains_key(&zone) {
            log::info!("[memory] Created zone {zone}");
            zones.insert(zone, Vec::new());
        }
        Ok(())
    }

    async fn list_zones(&self, _cancel: &CancellationToken) -> Result<Vec<String>> {
        Ok(self.zones.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(label: &str, rtype: RecordType, ttl: u32, rdata: &str) -> Record {
        Record::parse(label, "example.com", ttl, rtype, rdata).unwrap()
    }

    #[test]
    fn ops_apply_deletes_first() {
        let existing = rec("www", RecordType::A, 300, "1.1.1.1");
        let mut records = vec![StoredRecord {
            id: "a".to_string(),
            record: existing.clone(),
        }];
        let ops = vec![Op::Add(existing.clone()), Op::Delete("a".to_string())];
        apply_ops(&mut records, ops).unwrap();
        assert_eq!(records.len(), 1);
        assert_ne!(records[0].id, "a");
    }

    #[test]
    fn unknown_id_leaves_zone_untouched() {
        let mut records = vec![StoredRecord {
            id: "a".to_string(),
            record: rec("www", RecordType::A, 300, "1.1.1.1"),
        }];
        let ops = vec![Op::Delete("a".to_string()), Op::Delete("missing".to_string())];
        let res = apply_ops(&mut records, ops);
        assert!(matches!(res, Err(ProviderError::RecordNotFound { .. })));
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn unknown_zone_is_not_found() {
        let p = InMemoryProvider::default();
        let res = p
            .get_zone_records("nope.test", &BTreeMap::new(), &CancellationToken::new())
            .await;
        assert!(matches!(res, Err(ProviderError::ZoneNotFound { .. })));
    }

    #[tokio::test]
    async fn ensure_zone_is_idempotent() {
        let p = InMemoryProvider::default();
        let cancel = CancellationToken::new();
        p.seed("example.com", vec![rec("@", RecordType::A, 300, "1.2.3.4")])
            .await;
        p.ensure_zone_exists("example.com.", &BTreeMap::new(), &cancel)
            .await
            .unwrap();
        p.ensure_zone_exists("other.test", &BTreeMap::new(), &cancel)
            .await
            .unwrap();

        assert_eq!(p.snapshot("example.com").await.map(|r| r.len()), Some(1));
        assert_eq!(
            p.list_zones(&cancel).await.unwrap(),
            vec!["example.com".to_string(), "other.test".to_string()]
        );
    }

    #[test]
    fn metadata_reports_memory() {
        let meta = InMemoryProvider::metadata();
        assert_eq!(meta.id, ProviderType::Memory);
        assert!(meta.capabilities.supports(RecordType::Loc));
        assert_eq!(meta.capabilities.apex_ns_policy, ApexNsPolicy::Manage);
    }
}
