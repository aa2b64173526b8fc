//! Differ: correlates existing records with desired ones.
//!
//! The differ is pure. It never touches the network and returns new lists
//! instead of mutating its inputs.

mod filter;

pub use filter::IgnoreFilter;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::domain::DomainConfig;
use crate::error::ProviderError;
use crate::record::{Record, RecordKey};

/// Structural diff failures. Both are validation errors for the zone.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiffError {
    #[error("invalid ignore pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },

    #[error("desired record '{record}' is covered by {rule} and cannot be managed")]
    IgnoredModification { record: String, rule: String },
}

impl DiffError {
    pub fn into_provider_error(self, provider: &str) -> ProviderError {
        let param = match &self {
            Self::InvalidPattern { .. } => "ignore_pattern",
            Self::IgnoredModification { .. } => "records",
        };
        ProviderError::InvalidParameter {
            provider: provider.to_string(),
            param: param.to_string(),
            detail: self.to_string(),
        }
    }
}

/// Classification of one correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Unchanged,
    Create,
    Delete,
    Modify,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unchanged => "UNCHANGED",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Modify => "MODIFY",
        })
    }
}

/// Extracts an extra per-record value that must also match for equality.
pub type CompareFn = Arc<dyn Fn(&Record) -> String + Send + Sync>;

/// Renders a correlation message.
pub type Formatter = Arc<dyn Fn(ChangeKind, Option<&Record>, Option<&Record>) -> String + Send + Sync>;

/// Default correlation message.
pub fn default_formatter(kind: ChangeKind, existing: Option<&Record>, desired: Option<&Record>) -> String {
    match (kind, existing, desired) {
        (ChangeKind::Create, _, Some(d)) => format!("+ CREATE {d}"),
        (ChangeKind::Delete, Some(e), _) => format!("- DELETE {e}"),
        (ChangeKind::Modify, Some(e), Some(d)) => format!(
            "± MODIFY {} {}: ({} ttl={}) -> ({} ttl={})",
            d.fqdn(),
            d.record_type(),
            e.rdata(),
            e.ttl,
            d.rdata(),
            d.ttl
        ),
        (_, e, d) => format!("  {kind} {}", d.or(e).map(ToString::to_string).unwrap_or_default()),
    }
}

/// An `(Existing?, Desired?)` pair plus its rendered description.
#[derive(Debug, Clone)]
pub struct Correlation {
    pub kind: ChangeKind,
    pub existing: Option<Record>,
    pub desired: Option<Record>,
    pub message: String,
}

impl Correlation {
    /// The RRSet key of whichever side is present.
    pub fn key(&self) -> Option<RecordKey> {
        self.desired.as_ref().or(self.existing.as_ref()).map(Record::key)
    }
}

/// Four disjoint lists of correlations.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub unchanged: Vec<Correlation>,
    pub create: Vec<Correlation>,
    pub delete: Vec<Correlation>,
    pub modify: Vec<Correlation>,
}

impl ChangeSet {
    /// Number of structural changes (creates + deletes + modifies).
    pub fn change_count(&self) -> usize {
        self.create.len() + self.delete.len() + self.modify.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }

    /// Changes in application order: deletes, then modifies, then creates.
    pub fn changes(&self) -> impl Iterator<Item = &Correlation> {
        self.delete.iter().chain(&self.modify).chain(&self.create)
    }

    /// Changes grouped by RRSet, for adapters that rewrite whole groups.
    pub fn changed_groups(&self) -> BTreeMap<RecordKey, Vec<String>> {
        let mut groups: BTreeMap<RecordKey, Vec<String>> = BTreeMap::new();
        for c in self.changes() {
            if let Some(key) = c.key() {
                groups.entry(key).or_default().push(c.message.clone());
            }
        }
        groups
    }
}

/// Differ configured for one zone.
pub struct Differ<'a> {
    dc: &'a DomainConfig,
    compare: Vec<CompareFn>,
    formatter: Formatter,
}

impl fmt::Debug for Differ<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Differ")
            .field("zone", &self.dc.name)
            .field("compare_fns", &self.compare.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Differ<'a> {
    pub fn new(dc: &'a DomainConfig) -> Self {
        Self {
            dc,
            compare: Vec::new(),
            formatter: Arc::new(default_formatter),
        }
    }

    /// Add an extra comparison function.
    #[must_use]
    pub fn with_compare(mut self, f: CompareFn) -> Self {
        self.compare.push(f);
        self
    }

    /// Compare the given metadata keys in addition to the RDATA.
    #[must_use]
    pub fn with_metadata_keys(self, keys: &[&str]) -> Self {
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
        self.with_compare(Arc::new(move |r: &Record| {
            keys.iter()
                .map(|k| format!("{k}={}", r.metadata.get(k).map_or("", String::as_str)))
                .collect::<Vec<_>>()
                .join(";")
        }))
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    fn extras(&self, r: &Record) -> Vec<String> {
        self.compare.iter().map(|f| f(r)).collect()
    }

    fn equal(&self, a: &Record, b: &Record) -> bool {
        a == b && self.extras(a) == self.extras(b)
    }

    /// Number of differing comparable fields.
    fn distance(&self, a: &Record, b: &Record) -> usize {
        let fa: Vec<String> = a.comparable_fields().into_iter().chain(self.extras(a)).collect();
        let fb: Vec<String> = b.comparable_fields().into_iter().chain(self.extras(b)).collect();
        let common = fa.iter().zip(&fb).filter(|(x, y)| x != y).count();
        common + fa.len().abs_diff(fb.len())
    }

    fn correlate(&self, kind: ChangeKind, existing: Option<&Record>, desired: Option<&Record>) -> Correlation {
        Correlation {
            kind,
            message: (self.formatter)(kind, existing, desired),
            existing: existing.cloned(),
            desired: desired.cloned(),
        }
    }

    /// Reject desired records that fall under an ignore rule.
    ///
    /// Needs no provider state, so callers can run it before touching the zone.
    pub fn check_ignored(&self) -> Result<(), DiffError> {
        let filter = IgnoreFilter::new(&self.dc.ignored_names, &self.dc.ignored_targets)?;
        self.reject_ignored(&filter)
    }

    fn reject_ignored(&self, filter: &IgnoreFilter) -> Result<(), DiffError> {
        match self
            .dc
            .records
            .iter()
            .find_map(|d| filter.matching_rule(d).map(|rule| (d, rule)))
        {
            Some((record, rule)) => Err(DiffError::IgnoredModification {
                record: record.to_string(),
                rule,
            }),
            None => Ok(()),
        }
    }

    /// Compute the change set between `existing` and the desired records.
    pub fn diff(&self, existing: &[Record]) -> Result<ChangeSet, DiffError> {
        let filter = IgnoreFilter::new(&self.dc.ignored_names, &self.dc.ignored_targets)?;
        self.reject_ignored(&filter)?;

        type Group<'r> = (Vec<&'r Record>, Vec<&'r Record>);
        let mut groups: BTreeMap<RecordKey, Group<'_>> = BTreeMap::new();
        for e in existing {
            if let Some(rule) = filter.matching_rule(e) {
                log::debug!("skip {e}: {rule}");
                continue;
            }
            groups.entry(e.key()).or_default().0.push(e);
        }
        for d in &self.dc.records {
            groups.entry(d.key()).or_default().1.push(d);
        }

        // KeepUnknown 只保留 desired 中完全没有出现的名字
        let desired_fqdns: HashSet<&str> = self.dc.records.iter().map(Record::fqdn).collect();

        let mut cs = ChangeSet::default();

        for (_, (mut ex, mut de)) in groups {
            ex.sort_by(|a, b| a.cmp_canonical(b));
            de.sort_by(|a, b| a.cmp_canonical(b));

            // 1. 完全相同的配对
            let mut ex_used = vec![false; ex.len()];
            let mut de_used = vec![false; de.len()];
            for (j, d) in de.iter().enumerate() {
                if let Some(i) = (0..ex.len()).find(|&i| !ex_used[i] && self.equal(ex[i], d)) {
                    ex_used[i] = true;
                    de_used[j] = true;
                    cs.unchanged.push(self.correlate(ChangeKind::Unchanged, Some(ex[i]), Some(*d)));
                }
            }
            let ex_rest: Vec<&Record> = ex.iter().zip(&ex_used).filter(|(_, u)| !**u).map(|(r, _)| *r).collect();
            let de_rest: Vec<&Record> = de.iter().zip(&de_used).filter(|(_, u)| !**u).map(|(r, _)| *r).collect();

            // 2. 剩余的按 (target 是否不同, 汉明距离) 贪心配对为 modify
            let mut candidates: Vec<(bool, usize, usize, usize)> = Vec::with_capacity(ex_rest.len() * de_rest.len());
            for (i, e) in ex_rest.iter().enumerate() {
                for (j, d) in de_rest.iter().enumerate() {
                    candidates.push((e.target() != d.target(), self.distance(e, d), i, j));
                }
            }
            candidates.sort_unstable();

            let mut ex_paired = vec![false; ex_rest.len()];
            let mut de_paired = vec![false; de_rest.len()];
            for (_, _, i, j) in candidates {
                if ex_paired[i] || de_paired[j] {
                    continue;
                }
                ex_paired[i] = true;
                de_paired[j] = true;
                cs.modify.push(self.correlate(ChangeKind::Modify, Some(ex_rest[i]), Some(de_rest[j])));
            }

            // 3. 其余为 delete / create
            for (e, _) in ex_rest.iter().zip(&ex_paired).filter(|(_, p)| !**p) {
                if self.dc.keep_unknown && !desired_fqdns.contains(e.fqdn()) {
                    log::debug!("keep unknown record {e}");
                    continue;
                }
                cs.delete.push(self.correlate(ChangeKind::Delete, Some(*e), None));
            }
            for (d, _) in de_rest.iter().zip(&de_paired).filter(|(_, p)| !**p) {
                cs.create.push(self.correlate(ChangeKind::Create, None, Some(*d)));
            }
        }

        Ok(cs)
    }
}
