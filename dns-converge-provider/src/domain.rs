//! Desired state for a single zone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{NormalizeOptions, Record, RecordType};

/// An `IgnoredTargets` entry: records of `record_type` whose target matches
/// `pattern` are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreTarget {
    pub pattern: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
}

impl IgnoreTarget {
    pub fn new(pattern: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            pattern: pattern.into(),
            record_type,
        }
    }
}

/// Desired configuration of one zone.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfig {
    /// Zone name (the origin), without trailing dot.
    pub name: String,
    /// Names of the provider instances this zone is pushed to.
    pub providers: Vec<String>,
    /// Desired records.
    pub records: Vec<Record>,
    /// Never delete provider records absent from `records`.
    pub keep_unknown: bool,
    /// Globs over labels/FQDNs exempt from reconciliation.
    pub ignored_names: Vec<String>,
    /// `(glob, type)` pairs over targets exempt from reconciliation.
    pub ignored_targets: Vec<IgnoreTarget>,
    /// Re-split TXT strings longer than 255 octets.
    pub autosplit_txt: bool,
    /// Opaque per-zone metadata handed to the adapter.
    pub metadata: BTreeMap<String, String>,
}

impl DomainConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim_end_matches('.').to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    #[must_use]
    pub fn with_keep_unknown(mut self, keep_unknown: bool) -> Self {
        self.keep_unknown = keep_unknown;
        self
    }

    #[must_use]
    pub fn with_ignored_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_ignored_targets(mut self, targets: Vec<IgnoreTarget>) -> Self {
        self.ignored_targets = targets;
        self
    }

    /// Normalization options implied by this config (without a TTL hook).
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions::default().with_autosplit(self.autosplit_txt)
    }
}
