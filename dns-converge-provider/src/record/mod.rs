//! Canonical, provider-agnostic resource record model.
//!
//! A [`Record`] keeps its relative label and its fully-qualified name in
//! lock-step: every setter that touches one recomputes the other from the
//! zone origin. Type-specific RDATA lives in [`RecordData`]; the typed
//! setters (`set_target_*`) validate and canonicalize it.
//!
//! Conventions shared by every normalization pass:
//! - names are stored lower-case, without a trailing dot; the apex label is `@`
//! - hostname targets are stored fully qualified, with a trailing dot
//! - TXT data is stored unquoted, as the ordered list of character-strings

mod loc;
mod normalize;
mod parse;
mod rdata;
mod txt;

pub use loc::Loc;
pub use normalize::{NormalizeOptions, TtlHook, normalize_records};
pub use rdata::RecordData;
pub use txt::{TXT_SEGMENT_MAX, autosplit, join_txt, quote_txt, split_txt};

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ProviderError;

/// Errors raised while building or parsing a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The type tag is not one of the supported RR types.
    #[error("unknown record type: {0}")]
    UnknownType(String),

    /// The RDATA does not fit the record type.
    #[error("invalid {rtype} rdata '{rdata}': {detail}")]
    InvalidRdata {
        /// Type the RDATA was parsed as.
        rtype: RecordType,
        /// Offending input.
        rdata: String,
        /// What is wrong with it.
        detail: String,
    },

    /// A fully-qualified name does not end in the zone origin.
    #[error("name '{name}' is not inside zone '{origin}'")]
    OutOfZone {
        /// The fully-qualified name.
        name: String,
        /// The zone origin.
        origin: String,
    },
}

impl RecordError {
    pub(crate) fn invalid(rtype: RecordType, rdata: &str, detail: impl Into<String>) -> Self {
        Self::InvalidRdata {
            rtype,
            rdata: rdata.to_string(),
            detail: detail.into(),
        }
    }

    /// Attach provider context, turning this into a validation-kind [`ProviderError`].
    pub fn into_provider_error(self, provider: &str) -> ProviderError {
        ProviderError::InvalidParameter {
            provider: provider.to_string(),
            param: "record".to_string(),
            detail: self.to_string(),
        }
    }
}

// ============ Record Type ============

/// DNS resource record type tag.
///
/// Serialized as the upper-case mnemonic (`"A"`, `"AAAA"`, `"CF_REDIRECT"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address.
    A,
    /// IPv6 address.
    Aaaa,
    /// Canonical name.
    Cname,
    /// Apex-capable alias (provider-side flattening).
    Alias,
    /// Name server.
    Ns,
    /// Mail exchange.
    Mx,
    /// Text.
    Txt,
    /// Service locator.
    Srv,
    /// Certificate Authority Authorization.
    Caa,
    /// TLS certificate association.
    Tlsa,
    /// SSH key fingerprint.
    Sshfp,
    /// Naming authority pointer.
    Naptr,
    /// Reverse pointer.
    Ptr,
    /// Delegation signer.
    Ds,
    /// DNSSEC public key.
    Dnskey,
    /// Start of authority.
    Soa,
    /// Geographic location.
    Loc,
    /// HTTPS service binding.
    Https,
    /// General service binding.
    Svcb,
    /// Provider web redirect (custom).
    Url,
    /// Provider permanent web redirect (custom).
    Url301,
    /// Provider framed redirect (custom).
    Frame,
    /// Cloudflare permanent page-rule redirect (custom).
    #[serde(rename = "CF_REDIRECT")]
    CfRedirect,
    /// Cloudflare temporary page-rule redirect (custom).
    #[serde(rename = "CF_TEMP_REDIRECT")]
    CfTempRedirect,
}

impl RecordType {
    /// Every supported type, in declaration order.
    pub const ALL: [Self; 24] = [
        Self::A,
        Self::Aaaa,
        Self::Cname,
        Self::Alias,
        Self::Ns,
        Self::Mx,
        Self::Txt,
        Self::Srv,
        Self::Caa,
        Self::Tlsa,
        Self::Sshfp,
        Self::Naptr,
        Self::Ptr,
        Self::Ds,
        Self::Dnskey,
        Self::Soa,
        Self::Loc,
        Self::Https,
        Self::Svcb,
        Self::Url,
        Self::Url301,
        Self::Frame,
        Self::CfRedirect,
        Self::CfTempRedirect,
    ];

    /// The presentation mnemonic.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Alias => "ALIAS",
            Self::Ns => "NS",
            Self::Mx => "MX",
            Self::Txt => "TXT",
            Self::Srv => "SRV",
            Self::Caa => "CAA",
            Self::Tlsa => "TLSA",
            Self::Sshfp => "SSHFP",
            Self::Naptr => "NAPTR",
            Self::Ptr => "PTR",
            Self::Ds => "DS",
            Self::Dnskey => "DNSKEY",
            Self::Soa => "SOA",
            Self::Loc => "LOC",
            Self::Https => "HTTPS",
            Self::Svcb => "SVCB",
            Self::Url => "URL",
            Self::Url301 => "URL301",
            Self::Frame => "FRAME",
            Self::CfRedirect => "CF_REDIRECT",
            Self::CfTempRedirect => "CF_TEMP_REDIRECT",
        }
    }

    /// Provider-specific pseudo types with an opaque target.
    pub fn is_custom(self) -> bool {
        matches!(
            self,
            Self::Url | Self::Url301 | Self::Frame | Self::CfRedirect | Self::CfTempRedirect
        )
    }

    /// Types whose primary target is a hostname (compared case-insensitively).
    pub fn has_hostname_target(self) -> bool {
        matches!(
            self,
            Self::Cname
                | Self::Alias
                | Self::Ns
                | Self::Mx
                | Self::Srv
                | Self::Ptr
                | Self::Naptr
                | Self::Https
                | Self::Svcb
        )
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| RecordError::UnknownType(s.to_string()))
    }
}

// ============ Native Handle ============

/// Opaque back-reference to an adapter's native record object.
///
/// Only the adapter that created the handle knows its concrete type and
/// downcasts it when addressing the record for mutation or deletion.
#[derive(Clone)]
pub struct NativeHandle(Arc<dyn Any + Send + Sync>);

impl NativeHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeHandle(..)")
    }
}

// ============ Names ============

/// Compare two domain names label by label, right to left.
///
/// `bar.example.com` < `foo.example.com` < `a.foo.example.com`.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.trim_end_matches('.')
        .rsplit('.')
        .cmp(b.trim_end_matches('.').rsplit('.'))
}

fn trim_origin(origin: &str) -> &str {
    origin.trim_end_matches('.')
}

fn join_label(label: &str, origin: &str) -> String {
    let origin = trim_origin(origin);
    let label = label.trim_end_matches('.');
    if label.is_empty() || label == "@" {
        origin.to_string()
    } else {
        format!("{label}.{origin}")
    }
}

/// The `(FQDN, Type)` key that groups records into an RRSet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub fqdn: String,
    pub record_type: RecordType,
}

impl RecordKey {
    pub fn new(fqdn: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            fqdn: fqdn.into(),
            record_type,
        }
    }
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_names(&self.fqdn, &other.fqdn)
            .then_with(|| self.fqdn.cmp(&other.fqdn))
            .then_with(|| self.record_type.cmp(&other.record_type))
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.fqdn, self.record_type)
    }
}

// ============ Record ============

/// A DNS resource record.
///
/// Equality (`==`) is the equivalence relation used by the differ: same
/// FQDN, TTL and RDATA. Metadata and the native handle never participate;
/// callers that need metadata compared opt in through the differ.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    label: String,
    fqdn: String,
    /// Time to live in seconds. Zero means provider default.
    pub ttl: u32,
    /// Type-specific record data.
    pub data: RecordData,
    /// Out-of-band annotations (e.g. `cloudflare_proxy`).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip)]
    original: Option<NativeHandle>,
}

impl Record {
    /// Create an empty record of `rtype`; fill its RDATA with a `set_target_*` setter.
    pub fn new(label: &str, origin: &str, ttl: u32, rtype: RecordType) -> Self {
        Self::with_data(label, origin, ttl, RecordData::empty(rtype))
    }

    /// Create a record from ready-made RDATA.
    pub fn with_data(label: &str, origin: &str, ttl: u32, data: RecordData) -> Self {
        let mut record = Self {
            label: String::new(),
            fqdn: String::new(),
            ttl,
            data,
            metadata: BTreeMap::new(),
            original: None,
        };
        record.set_label(label, origin);
        record
    }

    /// Create a record addressed by its fully-qualified name.
    pub fn from_fqdn(
        fqdn: &str,
        origin: &str,
        ttl: u32,
        data: RecordData,
    ) -> Result<Self, RecordError> {
        let mut record = Self::with_data("@", origin, ttl, data);
        record.set_label_from_fqdn(fqdn, origin)?;
        Ok(record)
    }

    /// Parse presentation-format RDATA into a new record.
    pub fn parse(
        label: &str,
        origin: &str,
        ttl: u32,
        rtype: RecordType,
        rdata: &str,
    ) -> Result<Self, RecordError> {
        let mut record = Self::new(label, origin, ttl, rtype);
        record.populate_from_str(rtype, rdata, origin)?;
        Ok(record)
    }

    /// The label relative to the zone origin; `@` for the apex.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The fully-qualified name, without trailing dot.
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// The zone origin this record was labelled against.
    pub fn origin(&self) -> &str {
        if self.label == "@" {
            &self.fqdn
        } else {
            self.fqdn.get(self.label.len() + 1..).unwrap_or(&self.fqdn)
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }

    /// The `(FQDN, Type)` grouping key.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.fqdn.clone(), self.record_type())
    }

    /// Set the label and recompute the FQDN. An empty label or `@` is the apex.
    pub fn set_label(&mut self, label: &str, origin: &str) {
        let label = label.trim_end_matches('.');
        self.label = if label.is_empty() {
            "@".to_string()
        } else {
            label.to_string()
        };
        self.fqdn = join_label(&self.label, origin);
    }

    /// Set the FQDN and recompute the label. The name must lie inside `origin`.
    pub fn set_label_from_fqdn(&mut self, fqdn: &str, origin: &str) -> Result<(), RecordError> {
        let fqdn = fqdn.trim_end_matches('.');
        let origin = trim_origin(origin);
        let lower_fqdn = fqdn.to_lowercase();
        let lower_origin = origin.to_lowercase();

        if lower_fqdn == lower_origin {
            self.label = "@".to_string();
        } else if let Some(label) = lower_fqdn
            .strip_suffix(lower_origin.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|rest| !rest.is_empty())
        {
            // 小写化可能改变字节长度，label 只能从小写串上截取
            self.label = fqdn
                .get(..label.len())
                .filter(|orig| orig.to_lowercase() == label)
                .unwrap_or(label)
                .to_string();
        } else {
            return Err(RecordError::OutOfZone {
                name: fqdn.to_string(),
                origin: origin.to_string(),
            });
        }
        self.fqdn = fqdn.to_string();
        Ok(())
    }

    /// The adapter's native back-reference, if this record was fetched.
    pub fn original(&self) -> Option<&NativeHandle> {
        self.original.as_ref()
    }

    pub fn set_original(&mut self, handle: NativeHandle) {
        self.original = Some(handle);
    }

    pub fn clear_original(&mut self) {
        self.original = None;
    }

    #[must_use]
    pub fn with_original(mut self, handle: NativeHandle) -> Self {
        self.original = Some(handle);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The canonical primary target (IP, hostname, joined TXT, ...).
    pub fn target(&self) -> String {
        self.data.target()
    }

    /// Presentation-format RDATA.
    pub fn rdata(&self) -> String {
        self.data.to_string()
    }

    /// Field values compared field-by-field when pairing records (TTL first).
    pub fn comparable_fields(&self) -> Vec<String> {
        std::iter::once(self.ttl.to_string())
            .chain(self.data.fields())
            .collect()
    }

    /// Canonical ordering: name (right-to-left), type, target, then the rest.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        compare_names(&self.fqdn, &other.fqdn)
            .then_with(|| self.fqdn.cmp(&other.fqdn))
            .then_with(|| self.record_type().cmp(&other.record_type()))
            .then_with(|| self.target().cmp(&other.target()))
            .then_with(|| self.rdata().cmp(&other.rdata()))
            .then_with(|| self.ttl.cmp(&other.ttl))
            .then_with(|| self.metadata.cmp(&other.metadata))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fqdn == other.fqdn && self.ttl == other.ttl && self.data == other.data
    }
}

impl Eq for Record {}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} IN {} {}",
            self.fqdn,
            self.ttl,
            self.record_type(),
            self.data
        )
    }
}

/// Sort records into canonical order.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(Record::cmp_canonical);
}
