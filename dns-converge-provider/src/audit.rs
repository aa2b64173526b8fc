//! Pre-flight checks of desired records against provider capabilities.

use std::fmt;

use serde::Serialize;

use crate::record::{Record, RecordData, RecordType, TXT_SEGMENT_MAX};
use crate::types::ProviderCapabilities;

/// A desired record the provider cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditError {
    /// Presentation form of the offending record.
    pub record: String,
    pub reason: String,
}

impl AuditError {
    fn new(record: &Record, reason: impl Into<String>) -> Self {
        Self {
            record: record.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.record, self.reason)
    }
}

fn is_null_target(target: &str) -> bool {
    target.is_empty() || target == "."
}

/// Default capability-driven audit. Returns one entry per violation.
pub fn audit_records(caps: &ProviderCapabilities, records: &[Record]) -> Vec<AuditError> {
    let mut errors = Vec::new();

    for r in records {
        let rtype = r.record_type();
        if !caps.supports(rtype) {
            errors.push(AuditError::new(r, format!("record type {rtype} is not supported")));
            continue;
        }

        let at_apex = r.label() == "@";
        let wildcard = r.label() == "*" || r.label().starts_with("*.");

        match &r.data {
            RecordData::Txt { strings } => {
                if strings.iter().all(String::is_empty) {
                    errors.push(AuditError::new(r, "empty TXT record"));
                }
                if strings.iter().any(|s| s.len() > TXT_SEGMENT_MAX) {
                    errors.push(AuditError::new(
                        r,
                        format!("TXT string longer than {TXT_SEGMENT_MAX} octets (enable autosplitTxt)"),
                    ));
                }
            }
            RecordData::Mx { exchange, .. } if !caps.allows_null_targets && is_null_target(exchange) => {
                errors.push(AuditError::new(r, "MX with null target"));
            }
            RecordData::Srv { target, .. } if !caps.allows_null_targets && is_null_target(target) => {
                errors.push(AuditError::new(r, "SRV with null target"));
            }
            RecordData::Cname { .. } if at_apex => {
                errors.push(AuditError::new(r, "CNAME is not allowed at the zone apex"));
            }
            RecordData::Dnskey { .. } if caps.dnskey_apex_only && !at_apex => {
                errors.push(AuditError::new(r, "DNSKEY is only allowed at the zone apex"));
            }
            _ => {}
        }

        if wildcard && caps.wildcard_forbidden.contains(&rtype) {
            errors.push(AuditError::new(r, format!("wildcard {rtype} is not supported")));
        }
        if rtype == RecordType::Ds && at_apex {
            errors.push(AuditError::new(r, "DS belongs to the parent zone, not the apex"));
        }
    }
    errors
}
