use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::RecordType;

// ============ Provider Types ============

/// Provider type tag, as used in the credentials file (`"type": "cloudflare"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Cloudflare DNS
    #[cfg(feature = "cloudflare")]
    Cloudflare,
    /// In-process zone store (tests, dry runs)
    #[cfg(feature = "memory")]
    Memory,
}

impl ProviderType {
    /// Every provider type compiled into this build.
    pub fn all() -> Vec<Self> {
        vec![
            #[cfg(feature = "cloudflare")]
            Self::Cloudflare,
            #[cfg(feature = "memory")]
            Self::Memory,
        ]
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "cloudflare")]
            Self::Cloudflare => write!(f, "cloudflare"),
            #[cfg(feature = "memory")]
            Self::Memory => write!(f, "memory"),
            #[allow(unreachable_patterns)]
            _ => Ok(()),
        }
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown provider type '{s}'"))
    }
}

// ============ Capabilities ============

/// What the driver does with desired changes to the apex NS RRSet.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ApexNsPolicy {
    /// Apex NS records are reconciled like any other.
    Manage,
    /// Apex NS records are dropped from both sides with a warning.
    #[default]
    WarnAndSkip,
    /// A desired apex NS record fails validation.
    Reject,
}

/// How an adapter groups changes into corrections.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CorrectionGranularity {
    /// One correction per created/deleted/modified record.
    #[default]
    PerRecord,
    /// One correction per changed `(FQDN, Type)` RRSet.
    PerGroup,
    /// One composite correction for the whole zone.
    WholeZone,
}

impl FromStr for CorrectionGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_record" | "record" => Ok(Self::PerRecord),
            "per_group" | "group" => Ok(Self::PerGroup),
            "whole_zone" | "zone" => Ok(Self::WholeZone),
            other => Err(format!(
                "unknown granularity '{other}', expected per_record, per_group or whole_zone"
            )),
        }
    }
}

impl fmt::Display for CorrectionGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PerRecord => "per_record",
            Self::PerGroup => "per_group",
            Self::WholeZone => "whole_zone",
        })
    }
}

/// Feature flags an adapter advertises; the driver rejects configurations
/// the backend cannot execute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    /// RR types the provider can store.
    pub supported_types: Vec<RecordType>,
    pub apex_ns_policy: ApexNsPolicy,
    pub granularity: CorrectionGranularity,
    /// `ensure_zone_exists` is implemented.
    pub can_create_zones: bool,
    /// `list_zones` is implemented.
    pub can_list_zones: bool,
    /// `get_nameservers` returns real data.
    pub can_get_nameservers: bool,
    /// MX/SRV with a `.` (null) target are accepted.
    pub allows_null_targets: bool,
    /// Types that must not be placed on a wildcard label.
    pub wildcard_forbidden: Vec<RecordType>,
    /// DNSKEY records are only accepted at the apex.
    pub dnskey_apex_only: bool,
    /// Metadata keys compared by the differ.
    pub compared_metadata: Vec<String>,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            supported_types: vec![
                RecordType::A,
                RecordType::Aaaa,
                RecordType::Cname,
                RecordType::Ns,
                RecordType::Mx,
                RecordType::Txt,
            ],
            apex_ns_policy: ApexNsPolicy::default(),
            granularity: CorrectionGranularity::default(),
            can_create_zones: false,
            can_list_zones: false,
            can_get_nameservers: false,
            allows_null_targets: false,
            wildcard_forbidden: Vec::new(),
            dnskey_apex_only: true,
            compared_metadata: Vec::new(),
        }
    }
}

impl ProviderCapabilities {
    pub fn supports(&self, rtype: RecordType) -> bool {
        self.supported_types.contains(&rtype)
    }
}

// ============ Provider Metadata Types ============

/// Credential field type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Password,
    Choice,
}

/// Credential field definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentialField {
    /// Key in the credentials file
    pub key: String,
    /// Human-readable label
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Missing required fields are rejected
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

impl ProviderCredentialField {
    pub(crate) fn new(key: &str, label: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            field_type,
            required,
            help_text: None,
        }
    }

    #[must_use]
    pub(crate) fn with_help(mut self, help: &str) -> Self {
        self.help_text = Some(help.to_string());
        self
    }
}

/// Provider metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    pub id: ProviderType,
    pub name: String,
    pub description: String,
    /// Recognized credential keys
    pub credential_fields: Vec<ProviderCredentialField>,
    pub capabilities: ProviderCapabilities,
}

// ============ Credential Types ============

/// Keys every provider accepts in addition to its own.
const COMMON_KEYS: [&str; 2] = ["type", "debug"];

/// Credential validation error
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CredentialValidationError {
    /// Missing required field
    MissingField {
        provider: ProviderType,
        field: String,
        label: String,
    },
    /// Field value is empty
    EmptyField {
        provider: ProviderType,
        field: String,
        label: String,
    },
    /// Key not recognized by this provider
    UnknownField { provider: ProviderType, field: String },
    /// Field format is incorrect
    InvalidFormat {
        provider: ProviderType,
        field: String,
        label: String,
        reason: String,
    },
}

impl fmt::Display for CredentialValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { label, .. } => write!(f, "Missing required field: {label}"),
            Self::EmptyField { label, .. } => write!(f, "Field must not be empty: {label}"),
            Self::UnknownField { provider, field } => {
                write!(f, "Unknown credential key '{field}' for provider {provider}")
            }
            Self::InvalidFormat { label, reason, .. } => write!(f, "{label}: {reason}"),
        }
    }
}

impl std::error::Error for CredentialValidationError {}

/// Provider credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", content = "credentials")]
pub enum ProviderCredentials {
    /// Cloudflare credentials
    #[cfg(feature = "cloudflare")]
    #[serde(rename = "cloudflare")]
    Cloudflare {
        api_token: String,
        /// Needed only to create zones
        account_id: Option<String>,
        /// Override the API base URL
        endpoint_url: Option<String>,
    },

    /// In-memory store
    #[cfg(feature = "memory")]
    #[serde(rename = "memory")]
    Memory { granularity: CorrectionGranularity },
}

impl ProviderCredentials {
    /// Build credentials from a flat key/value map, rejecting unknown keys.
    pub fn from_map(
        provider: ProviderType,
        map: &HashMap<String, String>,
    ) -> Result<Self, CredentialValidationError> {
        Self::reject_unknown(provider, map)?;
        match provider {
            #[cfg(feature = "cloudflare")]
            ProviderType::Cloudflare => Ok(Self::Cloudflare {
                api_token: Self::get_required_field(provider, map, "api_token", "API Token")?,
                account_id: Self::get_optional_field(map, "account_id"),
                endpoint_url: Self::get_optional_field(map, "endpoint_url"),
            }),
            #[cfg(feature = "memory")]
            ProviderType::Memory => {
                let granularity = match Self::get_optional_field(map, "granularity") {
                    Some(raw) => raw.parse().map_err(|reason| {
                        CredentialValidationError::InvalidFormat {
                            provider,
                            field: "granularity".to_string(),
                            label: "Granularity".to_string(),
                            reason,
                        }
                    })?,
                    None => CorrectionGranularity::default(),
                };
                Ok(Self::Memory { granularity })
            }
            #[allow(unreachable_patterns)]
            _ => Err(CredentialValidationError::InvalidFormat {
                provider,
                field: "type".to_string(),
                label: "Provider".to_string(),
                reason: format!(
                    "Provider '{provider}' is not supported or its feature is not enabled."
                ),
            }),
        }
    }

    fn reject_unknown(
        provider: ProviderType,
        map: &HashMap<String, String>,
    ) -> Result<(), CredentialValidationError> {
        let known = Self::known_keys(provider);
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        match keys
            .into_iter()
            .find(|k| !COMMON_KEYS.contains(&k.as_str()) && !known.contains(&k.as_str()))
        {
            Some(field) => Err(CredentialValidationError::UnknownField {
                provider,
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }

    fn known_keys(provider: ProviderType) -> &'static [&'static str] {
        match provider {
            #[cfg(feature = "cloudflare")]
            ProviderType::Cloudflare => &["api_token", "account_id", "endpoint_url"],
            #[cfg(feature = "memory")]
            ProviderType::Memory => &["granularity"],
            #[allow(unreachable_patterns)]
            _ => &[],
        }
    }

    /// Get required fields
    fn get_required_field(
        provider: ProviderType,
        map: &HashMap<String, String>,
        key: &str,
        label: &str,
    ) -> Result<String, CredentialValidationError> {
        match map.get(key) {
            None => Err(CredentialValidationError::MissingField {
                provider,
                field: key.to_string(),
                label: label.to_string(),
            }),
            Some(v) if v.trim().is_empty() => Err(CredentialValidationError::EmptyField {
                provider,
                field: key.to_string(),
                label: label.to_string(),
            }),
            Some(v) => Ok(v.clone()),
        }
    }

    fn get_optional_field(map: &HashMap<String, String>, key: &str) -> Option<String> {
        map.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Convert credentials back to a key/value map
    pub fn to_map(&self) -> HashMap<String, String> {
        match self {
            #[cfg(feature = "cloudflare")]
            Self::Cloudflare {
                api_token,
                account_id,
                endpoint_url,
            } => {
                let mut map: HashMap<String, String> =
                    [("api_token".to_string(), api_token.clone())].into();
                if let Some(id) = account_id {
                    map.insert("account_id".to_string(), id.clone());
                }
                if let Some(url) = endpoint_url {
                    map.insert("endpoint_url".to_string(), url.clone());
                }
                map
            }
            #[cfg(feature = "memory")]
            Self::Memory { granularity } => {
                [("granularity".to_string(), granularity.to_string())].into()
            }
        }
    }

    /// Get the corresponding provider type
    pub fn provider_type(&self) -> ProviderType {
        match self {
            #[cfg(feature = "cloudflare")]
            Self::Cloudflare { .. } => ProviderType::Cloudflare,
            #[cfg(feature = "memory")]
            Self::Memory { .. } => ProviderType::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ ProviderCredentials Round Trip Test ============

    #[cfg(feature = "cloudflare")]
    #[test]
    fn credentials_cloudflare_roundtrip() {
        let map: HashMap<String, String> = [
            ("api_token".to_string(), "my-token".to_string()),
            ("account_id".to_string(), "acc".to_string()),
            ("debug".to_string(), "true".to_string()),
        ]
        .into();
        let res = ProviderCredentials::from_map(ProviderType::Cloudflare, &map);
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(cred) = res else {
            return;
        };
        let back = cred.to_map();
        assert_eq!(back.get("api_token").map(String::as_str), Some("my-token"));
        assert_eq!(back.get("account_id").map(String::as_str), Some("acc"));
        assert!(!back.contains_key("endpoint_url"));
        assert_eq!(cred.provider_type(), ProviderType::Cloudflare);
    }

    #[cfg(feature = "memory")]
    #[test]
    fn credentials_memory_granularity() {
        let map: HashMap<String, String> =
            [("granularity".to_string(), "whole-zone".to_string())].into();
        let res = ProviderCredentials::from_map(ProviderType::Memory, &map);
        assert!(
            matches!(
                &res,
                Ok(ProviderCredentials::Memory {
                    granularity: CorrectionGranularity::WholeZone
                })
            ),
            "unexpected result: {res:?}"
        );

        let bad: HashMap<String, String> =
            [("granularity".to_string(), "sometimes".to_string())].into();
        let res = ProviderCredentials::from_map(ProviderType::Memory, &bad);
        assert!(
            matches!(&res, Err(CredentialValidationError::InvalidFormat { .. })),
            "unexpected result: {res:?}"
        );
    }

    #[cfg(feature = "cloudflare")]
    #[test]
    fn credentials_missing_field() {
        let map: HashMap<String, String> = HashMap::new();
        let res = ProviderCredentials::from_map(ProviderType::Cloudflare, &map);
        assert!(
            matches!(&res, Err(CredentialValidationError::MissingField { .. })),
            "unexpected result: {res:?}"
        );
    }

    #[cfg(feature = "cloudflare")]
    #[test]
    fn credentials_empty_field() {
        let map: HashMap<String, String> = [("api_token".to_string(), "  ".to_string())].into();
        let res = ProviderCredentials::from_map(ProviderType::Cloudflare, &map);
        assert!(
            matches!(&res, Err(CredentialValidationError::EmptyField { .. })),
            "unexpected result: {res:?}"
        );
    }

    #[cfg(feature = "cloudflare")]
    #[test]
    fn credentials_unknown_key_rejected() {
        let map: HashMap<String, String> = [
            ("api_token".to_string(), "t".to_string()),
            ("api_secret".to_string(), "s".to_string()),
        ]
        .into();
        let res = ProviderCredentials::from_map(ProviderType::Cloudflare, &map);
        assert!(
            matches!(&res, Err(CredentialValidationError::UnknownField { field, .. }) if field == "api_secret"),
            "unexpected result: {res:?}"
        );
    }

    #[test]
    fn provider_type_parses() {
        for t in ProviderType::all() {
            assert_eq!(t.to_string().parse::<ProviderType>().ok(), Some(t));
        }
        assert!("bind".parse::<ProviderType>().is_err());
    }

    #[test]
    fn granularity_parses_aliases() {
        assert_eq!(
            "per-group".parse::<CorrectionGranularity>().ok(),
            Some(CorrectionGranularity::PerGroup)
        );
        assert_eq!(
            "record".parse::<CorrectionGranularity>().ok(),
            Some(CorrectionGranularity::PerRecord)
        );
    }

    #[test]
    fn default_capabilities_cover_basic_types() {
        let caps = ProviderCapabilities::default();
        assert!(caps.supports(RecordType::A));
        assert!(!caps.supports(RecordType::Loc));
        assert_eq!(caps.apex_ns_policy, ApexNsPolicy::WarnAndSkip);
    }
}
