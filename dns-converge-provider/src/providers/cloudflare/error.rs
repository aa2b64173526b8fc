//! Cloudflare error mapping

use crate::error::ProviderError;
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};

use super::CloudflareProvider;

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| "<unknown>".to_string())
}

/// Cloudflare error code mapping
/// Reference: <https://developers.cloudflare.com/api/>
impl ProviderErrorMapper for CloudflareProvider {
    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
        let provider = self.provider_name().to_string();
        match raw.code.as_deref() {
            // 6003/6103/6111: malformed auth headers
            // 9109/10000: unauthorized / authentication error
            Some("6003" | "6103" | "6111" | "9109" | "10000") => ProviderError::InvalidCredentials {
                provider,
                raw_message: Some(raw.message),
            },

            // 9103/10001: token lacks the permission for this route
            Some("9103" | "10001") => ProviderError::PermissionDenied {
                provider,
                raw_message: Some(raw.message),
            },

            // 971: throttled at the API level (HTTP 429 is handled by the limiter)
            Some("971") => ProviderError::RateLimited {
                provider,
                retry_after: None,
                raw_message: Some(raw.message),
            },

            // 1004: DNS validation error
            // 9000: invalid name; 9005/9006/9009: invalid content
            // 9021: invalid TTL; 9041: cannot be proxied
            Some(code @ ("1004" | "9000" | "9005" | "9006" | "9009" | "9021" | "9041")) => {
                let param = match code {
                    "9000" => "name",
                    "9005" | "9006" | "9009" => "value",
                    "9021" => "ttl",
                    "9041" => "proxied",
                    _ => "record",
                };
                ProviderError::InvalidParameter {
                    provider,
                    param: param.to_string(),
                    detail: raw.message,
                }
            }

            // 81053-81058: a record with that host/settings already exists
            Some("81053" | "81054" | "81055" | "81056" | "81057" | "81058") => {
                ProviderError::RecordExists {
                    provider,
                    record_name: or_unknown(context.record_name),
                    raw_message: Some(raw.message),
                }
            }

            // 81044: record does not exist
            Some("81044") => ProviderError::RecordNotFound {
                provider,
                record_id: or_unknown(context.record_id),
                raw_message: Some(raw.message),
            },

            // 81045: record quota exceeded
            Some("81045") => ProviderError::QuotaExceeded {
                provider,
                raw_message: Some(raw.message),
            },

            // 1061: zone already exists in another account or was added concurrently
            Some("1061") => ProviderError::Conflict {
                provider,
                detail: raw.message,
            },

            // 1001/1003/7000/7003: unknown zone or invalid zone identifier
            Some("1001" | "1003" | "7000" | "7003") => ProviderError::ZoneNotFound {
                provider,
                zone: or_unknown(context.zone),
                raw_message: Some(raw.message),
            },

            _ => self.unknown_error(raw),
        }
    }
}
