use serde::{Deserialize, Serialize};

/// Unified error type for all DNS provider operations.
///
/// Each variant includes a `provider` field identifying which provider produced the error,
/// plus variant-specific context. All variants are serializable for structured error reporting.
///
/// # Retryable Errors
///
/// The following variants represent transient failures that may succeed on retry:
/// - [`ConnectFailed`](Self::ConnectFailed) — the request never reached the server
/// - [`NetworkError`](Self::NetworkError) — network connectivity issues
/// - [`Timeout`](Self::Timeout) — request timed out
/// - [`RateLimited`](Self::RateLimited) — API rate limit exceeded
///
/// The built-in HTTP client retries these with the shared rate limiter and
/// exponential backoff. Use [`kind()`](Self::kind) to route an error by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum ProviderError {
    /// The connection could not be established, so no request reached the server.
    ConnectFailed {
        /// Provider that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// A network-level error occurred after the request may have been sent.
    NetworkError {
        /// Provider that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// The HTTP request timed out.
    Timeout {
        /// Provider that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// The API rate limit has been exceeded (HTTP 429 or equivalent) and the
    /// retry budget ran out.
    RateLimited {
        /// Provider that produced the error.
        provider: String,
        /// Suggested wait time in seconds before retrying, if provided by the API.
        retry_after: Option<u64>,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// The provided credentials are invalid or expired.
    InvalidCredentials {
        /// Provider that produced the error.
        provider: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// The authenticated user lacks permission for the requested operation.
    PermissionDenied {
        /// Provider that produced the error.
        provider: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// A DNS record with the same name/type already exists.
    RecordExists {
        /// Provider that produced the error.
        provider: String,
        /// Name of the conflicting record.
        record_name: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// The provider rejected a mutation because the zone changed concurrently.
    Conflict {
        /// Provider that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// The specified DNS record was not found.
    RecordNotFound {
        /// Provider that produced the error.
        provider: String,
        /// ID of the record that was not found.
        record_id: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// The specified zone does not exist at the provider.
    ZoneNotFound {
        /// Provider that produced the error.
        provider: String,
        /// Zone name that was not found.
        zone: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// A request parameter or record is invalid (bad TTL, malformed IP, bad glob, ...).
    InvalidParameter {
        /// Provider that produced the error.
        provider: String,
        /// Name of the invalid parameter.
        param: String,
        /// Description of what's wrong.
        detail: String,
    },

    /// The requested DNS record type is not supported by this provider.
    UnsupportedRecordType {
        /// Provider that produced the error.
        provider: String,
        /// The unsupported record type string.
        record_type: String,
    },

    /// The account's resource quota has been exceeded.
    ///
    /// Unlike [`RateLimited`](Self::RateLimited), this is not a transient condition.
    QuotaExceeded {
        /// Provider that produced the error.
        provider: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// The adapter does not implement this operation.
    Unimplemented {
        /// Provider that produced the error.
        provider: String,
        /// Name of the missing operation.
        operation: String,
    },

    /// The caller cancelled the operation.
    Cancelled {
        /// Provider that produced the error.
        provider: String,
    },

    /// Failed to parse the provider's API response.
    ParseError {
        /// Provider that produced the error.
        provider: String,
        /// Details about the parse failure.
        detail: String,
    },

    /// Failed to serialize a request body.
    SerializationError {
        /// Provider that produced the error.
        provider: String,
        /// Details about the serialization failure.
        detail: String,
    },

    /// An unrecognized error from the provider API.
    ///
    /// This is a catch-all for error codes not yet mapped to a specific variant.
    Unknown {
        /// Provider that produced the error.
        provider: String,
        /// Raw error code from the API, if available.
        raw_code: Option<String>,
        /// Raw error message from the API.
        raw_message: String,
    },
}

/// Coarse error category used by the driver to route failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Invalid input; fatal for the affected zone.
    Validation,
    /// Network failure or non-success response.
    Transport,
    /// Throttled by the provider.
    RateLimited,
    /// Zone or record does not exist.
    NotFound,
    /// Concurrent modification at the provider.
    Conflict,
    /// Operation not supported by the adapter.
    Unimplemented,
    /// Cancelled by the caller.
    Cancelled,
}

impl ProviderError {
    /// Name of the provider that produced the error.
    pub fn provider(&self) -> &str {
        match self {
            Self::ConnectFailed { provider, .. }
            | Self::NetworkError { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::InvalidCredentials { provider, .. }
            | Self::PermissionDenied { provider, .. }
            | Self::RecordExists { provider, .. }
            | Self::Conflict { provider, .. }
            | Self::RecordNotFound { provider, .. }
            | Self::ZoneNotFound { provider, .. }
            | Self::InvalidParameter { provider, .. }
            | Self::UnsupportedRecordType { provider, .. }
            | Self::QuotaExceeded { provider, .. }
            | Self::Unimplemented { provider, .. }
            | Self::Cancelled { provider }
            | Self::ParseError { provider, .. }
            | Self::SerializationError { provider, .. }
            | Self::Unknown { provider, .. } => provider,
        }
    }

    /// Category of this error.
    ///
    /// **Please update this method when new variants are added.**
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. }
            | Self::UnsupportedRecordType { .. }
            | Self::SerializationError { .. } => ErrorKind::Validation,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::RecordNotFound { .. } | Self::ZoneNotFound { .. } => ErrorKind::NotFound,
            Self::RecordExists { .. } | Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unimplemented { .. } => ErrorKind::Unimplemented,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::ConnectFailed { .. }
            | Self::NetworkError { .. }
            | Self::Timeout { .. }
            | Self::InvalidCredentials { .. }
            | Self::PermissionDenied { .. }
            | Self::QuotaExceeded { .. }
            | Self::ParseError { .. }
            | Self::Unknown { .. } => ErrorKind::Transport,
        }
    }

    /// 是否为预期行为（用户输入、资源不存在等），用于日志分级。
    ///
    /// 返回 `true` 时应使用 `warn` 级别，`false` 时使用 `error` 级别。
    /// **新增变体时请同步更新此方法。**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::RecordExists { .. }
                | Self::RecordNotFound { .. }
                | Self::InvalidParameter { .. }
                | Self::UnsupportedRecordType { .. }
                | Self::QuotaExceeded { .. }
                | Self::ZoneNotFound { .. }
                | Self::PermissionDenied { .. }
                | Self::Cancelled { .. }
        )
    }

    /// Whether a new attempt may succeed.
    ///
    /// `idempotent` is false for requests that must not be replayed once they
    /// may have reached the server; only failures known to precede any
    /// server-side effect are retryable then.
    #[must_use]
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            Self::ConnectFailed { .. } | Self::RateLimited { .. } => true,
            Self::NetworkError { .. } | Self::Timeout { .. } => idempotent,
            _ => false,
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectFailed { provider, detail } => {
                write!(f, "[{provider}] Connection failed: {detail}")
            }
            Self::NetworkError { provider, detail } => {
                write!(f, "[{provider}] Network error: {detail}")
            }
            Self::Timeout { provider, detail } => {
                write!(f, "[{provider}] Request timeout: {detail}")
            }
            Self::RateLimited {
                provider,
                retry_after,
                ..
            } => {
                if let Some(secs) = retry_after {
                    write!(f, "[{provider}] Rate limited (retry after {secs}s)")
                } else {
                    write!(f, "[{provider}] Rate limited")
                }
            }
            Self::InvalidCredentials {
                provider,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{provider}] Invalid credentials: {msg}")
                } else {
                    write!(f, "[{provider}] Invalid credentials")
                }
            }
            Self::PermissionDenied {
                provider,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{provider}] Permission denied: {msg}")
                } else {
                    write!(f, "[{provider}] Permission denied")
                }
            }
            Self::RecordExists {
                provider,
                record_name,
                ..
            } => {
                write!(f, "[{provider}] Record '{record_name}' already exists")
            }
            Self::Conflict { provider, detail } => {
                write!(f, "[{provider}] Conflicting change: {detail}")
            }
            Self::RecordNotFound {
                provider,
                record_id,
                ..
            } => {
                write!(f, "[{provider}] Record '{record_id}' not found")
            }
            Self::ZoneNotFound {
                provider,
                zone,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{provider}] Zone '{zone}' not found: {msg}")
                } else {
                    write!(f, "[{provider}] Zone '{zone}' not found")
                }
            }
            Self::InvalidParameter {
                provider,
                param,
                detail,
            } => {
                write!(f, "[{provider}] Invalid parameter '{param}': {detail}")
            }
            Self::UnsupportedRecordType {
                provider,
                record_type,
            } => {
                write!(f, "[{provider}] Unsupported record type: {record_type}")
            }
            Self::QuotaExceeded { provider, .. } => {
                write!(f, "[{provider}] Quota exceeded")
            }
            Self::Unimplemented {
                provider,
                operation,
            } => {
                write!(f, "[{provider}] Operation not implemented: {operation}")
            }
            Self::Cancelled { provider } => {
                write!(f, "[{provider}] Operation cancelled")
            }
            Self::ParseError { provider, detail } => {
                write!(f, "[{provider}] Parse error: {detail}")
            }
            Self::SerializationError { provider, detail } => {
                write!(f, "[{provider}] Serialization error: {detail}")
            }
            Self::Unknown {
                provider,
                raw_message,
                ..
            } => {
                write!(f, "[{provider}] {raw_message}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Convenience type alias for `Result<T, ProviderError>`.
pub type Result<T> = std::result::Result<T, ProviderError>;
