//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

// Re-export library error type
pub use dns_converge_provider::{
    AuditError, CredentialValidationError, DiffError, ErrorKind, ProviderError,
};

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Provider instance not configured
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Zone not present in the desired config
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    /// Credential storage error
    #[error("Credential error: {0}")]
    CredentialError(String),

    /// Credential validation errors (structured, supports field level errors)
    #[error("{0}")]
    CredentialValidation(CredentialValidationError),

    /// Desired configuration could not be read or parsed
    #[error("Config error: {0}")]
    ConfigError(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Desired records the provider cannot represent
    #[error("Audit failed: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    AuditFailed(Vec<AuditError>),

    /// Differ rejected the plan (bad glob, ignored label modified)
    #[error("{0}")]
    Diff(#[from] DiffError),

    /// Provider error (converting from library)
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.) is used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added. **
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::ProviderNotFound(_)
            | Self::DomainNotFound(_)
            | Self::ConfigError(_)
            | Self::ValidationError(_)
            | Self::AuditFailed(_)
            | Self::Diff(_)
            | Self::CredentialValidation(_) => true,
            Self::Provider(e) => e.is_expected(),
            Self::CredentialError(_) | Self::SerializationError(_) => false,
        }
    }

    /// Routing category for the driver.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider(e) => e.kind(),
            Self::CredentialError(_) | Self::SerializationError(_) => ErrorKind::Transport,
            _ => ErrorKind::Validation,
        }
    }

    /// Configuration or validation problem (exit code 2).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<CredentialValidationError> for CoreError {
    fn from(e: CredentialValidationError) -> Self {
        Self::CredentialValidation(e)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Error wrapped with the zone and provider it happened in.
#[derive(Error, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("[{zone} @ {provider}] {source}")]
pub struct ZoneError {
    pub zone: String,
    pub provider: String,
    pub source: CoreError,
}

impl ZoneError {
    pub fn new(zone: &str, provider: &str, source: impl Into<CoreError>) -> Self {
        Self {
            zone: zone.to_string(),
            provider: provider.to_string(),
            source: source.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
