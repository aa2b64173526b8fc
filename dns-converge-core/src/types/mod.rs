//! 类型定义模块

mod config;
mod credentials;
mod options;
mod report;

pub use config::{DEFAULT_TTL, DesiredConfig, DomainSpec, RecordSpec};
pub use credentials::parse_credentials;
pub use options::{DEFAULT_CONCURRENCY, ReconcileOptions, RunMode};
pub use report::{
    CorrectionOutcome, CorrectionStatus, EXIT_INVALID, EXIT_OK, EXIT_ZONE_FAILED, RunReport,
    ZoneReport, ZoneStatus,
};

// Re-export provider 库的公共类型
pub use dns_converge_provider::{
    CredentialValidationError, DomainConfig, ProviderCredentials, ProviderMetadata, ProviderType,
    Record, RecordType,
};
