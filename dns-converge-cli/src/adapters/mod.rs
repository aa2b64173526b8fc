//! CLI 平台的存储适配器

mod credential_store;

pub use credential_store::JsonFileCredentialStore;
