//! Cloudflare API 类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cloudflare API 通用响应
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
    pub result_info: Option<CloudflareResultInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareResultInfo {
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// Cloudflare Zone 结构
#[derive(Debug, Deserialize)]
pub struct CloudflareZone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_servers: Vec<String>,
}

/// Cloudflare DNS Record 结构（响应）
#[derive(Debug, Deserialize)]
pub struct CloudflareDnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    pub ttl: u32,
    pub priority: Option<u16>,
    pub proxied: Option<bool>,
    #[serde(default, deserialize_with = "crate::utils::datetime::deserialize")]
    pub modified_on: Option<DateTime<Utc>>,
    /// SRV/CAA 等复杂记录类型的结构化数据
    pub data: Option<Value>,
}

/// 创建/覆盖记录的请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudflareRecordBody {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// 原始记录的回引（存放在 `Record::original` 中）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudflareHandle {
    pub zone_id: String,
    pub record_id: String,
}

/// SRV 记录的 data 字段
#[derive(Debug, Serialize, Deserialize)]
pub struct CloudflareSrvData {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// CAA 记录的 data 字段
#[derive(Debug, Serialize, Deserialize)]
pub struct CloudflareCaaData {
    pub flags: u8,
    pub tag: String,
    pub value: String,
}

/// TLSA 记录的 data 字段
#[derive(Debug, Serialize, Deserialize)]
pub struct CloudflareTlsaData {
    pub usage: u8,
    pub selector: u8,
    pub matching_type: u8,
    pub certificate: String,
}

/// SSHFP 记录的 data 字段
#[derive(Debug, Serialize, Deserialize)]
pub struct CloudflareSshfpData {
    pub algorithm: u8,
    #[serde(rename = "type")]
    pub fingerprint_type: u8,
    pub fingerprint: String,
}

/// DS 记录的 data 字段
#[derive(Debug, Serialize, Deserialize)]
pub struct CloudflareDsData {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: String,
}

/// DNSKEY 记录的 data 字段
#[derive(Debug, Serialize, Deserialize)]
pub struct CloudflareDnskeyData {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: String,
}

/// NAPTR 记录的 data 字段
#[derive(Debug, Serialize, Deserialize)]
pub struct CloudflareNaptrData {
    pub order: u16,
    pub preference: u16,
    pub flags: String,
    pub service: String,
    pub regex: String,
    pub replacement: String,
}

/// HTTPS/SVCB 记录的 data 字段
#[derive(Debug, Serialize, Deserialize)]
pub struct CloudflareSvcbData {
    pub priority: u16,
    pub target: String,
    #[serde(default)]
    pub value: String,
}
