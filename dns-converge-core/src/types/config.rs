//! 期望状态配置（JSON）

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use dns_converge_provider::diff::IgnoreFilter;
use dns_converge_provider::{DomainConfig, IgnoreTarget, Record, RecordType};

use crate::error::{CoreError, CoreResult};

/// 未指定 TTL 时使用的默认值
pub const DEFAULT_TTL: u32 = 300;

/// 期望状态文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredConfig {
    /// 记录未写 `ttl` 时的取值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<u32>,
    pub domains: Vec<DomainSpec>,
}

/// 单个 zone 的期望状态
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    pub name: String,
    /// 凭证文件中的 provider 实例名
    pub providers: Vec<String>,
    #[serde(default)]
    pub records: Vec<RecordSpec>,
    #[serde(default)]
    pub keep_unknown: bool,
    #[serde(default)]
    pub ignored_names: Vec<String>,
    #[serde(default)]
    pub ignored_targets: Vec<IgnoreTarget>,
    #[serde(default)]
    pub autosplit_txt: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// 单条记录，`value` 为 presentation 格式的 RDATA
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    pub value: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl DesiredConfig {
    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::ConfigError(format!("invalid config: {e}")))
    }

    /// 从文件读取
    pub async fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::ConfigError(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// 转换为 differ 使用的 [`DomainConfig`]，同时校验记录与忽略规则
    pub fn to_domain_configs(&self) -> CoreResult<Vec<DomainConfig>> {
        let default_ttl = self.default_ttl.unwrap_or(DEFAULT_TTL);
        let mut seen = Vec::with_capacity(self.domains.len());
        let mut out = Vec::with_capacity(self.domains.len());

        for spec in &self.domains {
            let dc = spec.to_domain_config(default_ttl)?;
            if seen.contains(&dc.name) {
                return Err(CoreError::ConfigError(format!("domain '{}' is listed twice", dc.name)));
            }
            seen.push(dc.name.clone());
            out.push(dc);
        }
        Ok(out)
    }
}

impl DomainSpec {
    fn to_domain_config(&self, default_ttl: u32) -> CoreResult<DomainConfig> {
        let name = self.name.trim().trim_end_matches('.').to_lowercase();
        if name.is_empty() {
            return Err(CoreError::ConfigError("domain with an empty name".to_string()));
        }
        if self.providers.is_empty() {
            return Err(CoreError::ConfigError(format!("domain '{name}' has no providers")));
        }

        let records = self
            .records
            .iter()
            .map(|r| r.to_record(&name, default_ttl))
            .collect::<CoreResult<Vec<_>>>()?;

        // 提前拒绝非法 glob，避免等到 diff 时才失败
        IgnoreFilter::new(&self.ignored_names, &self.ignored_targets)?;

        let mut dc = DomainConfig::new(name)
            .with_records(records)
            .with_keep_unknown(self.keep_unknown)
            .with_ignored_names(self.ignored_names.iter().cloned())
            .with_ignored_targets(self.ignored_targets.clone());
        dc.providers.clone_from(&self.providers);
        dc.autosplit_txt = self.autosplit_txt;
        dc.metadata.clone_from(&self.metadata);
        Ok(dc)
    }
}

impl RecordSpec {
    fn to_record(&self, origin: &str, default_ttl: u32) -> CoreResult<Record> {
        let ttl = self.ttl.unwrap_or(default_ttl);
        let mut record = Record::parse(&self.name, origin, ttl, self.record_type, &self.value)
            .map_err(|e| CoreError::ConfigError(format!("{origin}: {e}")))?;
        for (k, v) in &self.metadata {
            record = record.with_metadata(k, v);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "defaultTtl": 600,
        "domains": [{
            "name": "Example.COM.",
            "providers": ["cf"],
            "keepUnknown": true,
            "ignoredNames": ["*.dev"],
            "records": [
                {"name": "@", "type": "A", "value": "192.0.2.1"},
                {"name": "www", "type": "CNAME", "ttl": 60, "value": "@"},
                {"name": "@", "type": "MX", "value": "10 mx1", "metadata": {"note": "primary"}}
            ]
        }]
    }"#;

    #[test]
    fn parses_camel_case_config() {
        let cfg = DesiredConfig::from_json(SAMPLE).unwrap();
        let dcs = cfg.to_domain_configs().unwrap();
        assert_eq!(dcs.len(), 1);

        let dc = &dcs[0];
        assert_eq!(dc.name, "example.com");
        assert_eq!(dc.providers, vec!["cf".to_string()]);
        assert!(dc.keep_unknown);
        assert_eq!(dc.records.len(), 3);
        assert_eq!(dc.records[0].ttl, 600);
        assert_eq!(dc.records[1].ttl, 60);
        assert_eq!(dc.records[1].target(), "example.com.");
        assert_eq!(dc.records[2].target(), "mx1.example.com.");
    }

    #[test]
    fn default_ttl_applies_when_missing() {
        let cfg = DesiredConfig::from_json(
            r#"{"domains":[{"name":"a.test","providers":["m"],"records":[{"name":"@","type":"A","value":"192.0.2.1"}]}]}"#,
        )
        .unwrap();
        let dcs = cfg.to_domain_configs().unwrap();
        assert_eq!(dcs[0].records[0].ttl, DEFAULT_TTL);
    }

    #[test]
    fn rejects_bad_records_and_globs() {
        let bad_rdata = DesiredConfig::from_json(
            r#"{"domains":[{"name":"a.test","providers":["m"],"records":[{"name":"@","type":"A","value":"nope"}]}]}"#,
        )
        .unwrap();
        assert!(matches!(bad_rdata.to_domain_configs(), Err(CoreError::ConfigError(_))));

        let bad_glob = DesiredConfig::from_json(
            r#"{"domains":[{"name":"a.test","providers":["m"],"ignoredNames":["[x"]}]}"#,
        )
        .unwrap();
        assert!(matches!(bad_glob.to_domain_configs(), Err(CoreError::Diff(_))));
    }

    #[test]
    fn rejects_structural_problems() {
        assert!(matches!(
            DesiredConfig::from_json("{not json"),
            Err(CoreError::ConfigError(_))
        ));

        let no_providers =
            DesiredConfig::from_json(r#"{"domains":[{"name":"a.test","providers":[]}]}"#).unwrap();
        assert!(no_providers.to_domain_configs().is_err());

        let twice = DesiredConfig::from_json(
            r#"{"domains":[{"name":"a.test","providers":["m"]},{"name":"A.test.","providers":["m"]}]}"#,
        )
        .unwrap();
        assert!(twice.to_domain_configs().is_err());
    }
}
