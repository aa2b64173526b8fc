//! 凭证文件格式
//!
//! ```json
//! { "cf": { "type": "cloudflare", "api_token": "..." } }
//! ```

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use dns_converge_provider::{ProviderCredentials, ProviderType};

use crate::error::{CoreError, CoreResult};
use crate::traits::CredentialsMap;

/// 解析凭证文件：实例名 -> 扁平键值表（必须带 `type`）
pub fn parse_credentials(json: &str) -> CoreResult<CredentialsMap> {
    let raw: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_str(json)
        .map_err(|e| CoreError::CredentialError(format!("invalid credentials file: {e}")))?;

    let mut out = HashMap::with_capacity(raw.len());
    for (name, fields) in raw {
        let map = flatten(&name, fields)?;
        let provider_type: ProviderType = map
            .get("type")
            .ok_or_else(|| CoreError::CredentialError(format!("'{name}': missing 'type'")))?
            .parse()
            .map_err(|e: String| CoreError::CredentialError(format!("'{name}': {e}")))?;
        let creds = ProviderCredentials::from_map(provider_type, &map)?;
        out.insert(name, creds);
    }
    Ok(out)
}

/// 标量统一转为字符串；布尔、数字都允许
fn flatten(name: &str, fields: BTreeMap<String, Value>) -> CoreResult<HashMap<String, String>> {
    fields
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(CoreError::CredentialError(format!(
                        "'{name}.{k}': expected a scalar, got {other}"
                    )));
                }
            };
            Ok((k, v))
        })
        .collect()
}
