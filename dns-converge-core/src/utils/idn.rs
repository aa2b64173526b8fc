//! IDN → punycode（A-label）转换

use dns_converge_provider::Record;

use crate::error::{CoreError, CoreResult};

/// 把域名或标签转换为 ASCII 形式，保留末尾的点。
///
/// `@`、`*`、`_dmarc` 等纯 ASCII 输入只做小写化。
pub fn to_ascii(name: &str) -> CoreResult<String> {
    if name.is_ascii() {
        return Ok(name.to_ascii_lowercase());
    }
    let (bare, dot) = match name.strip_suffix('.') {
        Some(bare) => (bare, "."),
        None => (name, ""),
    };
    let ascii = idna::domain_to_ascii(bare)
        .map_err(|e| CoreError::ValidationError(format!("invalid IDN '{name}': {e}")))?;
    Ok(format!("{ascii}{dot}"))
}

/// 对记录的标签、FQDN 与主机名 target 做 punycode 转换
pub fn punycode_record(record: &mut Record, origin: &str) -> CoreResult<()> {
    let label = record.label();
    if !label.is_ascii() {
        let label = to_ascii(label)?;
        record.set_label(&label, origin);
    } else if !record.fqdn().is_ascii() || !record.origin().is_ascii() {
        let label = label.to_string();
        record.set_label(&label, origin);
    }

    if record.record_type().has_hostname_target() {
        let target = record.target();
        if !target.is_ascii() {
            record.set_target(&to_ascii(&target)?);
        }
    }
    Ok(())
}

/// 批量转换
pub fn punycode_records(records: &mut [Record], origin: &str) -> CoreResult<()> {
    records.iter_mut().try_for_each(|r| punycode_record(r, origin))
}
