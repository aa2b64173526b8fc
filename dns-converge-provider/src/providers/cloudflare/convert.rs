//! Conversion between Cloudflare API records and [`Record`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::record::{NativeHandle, NormalizeOptions, Record, RecordData, RecordError, RecordType, quote_txt};
use crate::traits::ProviderErrorMapper;

use super::types::{
    CloudflareCaaData, CloudflareDnskeyData, CloudflareDsData, CloudflareNaptrData,
    CloudflareSrvData, CloudflareSshfpData, CloudflareSvcbData, CloudflareTlsaData,
};
use super::{CloudflareDnsRecord, CloudflareHandle, CloudflareProvider, CloudflareRecordBody};

/// Metadata key carrying the orange-cloud state ("on"/"off").
pub(crate) const PROXY_KEY: &str = "cloudflare_proxy";

pub(crate) const SUPPORTED_TYPES: [RecordType; 15] = [
    RecordType::A,
    RecordType::Aaaa,
    RecordType::Cname,
    RecordType::Ns,
    RecordType::Ptr,
    RecordType::Mx,
    RecordType::Txt,
    RecordType::Srv,
    RecordType::Caa,
    RecordType::Tlsa,
    RecordType::Sshfp,
    RecordType::Naptr,
    RecordType::Ds,
    RecordType::Dnskey,
    RecordType::Https,
];

/// Only A/AAAA/CNAME can sit behind the proxy.
pub(crate) fn is_proxiable(rtype: RecordType) -> bool {
    matches!(rtype, RecordType::A | RecordType::Aaaa | RecordType::Cname)
}

fn is_supported(rtype: RecordType) -> bool {
    SUPPORTED_TYPES.contains(&rtype) || rtype == RecordType::Svcb
}

fn host(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}

impl CloudflareProvider {
    fn record_error(&self, e: RecordError) -> ProviderError {
        e.into_provider_error(self.provider_name())
    }

    fn data_of<T: DeserializeOwned>(&self, cf: &CloudflareDnsRecord) -> Result<T> {
        let data = cf
            .data
            .clone()
            .ok_or_else(|| self.parse_error(format!("{} record {} has no data", cf.record_type, cf.id)))?;
        serde_json::from_value(data).map_err(|e| self.parse_error(e))
    }

    fn to_data<T: Serialize>(&self, data: &T) -> Result<Value> {
        serde_json::to_value(data).map_err(|e| ProviderError::SerializationError {
            provider: self.provider_name().to_string(),
            detail: e.to_string(),
        })
    }

    /// Convert an API record into a normalized [`Record`].
    ///
    /// Returns `None` for record types this adapter does not manage.
    pub(crate) fn record_from_cf(
        &self,
        cf: CloudflareDnsRecord,
        zone_id: &str,
        zone_name: &str,
    ) -> Result<Option<Record>> {
        let Some(rtype) = cf.record_type.parse::<RecordType>().ok().filter(|t| is_supported(*t)) else {
            log::warn!(
                "[cloudflare] Skipping unsupported record type {} at {}",
                cf.record_type,
                cf.name
            );
            return Ok(None);
        };

        let mut record = Record::new("@", zone_name, cf.ttl, rtype);
        record
            .set_label_from_fqdn(&cf.name, zone_name)
            .map_err(|e| self.record_error(e))?;
        self.populate(&mut record, &cf)?;

        if is_proxiable(rtype) {
            let proxied = if cf.proxied == Some(true) { "on" } else { "off" };
            record.metadata.insert(PROXY_KEY.to_string(), proxied.to_string());
        }
        if let Some(modified) = cf.modified_on {
            log::trace!("[cloudflare] {} last modified {modified}", cf.id);
        }
        record.set_original(NativeHandle::new(CloudflareHandle {
            zone_id: zone_id.to_string(),
            record_id: cf.id,
        }));
        record.normalize(&NormalizeOptions::default());
        Ok(Some(record))
    }

    fn populate(&self, record: &mut Record, cf: &CloudflareDnsRecord) -> Result<()> {
        let rtype = record.record_type();
        match rtype {
            RecordType::A | RecordType::Aaaa => record
                .set_target_ip(&cf.content)
                .map_err(|e| self.record_error(e))?,
            RecordType::Mx => record.set_target_mx(cf.priority.unwrap_or_default(), &cf.content),
            RecordType::Txt if cf.content.starts_with('"') => {
                let origin = record.origin().to_string();
                record
                    .populate_from_str(rtype, &cf.content, &origin)
                    .map_err(|e| self.record_error(e))?;
            }
            RecordType::Txt => record.set_target_txt(&cf.content),
            RecordType::Srv => {
                let d: CloudflareSrvData = self.data_of(cf)?;
                record.set_target_srv(d.priority, d.weight, d.port, &d.target);
            }
            RecordType::Caa => {
                let d: CloudflareCaaData = self.data_of(cf)?;
                record
                    .set_target_caa(d.flags, &d.tag, &d.value)
                    .map_err(|e| self.record_error(e))?;
            }
            RecordType::Tlsa => {
                let d: CloudflareTlsaData = self.data_of(cf)?;
                record
                    .set_target_tlsa(d.usage, d.selector, d.matching_type, &d.certificate)
                    .map_err(|e| self.record_error(e))?;
            }
            RecordType::Sshfp => {
                let d: CloudflareSshfpData = self.data_of(cf)?;
                record
                    .set_target_sshfp(d.algorithm, d.fingerprint_type, &d.fingerprint)
                    .map_err(|e| self.record_error(e))?;
            }
            RecordType::Ds => {
                let d: CloudflareDsData = self.data_of(cf)?;
                record
                    .set_target_ds(d.key_tag, d.algorithm, d.digest_type, &d.digest)
                    .map_err(|e| self.record_error(e))?;
            }
            RecordType::Dnskey => {
                let d: CloudflareDnskeyData = self.data_of(cf)?;
                record
                    .set_target_dnskey(d.flags, d.protocol, d.algorithm, &d.public_key)
                    .map_err(|e| self.record_error(e))?;
            }
            RecordType::Naptr => {
                let d: CloudflareNaptrData = self.data_of(cf)?;
                record.set_target_naptr(
                    d.order,
                    d.preference,
                    &d.flags,
                    &d.service,
                    &d.regex,
                    &d.replacement,
                );
            }
            RecordType::Https | RecordType::Svcb => {
                let d: CloudflareSvcbData = self.data_of(cf)?;
                record.set_target_svcb(d.priority, &d.target, &d.value);
            }
            // CNAME, NS, PTR
            _ => record.set_target(&cf.content),
        }
        Ok(())
    }

    /// Build the create/overwrite body for a record.
    pub(crate) fn record_to_body(&self, record: &Record) -> Result<CloudflareRecordBody> {
        let rtype = record.record_type();
        let mut body = CloudflareRecordBody {
            record_type: rtype.as_str().to_string(),
            name: record.fqdn().to_string(),
            content: None,
            ttl: record.ttl,
            priority: None,
            proxied: is_proxiable(rtype)
                .then(|| record.metadata.get(PROXY_KEY).is_some_and(|v| v == "on")),
            data: None,
        };

        match &record.data {
            RecordData::A { address } | RecordData::Aaaa { address } => {
                body.content = Some(address.clone());
            }
            RecordData::Cname { target } | RecordData::Ptr { target } => {
                body.content = Some(host(target));
            }
            RecordData::Ns { nameserver } => body.content = Some(host(nameserver)),
            RecordData::Mx {
                preference,
                exchange,
            } => {
                body.content = Some(host(exchange));
                body.priority = Some(*preference);
            }
            RecordData::Txt { strings } => {
                body.content = Some(match strings.as_slice() {
                    [single] => single.clone(),
                    many => many.iter().map(|s| quote_txt(s)).collect::<Vec<_>>().join(" "),
                });
            }
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                body.data = Some(self.to_data(&CloudflareSrvData {
                    priority: *priority,
                    weight: *weight,
                    port: *port,
                    target: host(target),
                })?);
            }
            RecordData::Caa { flag, tag, value } => {
                body.data = Some(self.to_data(&CloudflareCaaData {
                    flags: *flag,
                    tag: tag.clone(),
                    value: value.clone(),
                })?);
            }
            RecordData::Tlsa {
                usage,
                selector,
                matching_type,
                certificate,
            } => {
                body.data = Some(self.to_data(&CloudflareTlsaData {
                    usage: *usage,
                    selector: *selector,
                    matching_type: *matching_type,
                    certificate: certificate.clone(),
                })?);
            }
            RecordData::Sshfp {
                algorithm,
                fingerprint_type,
                fingerprint,
            } => {
                body.data = Some(self.to_data(&CloudflareSshfpData {
                    algorithm: *algorithm,
                    fingerprint_type: *fingerprint_type,
                    fingerprint: fingerprint.clone(),
                })?);
            }
            RecordData::Ds {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => {
                body.data = Some(self.to_data(&CloudflareDsData {
                    key_tag: *key_tag,
                    algorithm: *algorithm,
                    digest_type: *digest_type,
                    digest: digest.clone(),
                })?);
            }
            RecordData::Dnskey {
                flags,
                protocol,
                algorithm,
                public_key,
            } => {
                body.data = Some(self.to_data(&CloudflareDnskeyData {
                    flags: *flags,
                    protocol: *protocol,
                    algorithm: *algorithm,
                    public_key: public_key.clone(),
                })?);
            }
            RecordData::Naptr {
                order,
                preference,
                flags,
                service,
                regexp,
                replacement,
            } => {
                body.data = Some(self.to_data(&CloudflareNaptrData {
                    order: *order,
                    preference: *preference,
                    flags: flags.clone(),
                    service: service.clone(),
                    regex: regexp.clone(),
                    replacement: host(replacement),
                })?);
            }
            RecordData::Https {
                priority,
                target,
                params,
            }
            | RecordData::Svcb {
                priority,
                target,
                params,
            } => {
                body.data = Some(self.to_data(&CloudflareSvcbData {
                    priority: *priority,
                    target: host(target),
                    value: params.clone(),
                })?);
            }
            _ => {
                return Err(ProviderError::UnsupportedRecordType {
                    provider: self.provider_name().to_string(),
                    record_type: rtype.to_string(),
                });
            }
        }
        Ok(body)
    }
}
