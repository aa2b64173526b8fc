use std::fmt;
use std::net::IpAddr;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::loc::Loc;
use super::txt::{join_txt, quote_txt, split_txt, TXT_SEGMENT_MAX};
use super::{Record, RecordError, RecordType};

/// Type-specific RDATA.
///
/// Hostname fields are stored fully qualified with a trailing dot once a
/// record has been parsed or normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "UPPERCASE")]
pub enum RecordData {
    A {
        address: String,
    },
    Aaaa {
        address: String,
    },
    Cname {
        target: String,
    },
    Alias {
        target: String,
    },
    Ns {
        nameserver: String,
    },
    Ptr {
        target: String,
    },
    Mx {
        preference: u16,
        exchange: String,
    },
    Txt {
        strings: Vec<String>,
    },
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    Caa {
        flag: u8,
        tag: String,
        value: String,
    },
    Tlsa {
        usage: u8,
        selector: u8,
        matching_type: u8,
        certificate: String,
    },
    Sshfp {
        algorithm: u8,
        fingerprint_type: u8,
        fingerprint: String,
    },
    Naptr {
        order: u16,
        preference: u16,
        flags: String,
        service: String,
        regexp: String,
        replacement: String,
    },
    Ds {
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: String,
    },
    Dnskey {
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: String,
    },
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Loc(Loc),
    Https {
        priority: u16,
        target: String,
        params: String,
    },
    Svcb {
        priority: u16,
        target: String,
        params: String,
    },
    /// Provider pseudo types (URL, FRAME, `CF_REDIRECT`, ...): an opaque target.
    Custom {
        rtype: RecordType,
        target: String,
    },
}

impl RecordData {
    /// Empty RDATA for `rtype`.
    pub fn empty(rtype: RecordType) -> Self {
        match rtype {
            RecordType::A => Self::A {
                address: String::new(),
            },
            RecordType::Aaaa => Self::Aaaa {
                address: String::new(),
            },
            RecordType::Cname => Self::Cname {
                target: String::new(),
            },
            RecordType::Alias => Self::Alias {
                target: String::new(),
            },
            RecordType::Ns => Self::Ns {
                nameserver: String::new(),
            },
            RecordType::Ptr => Self::Ptr {
                target: String::new(),
            },
            RecordType::Mx => Self::Mx {
                preference: 0,
                exchange: String::new(),
            },
            RecordType::Txt => Self::Txt {
                strings: Vec::new(),
            },
            RecordType::Srv => Self::Srv {
                priority: 0,
                weight: 0,
                port: 0,
                target: String::new(),
            },
            RecordType::Caa => Self::Caa {
                flag: 0,
                tag: String::new(),
                value: String::new(),
            },
            RecordType::Tlsa => Self::Tlsa {
                usage: 0,
                selector: 0,
                matching_type: 0,
                certificate: String::new(),
            },
            RecordType::Sshfp => Self::Sshfp {
                algorithm: 0,
                fingerprint_type: 0,
                fingerprint: String::new(),
            },
            RecordType::Naptr => Self::Naptr {
                order: 0,
                preference: 0,
                flags: String::new(),
                service: String::new(),
                regexp: String::new(),
                replacement: String::new(),
            },
            RecordType::Ds => Self::Ds {
                key_tag: 0,
                algorithm: 0,
                digest_type: 0,
                digest: String::new(),
            },
            RecordType::Dnskey => Self::Dnskey {
                flags: 0,
                protocol: 3,
                algorithm: 0,
                public_key: String::new(),
            },
            RecordType::Soa => Self::Soa {
                mname: String::new(),
                rname: String::new(),
                serial: 0,
                refresh: 0,
                retry: 0,
                expire: 0,
                minimum: 0,
            },
            RecordType::Loc => Self::Loc(Loc::default()),
            RecordType::Https => Self::Https {
                priority: 0,
                target: String::new(),
                params: String::new(),
            },
            RecordType::Svcb => Self::Svcb {
                priority: 0,
                target: String::new(),
                params: String::new(),
            },
            custom => Self::Custom {
                rtype: custom,
                target: String::new(),
            },
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            Self::A { .. } => RecordType::A,
            Self::Aaaa { .. } => RecordType::Aaaa,
            Self::Cname { .. } => RecordType::Cname,
            Self::Alias { .. } => RecordType::Alias,
            Self::Ns { .. } => RecordType::Ns,
            Self::Ptr { .. } => RecordType::Ptr,
            Self::Mx { .. } => RecordType::Mx,
            Self::Txt { .. } => RecordType::Txt,
            Self::Srv { .. } => RecordType::Srv,
            Self::Caa { .. } => RecordType::Caa,
            Self::Tlsa { .. } => RecordType::Tlsa,
            Self::Sshfp { .. } => RecordType::Sshfp,
            Self::Naptr { .. } => RecordType::Naptr,
            Self::Ds { .. } => RecordType::Ds,
            Self::Dnskey { .. } => RecordType::Dnskey,
            Self::Soa { .. } => RecordType::Soa,
            Self::Loc(_) => RecordType::Loc,
            Self::Https { .. } => RecordType::Https,
            Self::Svcb { .. } => RecordType::Svcb,
            Self::Custom { rtype, .. } => *rtype,
        }
    }

    /// The primary target.
    pub fn target(&self) -> String {
        match self {
            Self::A { address } | Self::Aaaa { address } => address.clone(),
            Self::Cname { target }
            | Self::Alias { target }
            | Self::Ptr { target }
            | Self::Srv { target, .. }
            | Self::Https { target, .. }
            | Self::Svcb { target, .. }
            | Self::Custom { target, .. } => target.clone(),
            Self::Ns { nameserver } => nameserver.clone(),
            Self::Mx { exchange, .. } => exchange.clone(),
            Self::Txt { strings } => join_txt(strings),
            Self::Caa { value, .. } => value.clone(),
            Self::Tlsa { certificate, .. } => certificate.clone(),
            Self::Sshfp { fingerprint, .. } => fingerprint.clone(),
            Self::Naptr { replacement, .. } => replacement.clone(),
            Self::Ds { digest, .. } => digest.clone(),
            Self::Dnskey { public_key, .. } => public_key.clone(),
            Self::Soa { mname, .. } => mname.clone(),
            Self::Loc(loc) => loc.to_string(),
        }
    }

    /// Every RDATA component as a string, in wire order.
    pub fn fields(&self) -> Vec<String> {
        match self {
            Self::Mx {
                preference,
                exchange,
            } => vec![preference.to_string(), exchange.clone()],
            Self::Txt { strings } => strings.clone(),
            Self::Srv {
                priority,
                weight,
                port,
                target,
            } => vec![
                priority.to_string(),
                weight.to_string(),
                port.to_string(),
                target.clone(),
            ],
            Self::Caa { flag, tag, value } => vec![flag.to_string(), tag.clone(), value.clone()],
            Self::Tlsa {
                usage,
                selector,
                matching_type,
                certificate,
            } => vec![
                usage.to_string(),
                selector.to_string(),
                matching_type.to_string(),
                certificate.clone(),
            ],
            Self::Sshfp {
                algorithm,
                fingerprint_type,
                fingerprint,
            } => vec![
                algorithm.to_string(),
                fingerprint_type.to_string(),
                fingerprint.clone(),
            ],
            Self::Naptr {
                order,
                preference,
                flags,
                service,
                regexp,
                replacement,
            } => vec![
                order.to_string(),
                preference.to_string(),
                flags.clone(),
                service.clone(),
                regexp.clone(),
                replacement.clone(),
            ],
            Self::Ds {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => vec![
                key_tag.to_string(),
                algorithm.to_string(),
                digest_type.to_string(),
                digest.clone(),
            ],
            Self::Dnskey {
                flags,
                protocol,
                algorithm,
                public_key,
            } => vec![
                flags.to_string(),
                protocol.to_string(),
                algorithm.to_string(),
                public_key.clone(),
            ],
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => vec![
                mname.clone(),
                rname.clone(),
                serial.to_string(),
                refresh.to_string(),
                retry.to_string(),
                expire.to_string(),
                minimum.to_string(),
            ],
            Self::Loc(loc) => loc.to_string().split(' ').map(String::from).collect(),
            Self::Https {
                priority,
                target,
                params,
            }
            | Self::Svcb {
                priority,
                target,
                params,
            } => vec![priority.to_string(), target.clone(), params.clone()],
            other => vec![other.target()],
        }
    }

    /// Canonicalize case and spelling so equal data compares equal.
    pub(crate) fn canonicalize(&mut self) {
        match self {
            Self::A { address } | Self::Aaaa { address } => {
                if let Ok(ip) = address.trim().parse::<IpAddr>() {
                    *address = ip.to_string();
                }
            }
            Self::Cname { target }
            | Self::Alias { target }
            | Self::Ptr { target }
            | Self::Srv { target, .. }
            | Self::Https { target, .. }
            | Self::Svcb { target, .. } => *target = canonical_host(target),
            Self::Ns { nameserver } => *nameserver = canonical_host(nameserver),
            Self::Mx { exchange, .. } => *exchange = canonical_host(exchange),
            Self::Naptr { replacement, .. } => *replacement = canonical_host(replacement),
            Self::Caa { tag, value, .. } => {
                *tag = tag.to_ascii_lowercase();
                if tag == "issue" || tag == "issuewild" {
                    *value = value.to_lowercase();
                }
            }
            Self::Tlsa {
                certificate: hexdata,
                ..
            }
            | Self::Sshfp {
                fingerprint: hexdata,
                ..
            }
            | Self::Ds {
                digest: hexdata, ..
            } => *hexdata = strip_whitespace(hexdata).to_ascii_lowercase(),
            Self::Dnskey { public_key, .. } => *public_key = strip_whitespace(public_key),
            Self::Soa { mname, rname, .. } => {
                *mname = canonical_host(mname);
                *rname = canonical_host(rname);
            }
            Self::Txt { .. } | Self::Loc(_) | Self::Custom { .. } => {}
        }
    }
}

/// Lower-case a hostname and make it fully qualified. Empty stays empty.
pub(crate) fn canonical_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    if host.is_empty() || host.ends_with('.') {
        host
    } else {
        format!("{host}.")
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Txt { strings } => {
                if strings.is_empty() {
                    return f.write_str("\"\"");
                }
                let quoted: Vec<String> = strings.iter().map(|s| quote_txt(s)).collect();
                f.write_str(&quoted.join(" "))
            }
            Self::Caa { flag, tag, value } => write!(f, "{flag} {tag} {}", quote_txt(value)),
            Self::Naptr {
                order,
                preference,
                flags,
                service,
                regexp,
                replacement,
            } => write!(
                f,
                "{order} {preference} {} {} {} {replacement}",
                quote_txt(flags),
                quote_txt(service),
                quote_txt(regexp)
            ),
            Self::Https {
                priority,
                target,
                params,
            }
            | Self::Svcb {
                priority,
                target,
                params,
            } => {
                if params.is_empty() {
                    write!(f, "{priority} {target}")
                } else {
                    write!(f, "{priority} {target} {params}")
                }
            }
            Self::Loc(loc) => write!(f, "{loc}"),
            other => f.write_str(&other.fields().join(" ")),
        }
    }
}

// ============ Typed setters ============

fn parse_ip(rtype: RecordType, raw: &str) -> Result<IpAddr, RecordError> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| RecordError::invalid(rtype, raw, "not an IP address"))
}

fn require_hex(rtype: RecordType, raw: &str) -> Result<String, RecordError> {
    let cleaned = strip_whitespace(raw).to_ascii_lowercase();
    hex::decode(&cleaned).map_err(|e| RecordError::invalid(rtype, raw, format!("bad hex: {e}")))?;
    Ok(cleaned)
}

fn require_base64(rtype: RecordType, raw: &str) -> Result<String, RecordError> {
    let cleaned = strip_whitespace(raw);
    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| RecordError::invalid(rtype, raw, format!("bad base64: {e}")))?;
    Ok(cleaned)
}

impl Record {
    /// Set the primary target, keeping the other RDATA fields.
    ///
    /// For TXT this replaces the whole record with a single string.
    pub fn set_target(&mut self, target: &str) {
        let target = target.to_string();
        match &mut self.data {
            RecordData::A { address } | RecordData::Aaaa { address } => *address = target,
            RecordData::Cname { target: t }
            | RecordData::Alias { target: t }
            | RecordData::Ptr { target: t }
            | RecordData::Srv { target: t, .. }
            | RecordData::Https { target: t, .. }
            | RecordData::Svcb { target: t, .. }
            | RecordData::Custom { target: t, .. } => *t = target,
            RecordData::Ns { nameserver } => *nameserver = target,
            RecordData::Mx { exchange, .. } => *exchange = target,
            RecordData::Txt { strings } => *strings = vec![target],
            RecordData::Caa { value, .. } => *value = target,
            RecordData::Tlsa { certificate, .. } => *certificate = target,
            RecordData::Sshfp { fingerprint, .. } => *fingerprint = target,
            RecordData::Naptr { replacement, .. } => *replacement = target,
            RecordData::Ds { digest, .. } => *digest = target,
            RecordData::Dnskey { public_key, .. } => *public_key = target,
            RecordData::Soa { mname, .. } => *mname = target,
            RecordData::Loc(loc) => {
                if let Ok(parsed) = Loc::parse(&target) {
                    *loc = parsed;
                }
            }
        }
    }

    /// Set an A/AAAA address; the family must match the record type.
    pub fn set_target_ip(&mut self, ip: &str) -> Result<(), RecordError> {
        let rtype = self.record_type();
        let parsed = parse_ip(rtype, ip)?;
        self.data = match (rtype, parsed) {
            (RecordType::A, IpAddr::V4(v4)) => RecordData::A {
                address: v4.to_string(),
            },
            (RecordType::Aaaa, IpAddr::V6(v6)) => RecordData::Aaaa {
                address: v6.to_string(),
            },
            (RecordType::A, IpAddr::V6(_)) => {
                return Err(RecordError::invalid(rtype, ip, "expected an IPv4 address"));
            }
            (RecordType::Aaaa, IpAddr::V4(_)) => {
                return Err(RecordError::invalid(rtype, ip, "expected an IPv6 address"));
            }
            _ => return Err(RecordError::invalid(rtype, ip, "not an address record")),
        };
        Ok(())
    }

    pub fn set_target_mx(&mut self, preference: u16, exchange: &str) {
        self.data = RecordData::Mx {
            preference,
            exchange: exchange.to_string(),
        };
    }

    pub fn set_target_srv(&mut self, priority: u16, weight: u16, port: u16, target: &str) {
        self.data = RecordData::Srv {
            priority,
            weight,
            port,
            target: target.to_string(),
        };
    }

    pub fn set_target_caa(&mut self, flag: u8, tag: &str, value: &str) -> Result<(), RecordError> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RecordError::invalid(
                RecordType::Caa,
                tag,
                "tag must be non-empty ASCII alphanumerics",
            ));
        }
        self.data = RecordData::Caa {
            flag,
            tag: tag.to_ascii_lowercase(),
            value: value.to_string(),
        };
        Ok(())
    }

    pub fn set_target_tlsa(
        &mut self,
        usage: u8,
        selector: u8,
        matching_type: u8,
        certificate: &str,
    ) -> Result<(), RecordError> {
        let certificate = require_hex(RecordType::Tlsa, certificate)?;
        self.data = RecordData::Tlsa {
            usage,
            selector,
            matching_type,
            certificate,
        };
        Ok(())
    }

    pub fn set_target_sshfp(
        &mut self,
        algorithm: u8,
        fingerprint_type: u8,
        fingerprint: &str,
    ) -> Result<(), RecordError> {
        let fingerprint = require_hex(RecordType::Sshfp, fingerprint)?;
        self.data = RecordData::Sshfp {
            algorithm,
            fingerprint_type,
            fingerprint,
        };
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_target_naptr(
        &mut self,
        order: u16,
        preference: u16,
        flags: &str,
        service: &str,
        regexp: &str,
        replacement: &str,
    ) {
        self.data = RecordData::Naptr {
            order,
            preference,
            flags: flags.to_string(),
            service: service.to_string(),
            regexp: regexp.to_string(),
            replacement: replacement.to_string(),
        };
    }

    pub fn set_target_ds(
        &mut self,
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: &str,
    ) -> Result<(), RecordError> {
        let digest = require_hex(RecordType::Ds, digest)?;
        self.data = RecordData::Ds {
            key_tag,
            algorithm,
            digest_type,
            digest,
        };
        Ok(())
    }

    pub fn set_target_dnskey(
        &mut self,
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: &str,
    ) -> Result<(), RecordError> {
        let public_key = require_base64(RecordType::Dnskey, public_key)?;
        self.data = RecordData::Dnskey {
            flags,
            protocol,
            algorithm,
            public_key,
        };
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_target_soa(
        &mut self,
        mname: &str,
        rname: &str,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    ) {
        self.data = RecordData::Soa {
            mname: mname.to_string(),
            rname: rname.to_string(),
            serial,
            refresh,
            retry,
            expire,
            minimum,
        };
    }

    pub fn set_target_loc(&mut self, loc: Loc) {
        self.data = RecordData::Loc(loc);
    }

    /// Set HTTPS or SVCB data; any other record type becomes SVCB.
    pub fn set_target_svcb(&mut self, priority: u16, target: &str, params: &str) {
        let target = target.to_string();
        let params = params.trim().to_string();
        self.data = if self.record_type() == RecordType::Https {
            RecordData::Https {
                priority,
                target,
                params,
            }
        } else {
            RecordData::Svcb {
                priority,
                target,
                params,
            }
        };
    }

    /// Set TXT data from one logical string. Strings longer than one
    /// character-string are kept whole; autosplit happens at normalization.
    pub fn set_target_txt(&mut self, text: &str) {
        self.data = RecordData::Txt {
            strings: vec![text.to_string()],
        };
    }

    /// Set TXT data from explicit character-strings.
    pub fn set_target_txts<I, S>(&mut self, strings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data = RecordData::Txt {
            strings: strings.into_iter().map(Into::into).collect(),
        };
    }

    /// TXT data split into character-strings that each fit 255 bytes.
    pub fn txt_segments(&self) -> Vec<String> {
        match &self.data {
            RecordData::Txt { strings } => strings
                .iter()
                .flat_map(|s| split_txt(s, TXT_SEGMENT_MAX))
                .collect(),
            _ => Vec::new(),
        }
    }
}
