//! Presentation-format RDATA parsing.

use std::str::FromStr;

use super::loc::Loc;
use super::{Record, RecordData, RecordError, RecordType};

/// Split zone-file RDATA into fields.
///
/// Handles double-quoted strings, `\X` and `\DDD` escapes, parentheses
/// (ignored) and `;` comments. Quoted fields keep embedded spaces.
pub(crate) fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' => i += 1,
            b';' => break,
            b'"' => {
                i += 1;
                let mut buf = Vec::new();
                let mut closed = false;
                while i < bytes.len() {
                    match bytes[i] {
                        b'"' => {
                            closed = true;
                            i += 1;
                            break;
                        }
                        b'\\' => i = unescape(bytes, i, &mut buf)?,
                        b => {
                            buf.push(b);
                            i += 1;
                        }
                    }
                }
                if !closed {
                    return Err("unterminated quoted string".to_string());
                }
                tokens.push(utf8_token(buf)?);
            }
            _ => {
                let mut buf = Vec::new();
                while i < bytes.len() {
                    match bytes[i] {
                        b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b';' | b'"' => break,
                        b'\\' => i = unescape(bytes, i, &mut buf)?,
                        b => {
                            buf.push(b);
                            i += 1;
                        }
                    }
                }
                tokens.push(utf8_token(buf)?);
            }
        }
    }
    Ok(tokens)
}

/// `\DDD` escapes may produce any byte; the decoded field must still be UTF-8.
fn utf8_token(buf: Vec<u8>) -> Result<String, String> {
    String::from_utf8(buf).map_err(|e| {
        format!(
            "escaped bytes are not valid UTF-8 at offset {}",
            e.utf8_error().valid_up_to()
        )
    })
}

/// Decode the escape starting at `bytes[i] == b'\\'`; returns the next index.
fn unescape(bytes: &[u8], i: usize, buf: &mut Vec<u8>) -> Result<usize, String> {
    let rest = &bytes[i + 1..];
    if rest.len() >= 3 && rest[..3].iter().all(u8::is_ascii_digit) {
        let value = u32::from(rest[0] - b'0') * 100
            + u32::from(rest[1] - b'0') * 10
            + u32::from(rest[2] - b'0');
        let byte = u8::try_from(value).map_err(|_| format!("escape \\{value} out of range"))?;
        buf.push(byte);
        return Ok(i + 4);
    }
    match rest.first() {
        Some(&b) => {
            buf.push(b);
            Ok(i + 2)
        }
        None => Err("dangling backslash".to_string()),
    }
}

/// Resolve a possibly-relative hostname against `origin`.
///
/// `@` is the origin; names ending in `.` are absolute; anything else is
/// relative and gets the origin appended.
pub(crate) fn resolve_host(name: &str, origin: &str) -> String {
    let origin = origin.trim_end_matches('.');
    match name {
        "@" => format!("{origin}."),
        "." => ".".to_string(),
        n if n.ends_with('.') => n.to_string(),
        n if origin.is_empty() => format!("{n}."),
        n => format!("{n}.{origin}."),
    }
}

fn num<T: FromStr>(rtype: RecordType, rdata: &str, field: &str, raw: &str) -> Result<T, RecordError> {
    raw.parse::<T>()
        .map_err(|_| RecordError::invalid(rtype, rdata, format!("bad {field} '{raw}'")))
}

fn expect_len(
    rtype: RecordType,
    rdata: &str,
    tokens: &[String],
    min: usize,
    max: Option<usize>,
) -> Result<(), RecordError> {
    let n = tokens.len();
    let too_many = max.is_some_and(|m| n > m);
    if n < min || too_many {
        let expected = match max {
            Some(m) if m == min => format!("{min}"),
            Some(m) => format!("{min}..={m}"),
            None => format!("at least {min}"),
        };
        return Err(RecordError::invalid(
            rtype,
            rdata,
            format!("expected {expected} fields, got {n}"),
        ));
    }
    Ok(())
}

impl Record {
    /// Fill this record's RDATA from presentation text.
    ///
    /// Relative hostnames resolve against `origin`. TXT input that does not
    /// start with a double quote is taken literally as one string.
    pub fn populate_from_str(
        &mut self,
        rtype: RecordType,
        rdata: &str,
        origin: &str,
    ) -> Result<(), RecordError> {
        let invalid = |detail: String| RecordError::invalid(rtype, rdata, detail);

        if rtype == RecordType::Txt {
            if rdata.trim_start().starts_with('"') {
                let strings = tokenize(rdata).map_err(invalid)?;
                self.set_target_txts(strings);
            } else {
                self.set_target_txt(rdata);
            }
            return Ok(());
        }
        if rtype.is_custom() {
            self.data = RecordData::Custom {
                rtype,
                target: rdata.trim().to_string(),
            };
            return Ok(());
        }
        if rtype == RecordType::Loc {
            let loc = Loc::parse(rdata).map_err(invalid)?;
            self.set_target_loc(loc);
            return Ok(());
        }

        let t = tokenize(rdata).map_err(invalid)?;
        let host = |raw: &str| resolve_host(raw, origin);

        match rtype {
            RecordType::A | RecordType::Aaaa => {
                expect_len(rtype, rdata, &t, 1, Some(1))?;
                self.data = RecordData::empty(rtype);
                self.set_target_ip(&t[0])?;
            }
            RecordType::Cname | RecordType::Alias | RecordType::Ns | RecordType::Ptr => {
                expect_len(rtype, rdata, &t, 1, Some(1))?;
                self.data = RecordData::empty(rtype);
                self.set_target(&host(&t[0]));
            }
            RecordType::Mx => {
                expect_len(rtype, rdata, &t, 2, Some(2))?;
                let pref = num(rtype, rdata, "preference", &t[0])?;
                self.set_target_mx(pref, &host(&t[1]));
            }
            RecordType::Srv => {
                expect_len(rtype, rdata, &t, 4, Some(4))?;
                self.set_target_srv(
                    num(rtype, rdata, "priority", &t[0])?,
                    num(rtype, rdata, "weight", &t[1])?,
                    num(rtype, rdata, "port", &t[2])?,
                    &host(&t[3]),
                );
            }
            RecordType::Caa => {
                expect_len(rtype, rdata, &t, 3, Some(3))?;
                self.set_target_caa(num(rtype, rdata, "flag", &t[0])?, &t[1], &t[2])?;
            }
            RecordType::Tlsa => {
                expect_len(rtype, rdata, &t, 4, None)?;
                self.set_target_tlsa(
                    num(rtype, rdata, "usage", &t[0])?,
                    num(rtype, rdata, "selector", &t[1])?,
                    num(rtype, rdata, "matching type", &t[2])?,
                    &t[3..].concat(),
                )?;
            }
            RecordType::Sshfp => {
                expect_len(rtype, rdata, &t, 3, None)?;
                self.set_target_sshfp(
                    num(rtype, rdata, "algorithm", &t[0])?,
                    num(rtype, rdata, "fingerprint type", &t[1])?,
                    &t[2..].concat(),
                )?;
            }
            RecordType::Naptr => {
                expect_len(rtype, rdata, &t, 6, Some(6))?;
                self.set_target_naptr(
                    num(rtype, rdata, "order", &t[0])?,
                    num(rtype, rdata, "preference", &t[1])?,
                    &t[2],
                    &t[3],
                    &t[4],
                    &host(&t[5]),
                );
            }
            RecordType::Ds => {
                expect_len(rtype, rdata, &t, 4, None)?;
                self.set_target_ds(
                    num(rtype, rdata, "key tag", &t[0])?,
                    num(rtype, rdata, "algorithm", &t[1])?,
                    num(rtype, rdata, "digest type", &t[2])?,
                    &t[3..].concat(),
                )?;
            }
            RecordType::Dnskey => {
                expect_len(rtype, rdata, &t, 4, None)?;
                self.set_target_dnskey(
                    num(rtype, rdata, "flags", &t[0])?,
                    num(rtype, rdata, "protocol", &t[1])?,
                    num(rtype, rdata, "algorithm", &t[2])?,
                    &t[3..].concat(),
                )?;
            }
            RecordType::Soa => {
                expect_len(rtype, rdata, &t, 7, Some(7))?;
                self.set_target_soa(
                    &host(&t[0]),
                    &host(&t[1]),
                    num(rtype, rdata, "serial", &t[2])?,
                    num(rtype, rdata, "refresh", &t[3])?,
                    num(rtype, rdata, "retry", &t[4])?,
                    num(rtype, rdata, "expire", &t[5])?,
                    num(rtype, rdata, "minimum", &t[6])?,
                );
            }
            RecordType::Https | RecordType::Svcb => {
                expect_len(rtype, rdata, &t, 2, None)?;
                self.data = RecordData::empty(rtype);
                let target = if t[1] == "." { ".".to_string() } else { host(&t[1]) };
                self.set_target_svcb(num(rtype, rdata, "priority", &t[0])?, &target, &t[2..].join(" "));
            }
            // 上面已处理
            RecordType::Txt
            | RecordType::Loc
            | RecordType::Url
            | RecordType::Url301
            | RecordType::Frame
            | RecordType::CfRedirect
            | RecordType::CfTempRedirect => {}
        }
        Ok(())
    }
}
