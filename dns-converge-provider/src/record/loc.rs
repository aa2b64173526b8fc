//! LOC RDATA (RFC 1876).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Latitude/longitude of the equator/prime meridian, in thousandths of an arc second.
const EQUATOR: u32 = 1 << 31;
/// Altitude zero: 100 000 m below the WGS 84 spheroid, in centimetres.
const ALTITUDE_BASE: i64 = 10_000_000;

/// Wire-format LOC data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loc {
    pub version: u8,
    pub size: u8,
    pub horiz_pre: u8,
    pub vert_pre: u8,
    pub latitude: u32,
    pub longitude: u32,
    pub altitude: u32,
}

impl Default for Loc {
    fn default() -> Self {
        Self {
            version: 0,
            size: 0x12,      // 1m
            horiz_pre: 0x16, // 10 000m
            vert_pre: 0x13,  // 10m
            latitude: EQUATOR,
            longitude: EQUATOR,
            altitude: 10_000_000,
        }
    }
}

impl Loc {
    /// Parse `d1 [m1 [s1]] {N|S} d2 [m2 [s2]] {E|W} alt[m] [siz[m] [hp[m] [vp[m]]]]`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        let mut pos = 0;

        let latitude = parse_coord(&tokens, &mut pos, ('N', 'S'), 90)?;
        let longitude = parse_coord(&tokens, &mut pos, ('E', 'W'), 180)?;

        let alt_raw = tokens.get(pos).ok_or("missing altitude")?;
        pos += 1;
        let alt_cm = metres_to_cm(alt_raw)? + ALTITUDE_BASE;
        let altitude = u32::try_from(alt_cm).map_err(|_| format!("altitude {alt_raw} out of range"))?;

        let mut loc = Self {
            latitude,
            longitude,
            altitude,
            ..Self::default()
        };
        for field in [&mut loc.size, &mut loc.horiz_pre, &mut loc.vert_pre] {
            let Some(raw) = tokens.get(pos) else { break };
            pos += 1;
            let cm = metres_to_cm(raw)?;
            *field = encode_precision(u64::try_from(cm).map_err(|_| format!("negative size {raw}"))?);
        }
        if pos != tokens.len() {
            return Err(format!("trailing fields after LOC data: {}", tokens[pos..].join(" ")));
        }
        Ok(loc)
    }
}

fn parse_coord(
    tokens: &[&str],
    pos: &mut usize,
    (positive, negative): (char, char),
    max_deg: u64,
) -> Result<u32, String> {
    let is_hemisphere = |t: &str| {
        let up = t.to_ascii_uppercase();
        up == positive.to_string() || up == negative.to_string()
    };

    let mut parts: Vec<&str> = Vec::new();
    while let Some(t) = tokens.get(*pos) {
        *pos += 1;
        if is_hemisphere(t) {
            let deg: u64 = parts
                .first()
                .ok_or("missing degrees")?
                .parse()
                .map_err(|_| format!("bad degrees '{}'", parts[0]))?;
            let min: u64 = match parts.get(1) {
                Some(m) => m.parse().map_err(|_| format!("bad minutes '{m}'"))?,
                None => 0,
            };
            let sec: f64 = match parts.get(2) {
                Some(s) => s.parse().map_err(|_| format!("bad seconds '{s}'"))?,
                None => 0.0,
            };
            if deg > max_deg || min >= 60 || !(0.0..60.0).contains(&sec) {
                return Err(format!("coordinate out of range: {}", parts.join(" ")));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let ms = (deg * 3600 + min * 60) * 1000 + (sec * 1000.0).round() as u64;
            let ms = i64::try_from(ms).map_err(|_| "coordinate overflow".to_string())?;
            let signed = if t.eq_ignore_ascii_case(&positive.to_string()) {
                i64::from(EQUATOR) + ms
            } else {
                i64::from(EQUATOR) - ms
            };
            return u32::try_from(signed).map_err(|_| "coordinate overflow".to_string());
        }
        if parts.len() == 3 {
            return Err(format!("expected {positive} or {negative}, got '{t}'"));
        }
        parts.push(t);
    }
    Err(format!("missing {positive}/{negative} hemisphere"))
}

fn metres_to_cm(raw: &str) -> Result<i64, String> {
    let value: f64 = raw
        .trim_end_matches(['m', 'M'])
        .parse()
        .map_err(|_| format!("bad distance '{raw}'"))?;
    #[allow(clippy::cast_possible_truncation)]
    Ok((value * 100.0).round() as i64)
}

/// Encode centimetres as RFC 1876 mantissa/exponent (rounding down).
fn encode_precision(mut cm: u64) -> u8 {
    let mut exponent = 0u8;
    while cm > 9 && exponent < 9 {
        cm /= 10;
        exponent += 1;
    }
    #[allow(clippy::cast_possible_truncation)]
    let mantissa = cm.min(9) as u8;
    (mantissa << 4) | exponent
}

fn decode_precision(b: u8) -> u64 {
    u64::from(b >> 4) * 10u64.pow(u32::from(b & 0x0f))
}

fn format_metres(cm: i64) -> String {
    if cm % 100 == 0 {
        format!("{}m", cm / 100)
    } else {
        #[allow(clippy::cast_precision_loss)]
        let m = cm as f64 / 100.0;
        format!("{m:.2}m")
    }
}

fn format_coord(value: u32, (positive, negative): (char, char)) -> String {
    let offset = i64::from(value) - i64::from(EQUATOR);
    let hemisphere = if offset >= 0 { positive } else { negative };
    let ms = offset.unsigned_abs();
    let deg = ms / 3_600_000;
    let min = (ms % 3_600_000) / 60_000;
    let sec_ms = ms % 60_000;
    format!("{deg} {min} {}.{:03} {hemisphere}", sec_ms / 1000, sec_ms % 1000)
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[allow(clippy::cast_possible_wrap)]
        let size = |b: u8| format_metres(decode_precision(b) as i64);
        write!(
            f,
            "{} {} {} {} {} {}",
            format_coord(self.latitude, ('N', 'S')),
            format_coord(self.longitude, ('E', 'W')),
            format_metres(i64::from(self.altitude) - ALTITUDE_BASE),
            size(self.size),
            size(self.horiz_pre),
            size(self.vert_pre),
        )
    }
}
