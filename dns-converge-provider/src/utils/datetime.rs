//! 日期时间序列化/反序列化工具
//!
//! 反序列化 provider 返回的时间字段：RFC3339 字符串或 Unix 时间戳 -> `DateTime`<Utc>；
//! 另外供 rate limiter 解析 reset 时间戳。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// 反序列化：支持 RFC3339 字符串或 Unix 时间戳（秒/毫秒自动识别）
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OptionalTimestamp {
        String(String),
        I64(i64),
        U64(u64),
    }

    match Option::<OptionalTimestamp>::deserialize(deserializer)? {
        Some(OptionalTimestamp::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| Error::custom(format!("Invalid RFC3339 timestamp: {e}"))),
        Some(OptionalTimestamp::I64(ts)) => parse_unix_timestamp(ts)
            .map(Some)
            .ok_or_else(|| Error::custom("Invalid Unix timestamp")),
        Some(OptionalTimestamp::U64(ts)) => i64::try_from(ts)
            .ok()
            .and_then(parse_unix_timestamp)
            .map(Some)
            .ok_or_else(|| Error::custom("Invalid Unix timestamp")),
        None => Ok(None),
    }
}

/// 解析 Unix 时间戳（自动判断秒/毫秒）
pub(crate) fn parse_unix_timestamp(ts: i64) -> Option<DateTime<Utc>> {
    // 如果时间戳 > 10^11，认为是毫秒（部分 API 返回毫秒时间戳）
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        // 否则认为是秒
        DateTime::from_timestamp(ts, 0)
    }
}
