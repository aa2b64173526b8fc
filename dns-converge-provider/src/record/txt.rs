//! TXT character-string helpers.

/// Maximum length of one DNS character-string, in bytes.
pub const TXT_SEGMENT_MAX: usize = 255;

/// Concatenate character-strings into the logical TXT value.
pub fn join_txt(strings: &[String]) -> String {
    strings.concat()
}

/// Split `s` into chunks of at most `max` bytes on UTF-8 boundaries.
///
/// An empty string yields one empty chunk.
pub fn split_txt(s: &str, max: usize) -> Vec<String> {
    if s.len() <= max || max == 0 {
        return vec![s.to_string()];
    }
    let mut chunks = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        // 单个字符超过 max 时（max < 4）整字符成段
        let cut = rest
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|&end| end <= max)
            .last()
            .unwrap_or_else(|| rest.chars().next().map_or(rest.len(), char::len_utf8));
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    chunks
}

/// Re-split TXT strings when any exceeds 255 bytes.
///
/// Returns `None` when nothing needs to change, so already-valid multi-string
/// records keep their author's segmentation.
pub fn autosplit(strings: &[String]) -> Option<Vec<String>> {
    if strings.iter().all(|s| s.len() <= TXT_SEGMENT_MAX) {
        return None;
    }
    Some(split_txt(&join_txt(strings), TXT_SEGMENT_MAX))
}

/// Quote one character-string for presentation format.
pub fn quote_txt(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii_control() => {
                out.push_str(&format!("\\{:03}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
