//! Canonicalization applied to both desired and existing records before diffing.

use std::fmt;
use std::sync::Arc;

use super::txt::autosplit;
use super::{Record, RecordData};

/// Provider TTL normalization hook (e.g. clamp to the provider's range).
pub type TtlHook = Arc<dyn Fn(u32) -> u32 + Send + Sync>;

/// Options for [`Record::normalize`].
#[derive(Clone, Default)]
pub struct NormalizeOptions {
    /// Re-split TXT strings longer than 255 bytes.
    pub autosplit_txt: bool,
    /// Applied to the TTL after canonicalization.
    pub ttl_hook: Option<TtlHook>,
}

impl NormalizeOptions {
    #[must_use]
    pub fn with_autosplit(mut self, autosplit_txt: bool) -> Self {
        self.autosplit_txt = autosplit_txt;
        self
    }

    #[must_use]
    pub fn with_ttl_hook(mut self, hook: TtlHook) -> Self {
        self.ttl_hook = Some(hook);
        self
    }
}

impl fmt::Debug for NormalizeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizeOptions")
            .field("autosplit_txt", &self.autosplit_txt)
            .field("ttl_hook", &self.ttl_hook.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

fn canonical_label(label: &str) -> String {
    let label = label.trim_end_matches('.').to_lowercase();
    if label.is_empty() {
        "@".to_string()
    } else {
        label
    }
}

impl Record {
    /// Canonicalize in place. Running it twice changes nothing.
    pub fn normalize(&mut self, opts: &NormalizeOptions) {
        self.label = canonical_label(&self.label);
        self.fqdn = self.fqdn.trim_end_matches('.').to_lowercase();
        self.data.canonicalize();

        if opts.autosplit_txt
            && let RecordData::Txt { strings } = &mut self.data
            && let Some(split) = autosplit(strings)
        {
            *strings = split;
        }
        if let Some(hook) = &opts.ttl_hook {
            self.ttl = hook(self.ttl);
        }
    }
}

/// Normalize every record, returning the canonical list.
pub fn normalize_records(
    records: impl IntoIterator<Item = Record>,
    opts: &NormalizeOptions,
) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut r| {
            r.normalize(opts);
            r
        })
        .collect()
}
