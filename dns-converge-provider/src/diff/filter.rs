//! Ignore rules (`IgnoredNames` / `IgnoredTargets`) compiled to glob patterns.
//!
//! Names are matched label-wise: dots become path separators so `*` never
//! spans a label boundary and `**` spans any number of labels.

use glob::{MatchOptions, Pattern};

use super::DiffError;
use crate::domain::IgnoreTarget;
use crate::record::{Record, RecordType};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn as_path(name: &str) -> String {
    name.trim_end_matches('.').replace('.', "/")
}

fn compile(raw: &str) -> Result<Pattern, DiffError> {
    Pattern::new(&as_path(raw)).map_err(|e| DiffError::InvalidPattern {
        pattern: raw.to_string(),
        detail: e.to_string(),
    })
}

#[derive(Debug, Default)]
pub struct IgnoreFilter {
    names: Vec<(String, Pattern)>,
    targets: Vec<(String, RecordType, Pattern)>,
}

impl IgnoreFilter {
    /// Compile the rules. Any invalid pattern is an error.
    pub fn new(names: &[String], targets: &[IgnoreTarget]) -> Result<Self, DiffError> {
        let names = names
            .iter()
            .map(|raw| compile(raw).map(|p| (raw.clone(), p)))
            .collect::<Result<Vec<_>, _>>()?;
        let targets = targets
            .iter()
            .map(|t| compile(&t.pattern).map(|p| (t.pattern.clone(), t.record_type, p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { names, targets })
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.targets.is_empty()
    }

    /// The first rule that covers `record`, rendered for error messages.
    pub fn matching_rule(&self, record: &Record) -> Option<String> {
        let label = as_path(record.label());
        let fqdn = as_path(record.fqdn());
        if let Some((raw, _)) = self
            .names
            .iter()
            .find(|(_, p)| p.matches_with(&label, MATCH_OPTIONS) || p.matches_with(&fqdn, MATCH_OPTIONS))
        {
            return Some(format!("ignored name '{raw}'"));
        }

        let rtype = record.record_type();
        let target = as_path(&record.target());
        self.targets
            .iter()
            .find(|(_, t, p)| *t == rtype && p.matches_with(&target, MATCH_OPTIONS))
            .map(|(raw, t, _)| format!("ignored target '{raw}' ({t})"))
    }
}
