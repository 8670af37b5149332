//! Payer code tables and key lookup
//!
//! Two kinds of table live here:
//!
//! - [`CodeTable`]: domain value → payer code (relationship, sex). A missing
//!   entry is an error; we never invent a code.
//! - [`RejectCodeCatalog`]: payer code → human-readable reason. A missing entry
//!   falls back to the raw code.
//!
//! Some payers are inconsistent about the text they send back (column headers,
//! reject code casing). [`fuzzy_find`] makes the fallback explicit as a list of
//! stages, each tried only when the previous found nothing:
//!
//! 1. `Exact` - byte-for-byte equality
//! 2. `Normalized` - equality after lower-casing and dropping everything that is
//!    not ASCII alphanumeric (`"Reject_Code"` == `"reject code"`)
//! 3. `Substring` - one normalized string contains the other
//!
//! A stage that matches more than one candidate is ambiguous and stops the
//! search: guessing between two columns is worse than reporting neither.

use crate::types::AccumulationError;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Which lookup stage produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Normalized,
    Substring,
}

/// Result of a staged lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Index of the matching candidate and the stage that matched
    Found(usize, MatchKind),
    /// A stage matched this many candidates
    Ambiguous(usize),
    Missing,
}

/// Lower-case, ASCII alphanumerics only
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Find `needle` among `candidates` using exact, then fuzzy stages
pub fn fuzzy_find<S: AsRef<str>>(needle: &str, candidates: &[S]) -> Lookup {
    if let Some(index) = candidates.iter().position(|c| c.as_ref() == needle) {
        return Lookup::Found(index, MatchKind::Exact);
    }

    let normalized_needle = normalize_key(needle);
    if normalized_needle.is_empty() {
        return Lookup::Missing;
    }
    let normalized: Vec<String> = candidates.iter().map(|c| normalize_key(c.as_ref())).collect();

    let stages: [(MatchKind, &dyn Fn(&str) -> bool); 2] = [
        (MatchKind::Normalized, &|c: &str| c == normalized_needle),
        (MatchKind::Substring, &|c: &str| {
            !c.is_empty() && (c.contains(normalized_needle.as_str()) || normalized_needle.contains(c))
        }),
    ];

    for (kind, matches) in stages {
        let hits: Vec<usize> = normalized
            .iter()
            .enumerate()
            .filter(|(_, c)| matches(c))
            .map(|(i, _)| i)
            .collect();
        match hits.as_slice() {
            [] => continue,
            [index] => return Lookup::Found(*index, kind),
            many => return Lookup::Ambiguous(many.len()),
        }
    }

    Lookup::Missing
}

/// Domain value → payer code
#[derive(Debug, Clone)]
pub struct CodeTable<K> {
    name: &'static str,
    entries: HashMap<K, &'static str>,
}

impl<K: Copy + Eq + Hash + Debug> CodeTable<K> {
    pub fn new(name: &'static str, pairs: &[(K, &'static str)]) -> Self {
        Self {
            name,
            entries: pairs.iter().copied().collect(),
        }
    }

    /// # Errors
    ///
    /// `UnmappedCode` when the payer has no code for `key`
    pub fn code(&self, key: K) -> Result<&'static str, AccumulationError> {
        self.entries
            .get(&key)
            .copied()
            .ok_or_else(|| AccumulationError::unmapped_code(self.name, key))
    }
}

/// How a reject catalog matches incoming codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    Exact,
    Fuzzy,
}

/// Reject/acknowledgement code → reason, for one payer
#[derive(Debug, Clone)]
pub struct RejectCodeCatalog {
    codes: Vec<&'static str>,
    reasons: Vec<&'static str>,
    key_match: KeyMatch,
}

impl RejectCodeCatalog {
    pub fn new(entries: &[(&'static str, &'static str)], key_match: KeyMatch) -> Self {
        Self {
            codes: entries.iter().map(|(code, _)| *code).collect(),
            reasons: entries.iter().map(|(_, reason)| *reason).collect(),
            key_match,
        }
    }

    /// Look a code up, reporting which stage matched
    pub fn lookup(&self, code: &str) -> Option<(&'static str, MatchKind)> {
        let code = code.trim();
        let found = match self.key_match {
            KeyMatch::Exact => self
                .codes
                .iter()
                .position(|c| *c == code)
                .map(|i| (i, MatchKind::Exact)),
            KeyMatch::Fuzzy => match fuzzy_find(code, &self.codes) {
                // Substring hits on short codes ("E1" inside "E12") are too loose
                Lookup::Found(i, kind) if kind != MatchKind::Substring => Some((i, kind)),
                _ => None,
            },
        };
        found.map(|(i, kind)| (self.reasons[i], kind))
    }

    /// Human-readable reason, or the raw code when the catalog has no entry
    pub fn reason(&self, code: &str) -> String {
        match self.lookup(code) {
            Some((reason, _)) => reason.to_string(),
            None => code.trim().to_string(),
        }
    }
}

/// Canonical response column and the header texts it has been seen under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAlias {
    pub canonical: &'static str,
    pub headers: &'static [&'static str],
    pub required: bool,
}

/// Map canonical column names to positions in a header row
///
/// Every alias of a column is tried through every stage before the next stage
/// is attempted, so an exact match on a later alias beats a fuzzy match on an
/// earlier one.
///
/// # Errors
///
/// `UnresolvedColumn` when a required column is missing or ambiguous.
pub fn resolve_columns(
    columns: &[ColumnAlias],
    header_row: &[String],
) -> Result<HashMap<&'static str, usize>, AccumulationError> {
    let mut resolved = HashMap::new();

    for column in columns {
        let position = resolve_column(column, header_row);
        match position {
            Some(index) => {
                resolved.insert(column.canonical, index);
            }
            None if column.required => {
                return Err(AccumulationError::unresolved_column(column.canonical))
            }
            None => log::debug!("optional response column {} not present", column.canonical),
        }
    }

    Ok(resolved)
}

fn resolve_column(column: &ColumnAlias, header_row: &[String]) -> Option<usize> {
    let mut best: Option<(usize, MatchKind)> = None;
    for alias in column.headers {
        match fuzzy_find(alias, header_row) {
            Lookup::Found(index, MatchKind::Exact) => return Some(index),
            Lookup::Found(index, kind) => {
                let better = match best {
                    None => true,
                    Some((_, best_kind)) => kind == MatchKind::Normalized && best_kind == MatchKind::Substring,
                };
                if better {
                    best = Some((index, kind));
                }
            }
            Lookup::Ambiguous(count) => {
                log::warn!(
                    "response header '{}' matches {} columns for {}",
                    alias,
                    count,
                    column.canonical
                );
            }
            Lookup::Missing => {}
        }
    }
    if let Some((index, kind)) = best {
        log::debug!(
            "response column {} resolved to '{}' ({:?})",
            column.canonical,
            header_row[index],
            kind
        );
    }
    best.map(|(index, _)| index)
}
