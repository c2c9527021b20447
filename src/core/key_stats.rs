//! Success/failure counters keyed by source and by auth index
//!
//! Counters are always rebuilt from a full detail list; nothing here is
//! updated incrementally.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::auth_file::AuthFileItem;
use super::identity::strip_extension;
use super::usage_detail::UsageDetail;

/// Aggregate request counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStatBucket {
    pub success: u64,
    pub failure: u64,
}

impl KeyStatBucket {
    #[cfg(test)]
    pub fn new(success: u64, failure: u64) -> Self {
        Self { success, failure }
    }

    pub fn total(&self) -> u64 {
        self.success + self.failure
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn record(&mut self, success: bool) {
        if success {
            self.success += 1;
        } else {
            self.failure += 1;
        }
    }

    fn add(self, other: KeyStatBucket) -> KeyStatBucket {
        KeyStatBucket {
            success: self.success + other.success,
            failure: self.failure + other.failure,
        }
    }
}

/// Counters indexed two ways over the same identity space
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyStats {
    pub by_source: HashMap<String, KeyStatBucket>,
    pub by_auth_index: HashMap<String, KeyStatBucket>,
}

/// Fold usage details into [`KeyStats`]
pub fn compute_key_stats(details: &[UsageDetail]) -> KeyStats {
    let mut stats = KeyStats::default();
    for detail in details {
        let success = detail.is_success();
        if !detail.source.is_empty() {
            stats
                .by_source
                .entry(detail.source.clone())
                .or_default()
                .record(success);
        }
        if let Some(index) = &detail.auth_index {
            stats
                .by_auth_index
                .entry(index.clone())
                .or_default()
                .record(success);
        }
    }
    stats
}

/// Counters for one API key: exact key first, then its masked form
pub fn get_stats_by_source<M>(key: &str, stats: &KeyStats, mask: M) -> KeyStatBucket
where
    M: Fn(&str) -> String,
{
    let key = key.trim();
    if key.is_empty() {
        return KeyStatBucket::default();
    }
    if let Some(bucket) = stats.by_source.get(key) {
        return *bucket;
    }
    let masked = mask(key);
    stats.by_source.get(&masked).copied().unwrap_or_default()
}

/// An API key configured for an OpenAI-compatible provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    #[serde(alias = "api-key", alias = "apiKey")]
    pub api_key: String,
}

/// Sum of the counters of every key configured for one logical provider
pub fn get_openai_provider_stats<M>(entries: &[ApiKeyEntry], stats: &KeyStats, mask: M) -> KeyStatBucket
where
    M: Fn(&str) -> String,
{
    entries
        .iter()
        .map(|entry| get_stats_by_source(&entry.api_key, stats, &mask))
        .fold(KeyStatBucket::default(), KeyStatBucket::add)
}

/// One step of the auth file lookup chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileStatsStrategy {
    /// `by_auth_index` at the normalized index; accepted whenever present
    AuthIndex,
    /// `by_source` at the exact file name; accepted only when nonzero
    ExactName,
    /// `by_source` at the name without extension; accepted only when nonzero
    StrippedName,
}

const FILE_STATS_CHAIN: [FileStatsStrategy; 3] = [
    FileStatsStrategy::AuthIndex,
    FileStatsStrategy::ExactName,
    FileStatsStrategy::StrippedName,
];

impl FileStatsStrategy {
    fn lookup(self, file: &AuthFileItem, stats: &KeyStats) -> Option<KeyStatBucket> {
        match self {
            FileStatsStrategy::AuthIndex => file
                .auth_index
                .as_ref()
                .and_then(|index| stats.by_auth_index.get(index))
                .copied(),
            FileStatsStrategy::ExactName => nonzero(stats.by_source.get(file.name.as_str())),
            FileStatsStrategy::StrippedName => {
                let stripped = strip_extension(&file.name);
                if stripped == file.name {
                    return None;
                }
                nonzero(stats.by_source.get(stripped))
            }
        }
    }
}

fn nonzero(bucket: Option<&KeyStatBucket>) -> Option<KeyStatBucket> {
    bucket.filter(|b| !b.is_empty()).copied()
}

/// Resolve the counters for an auth file
///
/// Tries the auth index, then the exact name, then the name without its
/// extension. Name matches with zero counts are skipped so an empty bucket
/// never shadows a later populated one.
pub fn resolve_auth_file_stats(file: &AuthFileItem, stats: &KeyStats) -> KeyStatBucket {
    FILE_STATS_CHAIN
        .iter()
        .find_map(|strategy| strategy.lookup(file, stats))
        .unwrap_or_default()
}

/// Per-file counters keyed by file identity, rebuilt on every refresh
pub fn build_file_stats(files: &[AuthFileItem], stats: &KeyStats) -> HashMap<String, KeyStatBucket> {
    files
        .iter()
        .map(|file| (file.identity().to_string(), resolve_auth_file_stats(file, stats)))
        .collect()
}
