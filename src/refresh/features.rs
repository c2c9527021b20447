//! Backend capabilities found missing during this session

use std::collections::BTreeSet;
use std::sync::Mutex;

/// Endpoints the backend answered 404 for
///
/// The first report for a feature logs a warning; later ones are silent and
/// the feature stays in the "upgrade required" state for the session.
#[derive(Debug, Default)]
pub struct UnsupportedFeatures {
    seen: Mutex<BTreeSet<String>>,
}

impl UnsupportedFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a missing feature; `true` only the first time
    pub fn mark(&self, feature: &str) -> bool {
        let inserted = self
            .seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(feature.to_string());
        if inserted {
            tracing::warn!(
                "Backend does not support {}; upgrade the proxy to enable it",
                feature
            );
        }
        inserted
    }

    pub fn is_unsupported(&self, feature: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(feature)
    }

    pub fn list(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
