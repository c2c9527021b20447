//! Per-provider quota normalization
//!
//! Quota sub-objects differ per provider and per backend version. Each
//! provider gets its own parser returning `Option`, and the results share
//! one tagged union, [`ProviderQuota`].

pub mod antigravity;
pub mod codex;
pub mod generic;
pub mod kiro;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::api::ApiError;
use crate::core::{AuthFileItem, QuotaWindow};

pub use antigravity::{
    build_quota_groups, parse_models_payload, parse_precomputed_models, probe_antigravity,
    AntigravityQuotaGroup,
};
pub use codex::{parse_codex_quota, probe_codex, CodexQuota};
pub use generic::GenericQuota;
pub use kiro::{parse_kiro_usage, KiroQuota};

/// Errors from quota probing and refresh
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("All quota endpoints failed (last: {0})")]
    AllCandidatesFailed(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("{0} has no auth index")]
    MissingAuthIndex(String),
}

/// Which quota shape an auth file carries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuotaProvider {
    Codex,
    Antigravity,
    Kiro,
    /// Any other OAuth provider, by lowercased name
    Other(String),
}

impl QuotaProvider {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "codex" | "openai-codex" => QuotaProvider::Codex,
            "antigravity" => QuotaProvider::Antigravity,
            "kiro" => QuotaProvider::Kiro,
            other => QuotaProvider::Other(other.to_string()),
        }
    }

    pub fn for_item(item: &AuthFileItem) -> Self {
        Self::from_name(&item.provider_name())
    }

    /// Name used in `/auth-files/{name}-quota`
    pub fn endpoint_name(&self) -> &str {
        match self {
            QuotaProvider::Codex => "codex",
            QuotaProvider::Antigravity => "antigravity",
            QuotaProvider::Kiro => "kiro",
            QuotaProvider::Other(name) => name.as_str(),
        }
    }

    /// Result for a successful reply that carried no quota block
    ///
    /// Generic providers read the proxy's own state, so no block means
    /// "not exceeded" rather than "nothing yet".
    pub fn no_data(&self) -> ProviderQuota {
        match self {
            QuotaProvider::Codex => ProviderQuota::Codex(CodexQuota::default()),
            QuotaProvider::Antigravity => ProviderQuota::Antigravity { groups: Vec::new() },
            QuotaProvider::Kiro => ProviderQuota::Kiro(KiroQuota::default()),
            QuotaProvider::Other(_) => ProviderQuota::Generic(GenericQuota::default()),
        }
    }
}

/// Provider-agnostic quota result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderQuota {
    Codex(CodexQuota),
    /// Discovered-models shape, consolidated into groups
    Antigravity { groups: Vec<AntigravityQuotaGroup> },
    /// Pre-computed per-model bars
    AntigravityModels { models: Vec<QuotaWindow> },
    Kiro(KiroQuota),
    Generic(GenericQuota),
}

impl ProviderQuota {
    /// Renderable bars
    pub fn windows(&self) -> Vec<QuotaWindow> {
        match self {
            ProviderQuota::Codex(q) => q.windows(),
            ProviderQuota::Antigravity { groups } => groups.iter().map(|g| g.to_window()).collect(),
            ProviderQuota::AntigravityModels { models } => models.clone(),
            ProviderQuota::Kiro(q) => q.window.iter().cloned().collect(),
            ProviderQuota::Generic(q) => vec![q.window()],
        }
    }

    /// Textual hints such as plan or credit balance
    pub fn hints(&self) -> Vec<String> {
        match self {
            ProviderQuota::Codex(q) => q.hints(),
            ProviderQuota::Kiro(q) => q.hints(),
            ProviderQuota::Generic(q) => q.hints(),
            _ => Vec::new(),
        }
    }

    /// A successful refresh that produced nothing to draw
    pub fn is_empty(&self) -> bool {
        self.windows().is_empty()
    }
}

/// Parse whatever quota data an auth file already carries
pub fn parse_item_quota(item: &AuthFileItem) -> Option<ProviderQuota> {
    match QuotaProvider::for_item(item) {
        QuotaProvider::Codex => item
            .codex_quota
            .as_ref()
            .and_then(parse_codex_quota)
            .map(ProviderQuota::Codex),
        QuotaProvider::Antigravity => item.antigravity_quota.as_ref().and_then(parse_antigravity_value),
        QuotaProvider::Kiro => item
            .kiro_usage
            .as_ref()
            .and_then(parse_kiro_usage)
            .map(ProviderQuota::Kiro),
        QuotaProvider::Other(_) => item
            .quota
            .as_ref()
            .map(|q| ProviderQuota::Generic(GenericQuota::from_status(q))),
    }
}

/// The stored Antigravity block may hold either shape
fn parse_antigravity_value(value: &Value) -> Option<ProviderQuota> {
    if let Some(models) = parse_precomputed_models(value) {
        return Some(ProviderQuota::AntigravityModels { models });
    }
    parse_models_payload(value).map(|models| ProviderQuota::Antigravity {
        groups: build_quota_groups(&models),
    })
}

/// Read a number that may arrive as a JSON number or a numeric string
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
