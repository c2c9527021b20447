//! Quota refresh coordination
//!
//! Owns the auth file list and the per-file quota cells. Refreshes pick a
//! per-provider strategy, run with bounded concurrency, and merge updated
//! records back by identity.

use std::sync::{Arc, Mutex, RwLock};

use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::features::UnsupportedFeatures;
use super::state::QuotaCells;
#[cfg(test)]
use super::state::QuotaState;
use crate::api::{describe_error, ApiError, ManagementApi};
use crate::core::{replace_by_identity, AuthFileItem};
use crate::providers::{
    parse_item_quota, probe_antigravity, probe_codex, ProviderQuota, QuotaError, QuotaProvider,
};

/// Which auth files a batch refresh covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    /// 1-based page of the current list
    Page { page: usize, page_size: usize },
    All,
}

/// What happened to one item in a refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Success(ProviderQuota),
    /// Succeeded but produced nothing to display
    Empty,
    Failed(String),
    /// A refresh for this item was already running
    InFlight,
    /// A newer refresh replaced this one before it finished
    Superseded,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: RefreshOutcome,
}

pub struct QuotaCoordinator<A: ManagementApi + ?Sized> {
    api: Arc<A>,
    features: Arc<UnsupportedFeatures>,
    files: RwLock<Vec<AuthFileItem>>,
    cells: Mutex<QuotaCells<ProviderQuota>>,
    batch_size: usize,
}

impl<A: ManagementApi + ?Sized> QuotaCoordinator<A> {
    pub fn new(api: Arc<A>, features: Arc<UnsupportedFeatures>, batch_size: usize) -> Self {
        Self {
            api,
            features,
            files: RwLock::new(Vec::new()),
            cells: Mutex::new(QuotaCells::new()),
            batch_size: batch_size.max(1),
        }
    }

    /// Fetch the auth file list and replace the local copy
    pub async fn load_files(&self) -> Result<usize, ApiError> {
        let files = self.api.list_auth_files().await?;
        let count = files.len();
        self.set_files(files);
        Ok(count)
    }

    /// Replace the whole list; cells of files that disappeared are dropped
    pub fn set_files(&self, files: Vec<AuthFileItem>) {
        {
            let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
            let previous = self.files.read().unwrap_or_else(|e| e.into_inner());
            for old in previous.iter() {
                if !files.iter().any(|f| f.identity() == old.identity()) {
                    cells.reset(old.identity());
                }
            }
        }
        *self.files.write().unwrap_or_else(|e| e.into_inner()) = files;
    }

    #[cfg(test)]
    pub fn files(&self) -> Vec<AuthFileItem> {
        self.files.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    #[cfg(test)]
    pub fn state(&self, id: &str) -> QuotaState<ProviderQuota> {
        self.cells
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .unwrap_or(QuotaState::Idle)
    }

    fn find(&self, id: &str) -> Option<AuthFileItem> {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|f| f.identity() == id || f.name == id)
            .cloned()
    }

    fn select(&self, scope: RefreshScope) -> Vec<String> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        let ids = files.iter().map(|f| f.identity().to_string());
        match scope {
            RefreshScope::All => ids.collect(),
            RefreshScope::Page { page, page_size } => {
                let page_size = page_size.max(1);
                ids.skip(page.saturating_sub(1) * page_size)
                    .take(page_size)
                    .collect()
            }
        }
    }

    /// Refresh every file in `scope`, at most `batch_size` at a time
    ///
    /// Never fails as a whole; each item's outcome is reported in scope order.
    pub async fn refresh_batch(&self, scope: RefreshScope) -> Vec<ItemOutcome> {
        let ids = self.select(scope);
        tracing::debug!("Refreshing quota for {} auth files", ids.len());

        let mut outcomes: Vec<(usize, ItemOutcome)> = stream::iter(ids.into_iter().enumerate())
            .map(|(position, id)| async move { (position, self.refresh_one(&id, false).await) })
            .buffer_unordered(self.batch_size)
            .collect()
            .await;

        outcomes.sort_by_key(|(position, _)| *position);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Refresh one file; `force` supersedes an in-flight refresh
    pub async fn refresh_one(&self, id: &str, force: bool) -> ItemOutcome {
        let Some(item) = self.find(id) else {
            return ItemOutcome {
                id: id.to_string(),
                name: String::new(),
                outcome: RefreshOutcome::NotFound,
            };
        };
        let key = item.identity().to_string();
        let outcome = |outcome| ItemOutcome {
            id: key.clone(),
            name: item.name.clone(),
            outcome,
        };

        let generation = {
            let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
            if force {
                Some(cells.begin_forced(&key))
            } else {
                cells.begin(&key)
            }
        };
        let Some(generation) = generation else {
            tracing::debug!("Quota refresh for {} already in flight", item.name);
            return outcome(RefreshOutcome::InFlight);
        };

        let result = self.fetch_quota(&item).await;

        match result {
            Ok((quota, updated)) => {
                let accepted = self
                    .cells
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .complete(&key, generation, Ok(quota.clone()));
                if !accepted {
                    tracing::debug!("Discarding stale quota response for {}", item.name);
                    return outcome(RefreshOutcome::Superseded);
                }
                if let Some(updated) = updated {
                    let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
                    if !replace_by_identity(&mut files, updated) {
                        tracing::debug!("Updated record for {} matched no listed file", item.name);
                    }
                }
                if quota.is_empty() {
                    outcome(RefreshOutcome::Empty)
                } else {
                    outcome(RefreshOutcome::Success(quota))
                }
            }
            Err(e) => {
                let message = describe_error(&e);
                let accepted = self
                    .cells
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .complete(&key, generation, Err(message.clone()));
                if !accepted {
                    tracing::debug!("Discarding stale quota error for {}", item.name);
                    return outcome(RefreshOutcome::Superseded);
                }
                tracing::warn!("Quota refresh failed for {}: {}", item.name, message);
                outcome(RefreshOutcome::Failed(message))
            }
        }
    }

    /// Run the provider's strategy; also returns the updated record when the
    /// backend sent one
    async fn fetch_quota(
        &self,
        item: &AuthFileItem,
    ) -> Result<(ProviderQuota, Option<AuthFileItem>), QuotaError> {
        match QuotaProvider::for_item(item) {
            QuotaProvider::Codex => self.fetch_codex(item).await,
            QuotaProvider::Antigravity => self.fetch_antigravity(item).await.map(|q| (q, None)),
            provider => self.fetch_from_endpoint(item, &provider).await,
        }
    }

    /// Ask the backend to refresh; `Ok(None)` when it lacks the endpoint
    async fn refresh_via_endpoint(
        &self,
        item: &AuthFileItem,
        provider: &QuotaProvider,
    ) -> Result<Option<AuthFileItem>, QuotaError> {
        let feature = format!("{}-quota", provider.endpoint_name());
        if self.features.is_unsupported(&feature) {
            return Ok(None);
        }
        match self
            .api
            .refresh_provider_quota(provider.endpoint_name(), &item.id, None)
            .await
        {
            Ok(updated) => Ok(Some(updated)),
            Err(e) if e.is_unsupported() => {
                self.features.mark(&feature);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_codex(
        &self,
        item: &AuthFileItem,
    ) -> Result<(ProviderQuota, Option<AuthFileItem>), QuotaError> {
        if let Some(updated) = self.refresh_via_endpoint(item, &QuotaProvider::Codex).await? {
            let quota = parse_updated(&updated, &QuotaProvider::Codex);
            return Ok((quota, Some(updated)));
        }

        let auth_index = item
            .auth_index
            .as_deref()
            .ok_or_else(|| QuotaError::MissingAuthIndex(item.name.clone()))?;
        tracing::debug!("Probing Codex usage for {} through api-call", item.name);
        let quota = probe_codex(self.api.as_ref(), auth_index, item.account_id.as_deref()).await?;
        Ok((ProviderQuota::Codex(quota), None))
    }

    async fn fetch_antigravity(&self, item: &AuthFileItem) -> Result<ProviderQuota, QuotaError> {
        let probed = match item.auth_index.as_deref() {
            Some(auth_index) => {
                probe_antigravity(self.api.as_ref(), auth_index, item.project_id.as_deref())
                    .await
                    .map(|groups| ProviderQuota::Antigravity { groups })
            }
            None => Err(QuotaError::MissingAuthIndex(item.name.clone())),
        };

        match probed {
            Ok(quota) => Ok(quota),
            Err(e) => match parse_item_quota(item) {
                Some(stored) => {
                    tracing::debug!("Antigravity probe failed for {} ({}); using stored quota", item.name, e);
                    Ok(stored)
                }
                None => Err(e),
            },
        }
    }

    /// Kiro and generic OAuth providers
    async fn fetch_from_endpoint(
        &self,
        item: &AuthFileItem,
        provider: &QuotaProvider,
    ) -> Result<(ProviderQuota, Option<AuthFileItem>), QuotaError> {
        if let Some(updated) = self.refresh_via_endpoint(item, provider).await? {
            let quota = parse_updated(&updated, provider);
            return Ok((quota, Some(updated)));
        }

        let stored = parse_item_quota(item).unwrap_or_else(|| provider.no_data());
        Ok((stored, None))
    }
}

/// Quota from a record the backend just returned; a missing or malformed
/// block is "no data yet", not a failure
fn parse_updated(updated: &AuthFileItem, provider: &QuotaProvider) -> ProviderQuota {
    parse_item_quota(updated).unwrap_or_else(|| {
        tracing::debug!("Refreshed record for {} has no quota block", updated.name);
        provider.no_data()
    })
}
