//! Periodic usage and session-binding polling
//!
//! Each task has its own in-flight flag; a tick or manual trigger that finds
//! the previous run still going is skipped. Usage refreshes rebuild a whole
//! [`UsageView`] and swap it in, so readers never see a half-built snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{ApiError, ManagementApi};
use crate::core::{
    build_file_stats, calculate_file_status_bar, calculate_status_bar_data, collect_usage_details,
    compute_key_stats, AuthFileItem, KeyStatBucket, KeyStats, SessionBinding, StatusBarData,
    StatusBarLayout, UsageDetail,
};

/// A named periodic job with an overlap guard
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    in_flight: AtomicBool,
}

impl PeriodicTask {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Claim the task; `None` when a run is already in progress
    pub fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flag: &self.in_flight,
            })
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Clears the in-flight flag on drop, whether the run succeeded or not
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Immutable usage snapshot, rebuilt from scratch on every refresh
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageView {
    #[serde(skip)]
    pub details: Vec<UsageDetail>,
    pub key_stats: KeyStats,
    /// Keyed by auth file identity
    pub file_stats: HashMap<String, KeyStatBucket>,
    /// Keyed by auth file identity
    pub status_bars: HashMap<String, StatusBarData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<StatusBarData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl UsageView {
    pub fn build(
        usage: &serde_json::Value,
        files: &[AuthFileItem],
        now: DateTime<Utc>,
        layout: StatusBarLayout,
    ) -> Self {
        let details = collect_usage_details(usage);
        let key_stats = compute_key_stats(&details);
        let file_stats = build_file_stats(files, &key_stats);
        let status_bars = files
            .iter()
            .map(|f| {
                (
                    f.identity().to_string(),
                    calculate_file_status_bar(&details, f, now, layout),
                )
            })
            .collect();
        let overall = calculate_status_bar_data(&details, None, now, layout);

        Self {
            details,
            key_stats,
            file_stats,
            status_bars,
            overall: Some(overall),
            generated_at: Some(now),
        }
    }
}

/// Shared polling state
pub struct Poller<A: ManagementApi + ?Sized> {
    api: Arc<A>,
    layout: StatusBarLayout,
    usage_task: PeriodicTask,
    session_task: PeriodicTask,
    files: RwLock<Arc<Vec<AuthFileItem>>>,
    view: RwLock<Arc<UsageView>>,
    bindings: RwLock<Arc<Vec<SessionBinding>>>,
}

impl<A: ManagementApi + ?Sized + 'static> Poller<A> {
    pub fn new(api: Arc<A>, layout: StatusBarLayout) -> Self {
        Self {
            api,
            layout,
            usage_task: PeriodicTask::new("usage"),
            session_task: PeriodicTask::new("session-bindings"),
            files: RwLock::new(Arc::new(Vec::new())),
            view: RwLock::new(Arc::new(UsageView::default())),
            bindings: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn view(&self) -> Arc<UsageView> {
        self.view.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn files(&self) -> Arc<Vec<AuthFileItem>> {
        self.files.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn bindings(&self) -> Arc<Vec<SessionBinding>> {
        self.bindings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Reload auth files and usage, then swap in a fresh view
    ///
    /// `Ok(false)` means the run was skipped because one is already going.
    pub async fn refresh_usage(&self) -> Result<bool, ApiError> {
        let Some(_guard) = self.usage_task.try_begin() else {
            tracing::debug!("Skipping {} poll; previous run still in flight", self.usage_task.name());
            return Ok(false);
        };

        let (files, usage) = tokio::join!(self.api.list_auth_files(), self.api.usage());
        let files = files?;
        let usage = usage?;

        let view = UsageView::build(&usage, &files, Utc::now(), self.layout);
        tracing::info!(
            "Usage snapshot: {} requests across {} sources, {} auth files",
            view.details.len(),
            view.key_stats.by_source.len(),
            files.len()
        );

        *self.files.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(files);
        *self.view.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(view);
        Ok(true)
    }

    pub async fn refresh_sessions(&self) -> Result<bool, ApiError> {
        let Some(_guard) = self.session_task.try_begin() else {
            tracing::debug!("Skipping {} poll; previous run still in flight", self.session_task.name());
            return Ok(false);
        };

        let bindings = self.api.session_bindings().await?;
        let active: u64 = bindings.iter().map(|b| b.session_count).sum();
        tracing::debug!("Session bindings: {} files, {} active sessions", bindings.len(), active);

        *self.bindings.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(bindings);
        Ok(true)
    }

    /// Spawn both periodic tasks; the first tick of each runs immediately
    pub fn start(self: &Arc<Self>, usage_every: Duration, sessions_every: Duration) -> PollerHandle {
        let usage = {
            let poller = Arc::clone(self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(usage_every);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    if let Err(e) = poller.refresh_usage().await {
                        tracing::warn!("Usage refresh failed: {}", e);
                    }
                }
            })
        };

        let sessions = {
            let poller = Arc::clone(self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sessions_every);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    match poller.refresh_sessions().await {
                        Ok(_) => {}
                        Err(e) if e.is_unsupported() => {
                            tracing::warn!("Backend has no session bindings endpoint; stopping that poll");
                            break;
                        }
                        Err(e) => tracing::warn!("Session binding refresh failed: {}", e),
                    }
                }
            })
        };

        PollerHandle {
            handles: vec![usage, sessions],
        }
    }
}

/// Running poll tasks; aborted on shutdown or drop
pub struct PollerHandle {
    handles: Vec<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        tracing::debug!("Poller stopped");
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BlockState;
    use crate::refresh::mock::{MockApi, Reply};
    use chrono::TimeZone;
    use serde_json::json;

    fn usage_payload(now: DateTime<Utc>) -> serde_json::Value {
        let ts = |mins: i64| (now - chrono::Duration::minutes(mins)).to_rfc3339();
        json!({"usage": {"apis": {"/v1/chat/completions": {"models": {"gpt-5": {"details": [
            {"timestamp": ts(5), "source": "sk-live", "auth_index": 1, "failed": false},
            {"timestamp": ts(4), "source": "sk-live", "auth_index": 1, "failed": false},
            {"timestamp": ts(3), "source": "sk-live", "auth_index": 1, "failed": false},
            {"timestamp": ts(2), "source": "sk-live", "auth_index": 1, "failed": true}
        ]}}}}}})
    }

    fn files() -> Vec<AuthFileItem> {
        serde_json::from_value(json!([
            {"id": "a.json", "name": "a.json", "type": "codex", "auth_index": 1},
            {"id": "b.json", "name": "b.json", "type": "codex"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_guard_resets_flag() {
        let task = PeriodicTask::new("usage");
        {
            let _guard = task.try_begin().unwrap();
            assert!(task.is_running());
            assert!(task.try_begin().is_none());
        }
        assert!(!task.is_running());
        assert!(task.try_begin().is_some());
    }

    #[test]
    fn test_view_build() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let view = UsageView::build(&usage_payload(now), &files(), now, StatusBarLayout::default());

        assert_eq!(view.details.len(), 4);
        assert_eq!(view.file_stats["a.json"], KeyStatBucket::new(3, 1));
        assert!(view.file_stats["b.json"].is_empty());

        let bar = &view.status_bars["a.json"];
        assert_eq!(bar.success_rate, Some(75.0));
        assert_eq!(bar.blocks.last(), Some(&BlockState::Mixed));
        assert_eq!(view.status_bars["b.json"].success_rate, None);
        assert_eq!(view.overall.as_ref().and_then(|b| b.success_rate), Some(75.0));
    }

    #[tokio::test]
    async fn test_overlapping_poll_is_skipped() {
        let api = Arc::new(MockApi::new().with_files(files()));
        let poller = Poller::new(api.clone(), StatusBarLayout::default());

        let guard = poller.usage_task.try_begin().unwrap();
        assert!(!poller.refresh_usage().await.unwrap());
        assert!(api.calls().is_empty());
        drop(guard);

        assert!(poller.refresh_usage().await.unwrap());
        assert_eq!(poller.files().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_poll_releases_guard_and_keeps_view() {
        let api = Arc::new(MockApi::new().with_files(files()));
        api.script_usage(Duration::ZERO, Reply::Json(usage_payload(Utc::now())));
        api.script_usage(Duration::ZERO, Reply::Network);
        let poller = Poller::new(api.clone(), StatusBarLayout::default());

        assert!(poller.refresh_usage().await.unwrap());
        assert_eq!(poller.view().details.len(), 4);

        assert!(poller.refresh_usage().await.is_err());
        assert!(!poller.usage_task.is_running());
        assert_eq!(poller.view().details.len(), 4);
    }

    #[tokio::test]
    async fn test_session_bindings_refresh() {
        let api = Arc::new(MockApi::new());
        api.set_bindings(vec![SessionBinding {
            auth_id: "a.json".into(),
            session_count: 3,
            last_used_at: None,
        }]);
        let poller = Poller::new(api, StatusBarLayout::default());
        assert!(poller.refresh_sessions().await.unwrap());
        assert_eq!(poller.bindings()[0].session_count, 3);
    }

    #[tokio::test]
    async fn test_started_poller_runs_first_tick() {
        let api = Arc::new(MockApi::new().with_files(files()));
        let poller = Arc::new(Poller::new(api.clone(), StatusBarLayout::default()));
        let handle = poller.start(Duration::from_secs(3600), Duration::from_secs(3600));

        for _ in 0..50 {
            if poller.view().generated_at.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(poller.view().generated_at.is_some());
        handle.shutdown();
    }
}
