//! In-memory management API for coordinator and poller tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiCallRequest, ApiCallResponse, ApiError, ManagementApi};
use crate::core::{AuthFileItem, SessionBinding};

/// A scripted answer
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Json(Value),
    /// Upstream status relayed by api-call, or a management API status
    Status(u16),
    Unsupported,
    Network,
}

impl Reply {
    fn into_value(self, path: &str) -> Result<Value, ApiError> {
        match self {
            Reply::Json(value) => Ok(value),
            Reply::Status(status) => Err(ApiError::Status {
                status,
                message: "scripted".to_string(),
            }),
            Reply::Unsupported => Err(ApiError::Unsupported(path.to_string())),
            Reply::Network => Err(ApiError::Network("connection refused".to_string())),
        }
    }
}

/// Scripted replies, consumed in order; the last one repeats
#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<(Duration, Reply)>,
}

impl Script {
    fn next(&mut self) -> Option<(Duration, Reply)> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockApi {
    files: Mutex<Vec<AuthFileItem>>,
    quota: Mutex<HashMap<String, Script>>,
    upstream: Mutex<HashMap<String, Script>>,
    usage: Mutex<Script>,
    bindings: Mutex<Vec<SessionBinding>>,
    pub calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(self, files: Vec<AuthFileItem>) -> Self {
        *self.files.lock().unwrap() = files;
        self
    }

    /// Script `POST /auth-files/{provider}-quota` for one file id
    pub fn script_quota(&self, id: &str, delay: Duration, reply: Reply) {
        self.quota
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .replies
            .push_back((delay, reply));
    }

    /// Script what the upstream answers for one api-call URL
    pub fn script_upstream(&self, url: &str, delay: Duration, reply: Reply) {
        self.upstream
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .replies
            .push_back((delay, reply));
    }

    pub fn script_usage(&self, delay: Duration, reply: Reply) {
        self.usage.lock().unwrap().replies.push_back((delay, reply));
    }

    pub fn set_bindings(&self, bindings: Vec<SessionBinding>) {
        *self.bindings.lock().unwrap() = bindings;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn run(&self, delay: Duration) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wrap an auth file the way the quota endpoints answer
pub(crate) fn auth_reply(item: Value) -> Reply {
    Reply::Json(json!({ "auth": item }))
}

#[async_trait]
impl ManagementApi for MockApi {
    async fn list_auth_files(&self) -> Result<Vec<AuthFileItem>, ApiError> {
        self.record("GET /auth-files".to_string());
        Ok(self.files.lock().unwrap().clone())
    }

    async fn refresh_provider_quota(
        &self,
        provider: &str,
        id: &str,
        _model: Option<&str>,
    ) -> Result<AuthFileItem, ApiError> {
        let path = format!("/auth-files/{}-quota", provider);
        self.record(format!("POST {} {}", path, id));
        let scripted = self.quota.lock().unwrap().get_mut(id).and_then(Script::next);
        let (delay, reply) = scripted.unwrap_or((Duration::ZERO, Reply::Unsupported));
        self.run(delay).await;
        let value = reply.into_value(&path)?;
        let auth = value.get("auth").cloned().unwrap_or(value);
        serde_json::from_value(auth).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn api_call(&self, request: &ApiCallRequest) -> Result<ApiCallResponse, ApiError> {
        self.record(format!("API-CALL {} {}", request.method, request.url));
        let scripted = self.upstream.lock().unwrap().get_mut(&request.url).and_then(Script::next);
        let (delay, reply) = scripted.unwrap_or((Duration::ZERO, Reply::Status(404)));
        self.run(delay).await;
        match reply {
            Reply::Json(body) => Ok(ApiCallResponse {
                status_code: 200,
                body,
                ..Default::default()
            }),
            Reply::Status(status) => Ok(ApiCallResponse {
                status_code: status,
                body_text: Some("upstream error".to_string()),
                ..Default::default()
            }),
            other => other.into_value("/api-call").map(|_| ApiCallResponse::default()),
        }
    }

    async fn usage(&self) -> Result<Value, ApiError> {
        self.record("GET /usage".to_string());
        let scripted = self.usage.lock().unwrap().next();
        let (delay, reply) = scripted.unwrap_or((Duration::ZERO, Reply::Json(json!({}))));
        self.run(delay).await;
        reply.into_value("/usage")
    }

    async fn session_bindings(&self) -> Result<Vec<SessionBinding>, ApiError> {
        self.record("GET /auth-files/session-bindings".to_string());
        Ok(self.bindings.lock().unwrap().clone())
    }

    async fn excluded_models(&self) -> Result<BTreeMap<String, Vec<String>>, ApiError> {
        Err(ApiError::Unsupported("/oauth-excluded-models".to_string()))
    }

    async fn set_excluded_models(&self, _provider: &str, _models: &[String]) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("/oauth-excluded-models".to_string()))
    }

    async fn ping(&self) -> Result<(), ApiError> {
        Ok(())
    }
}
