//! HTTP client for the proxy's management API

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use super::{extract_error_message, ApiCallRequest, ApiCallResponse, ApiError, ManagementApi};
use crate::core::{parse_auth_files, parse_exclusion_map, parse_session_bindings, AuthFileItem, SessionBinding};
use crate::settings::Settings;

const MANAGEMENT_PREFIX: &str = "/v0/management";

/// Management API client
pub struct ManagementClient {
    client: reqwest::Client,
    base_url: String,
    management_key: String,
    request_timeout: Duration,
    connectivity_timeout: Duration,
}

impl ManagementClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&settings.base_url)?;

        let request_timeout = Duration::from_secs(settings.request_timeout_secs);
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .user_agent(concat!("proxydeck/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            client,
            base_url,
            management_key: settings.management_key.trim().to_string(),
            request_timeout,
            connectivity_timeout: Duration::from_secs(settings.connectivity_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, ApiError> {
        let mut builder = self
            .client
            .request(method.clone(), self.url(path))
            .header("Accept", "application/json")
            .timeout(timeout);

        if !self.management_key.is_empty() {
            builder = builder.bearer_auth(&self.management_key);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        tracing::debug!("{} {}", method, path);

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, timeout.as_secs()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(e, timeout.as_secs()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::Unsupported(path.to_string()));
        }

        if !status.is_success() {
            let message = extract_error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Parse(format!("{}: {}", path, e)))
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None, self.request_timeout).await
    }
}

#[async_trait]
impl ManagementApi for ManagementClient {
    async fn list_auth_files(&self) -> Result<Vec<AuthFileItem>, ApiError> {
        let payload = self.get("/auth-files").await?;
        Ok(parse_auth_files(&payload))
    }

    async fn refresh_provider_quota(
        &self,
        provider: &str,
        id: &str,
        model: Option<&str>,
    ) -> Result<AuthFileItem, ApiError> {
        let path = format!("/auth-files/{}-quota", provider);
        let mut body = json!({ "id": id });
        if let Some(model) = model {
            body["model"] = Value::String(model.to_string());
        }

        let payload = self
            .request(Method::POST, &path, Some(body), self.request_timeout)
            .await?;

        let auth = payload
            .get("auth")
            .cloned()
            .ok_or_else(|| ApiError::Parse(format!("{}: missing 'auth' record", path)))?;
        serde_json::from_value(auth).map_err(|e| ApiError::Parse(format!("{}: {}", path, e)))
    }

    async fn api_call(&self, request: &ApiCallRequest) -> Result<ApiCallResponse, ApiError> {
        let body = serde_json::to_value(request).map_err(|e| ApiError::Parse(e.to_string()))?;
        let payload = self
            .request(Method::POST, "/api-call", Some(body), self.request_timeout)
            .await?;
        serde_json::from_value(payload).map_err(|e| ApiError::Parse(format!("/api-call: {}", e)))
    }

    async fn usage(&self) -> Result<Value, ApiError> {
        self.get("/usage").await
    }

    async fn session_bindings(&self) -> Result<Vec<SessionBinding>, ApiError> {
        let payload = self.get("/auth-files/session-bindings").await?;
        Ok(parse_session_bindings(&payload))
    }

    async fn excluded_models(&self) -> Result<BTreeMap<String, Vec<String>>, ApiError> {
        let payload = self.get("/oauth-excluded-models").await?;
        Ok(parse_exclusion_map(&payload))
    }

    async fn set_excluded_models(&self, provider: &str, models: &[String]) -> Result<(), ApiError> {
        let body = json!({ "provider": provider.trim().to_lowercase(), "models": models });
        self.request(Method::PUT, "/oauth-excluded-models", Some(body), self.request_timeout)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), ApiError> {
        self.request(Method::GET, "/config", None, self.connectivity_timeout)
            .await
            .map(|_| ())
    }
}

/// Normalize the configured origin into the management API base
///
/// Trailing slashes are dropped and `/v0/management` is appended unless the
/// URL already ends with it.
pub fn normalize_base_url(raw: &str) -> Result<String, ApiError> {
    let mut trimmed = raw.trim().to_string();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidConfig("base URL is empty".to_string()));
    }

    let parsed = url::Url::parse(&trimmed)
        .map_err(|e| ApiError::InvalidConfig(format!("invalid base URL '{}': {}", trimmed, e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ApiError::InvalidConfig(format!(
            "base URL must be http or https, got '{}'",
            parsed.scheme()
        )));
    }

    while trimmed.ends_with('/') {
        trimmed.pop();
    }
    if !trimmed.ends_with(MANAGEMENT_PREFIX) {
        trimmed.push_str(MANAGEMENT_PREFIX);
    }
    Ok(trimmed)
}
