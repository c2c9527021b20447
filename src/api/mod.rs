//! Management API access
//!
//! The proxy's REST surface is an external collaborator. Everything that
//! talks to it goes through [`ManagementApi`] so refresh logic can be driven
//! by an in-memory implementation in tests.

mod client;
mod error;
mod types;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{AuthFileItem, SessionBinding};

pub use client::ManagementClient;
pub use error::*;
pub use types::*;

#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// `GET /auth-files`
    async fn list_auth_files(&self) -> Result<Vec<AuthFileItem>, ApiError>;

    /// `POST /auth-files/{provider}-quota`; returns the updated record
    async fn refresh_provider_quota(
        &self,
        provider: &str,
        id: &str,
        model: Option<&str>,
    ) -> Result<AuthFileItem, ApiError>;

    /// `POST /api-call`
    async fn api_call(&self, request: &ApiCallRequest) -> Result<ApiCallResponse, ApiError>;

    /// `GET /usage`; the raw nested snapshot
    async fn usage(&self) -> Result<Value, ApiError>;

    /// `GET /auth-files/session-bindings`
    async fn session_bindings(&self) -> Result<Vec<SessionBinding>, ApiError>;

    /// `GET /oauth-excluded-models`
    async fn excluded_models(&self) -> Result<BTreeMap<String, Vec<String>>, ApiError>;

    /// `PUT /oauth-excluded-models`
    async fn set_excluded_models(&self, provider: &str, models: &[String]) -> Result<(), ApiError>;

    /// Connectivity test with a fixed timeout ceiling
    async fn ping(&self) -> Result<(), ApiError>;
}
