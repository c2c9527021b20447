//! Request/response shapes for the generic outbound api-call endpoint

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder the backend replaces with the credential's access token
pub const TOKEN_PLACEHOLDER: &str = "$TOKEN$";

/// A request the proxy issues upstream on behalf of one credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallRequest {
    pub auth_index: String,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl ApiCallRequest {
    pub fn new(auth_index: impl Into<String>, method: &str, url: impl Into<String>) -> Self {
        Self {
            auth_index: auth_index.into(),
            method: method.to_uppercase(),
            url: url.into(),
            header: BTreeMap::new(),
            data: None,
        }
    }

    /// Builder pattern: add a header
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.header.insert(name.to_string(), value.into());
        self
    }

    /// Builder pattern: add `Authorization: Bearer $TOKEN$`
    pub fn with_bearer_template(self) -> Self {
        self.with_header("Authorization", format!("Bearer {}", TOKEN_PLACEHOLDER))
    }

    /// Builder pattern: set the request body
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// What the upstream answered, relayed by the proxy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiCallResponse {
    #[serde(default, alias = "statusCode")]
    pub status_code: u16,

    #[serde(default)]
    pub header: Value,

    /// Either a JSON string or an already parsed object
    #[serde(default)]
    pub body: Value,

    #[serde(default, alias = "bodyText", skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

impl ApiCallResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// The upstream body as JSON, whichever form it arrived in
    pub fn json_body(&self) -> Option<Value> {
        match &self.body {
            Value::String(text) => parse_json_text(text),
            Value::Null => self.body_text.as_deref().and_then(parse_json_text),
            other => Some(other.clone()),
        }
    }
}

fn parse_json_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
