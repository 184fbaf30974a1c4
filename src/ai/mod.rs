//! AI service integration for neurodiversity analysis
//!
//! The pipeline never reaches the analysis or auth provider directly; it is
//! handed capability objects implementing [`AiService`] and [`AuthService`],
//! so tests can substitute [`MockAiService`].

pub mod client;
pub mod mock;
pub mod types;

pub use client::ChatClient;
pub use mock::MockAiService;

use crate::Result;
use async_trait::async_trait;
use serde::Serialize;

/// One outbound analysis call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub prompt: String,
    /// Data URI of the image under analysis; absent for text requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    pub model: String,
}

/// Whatever the service sent back. Its shape is not guaranteed; only the
/// normalizer looks inside.
#[derive(Debug, Clone, PartialEq)]
pub struct RawServiceResponse(pub serde_json::Value);

impl RawServiceResponse {
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for RawServiceResponse {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl From<&str> for RawServiceResponse {
    fn from(text: &str) -> Self {
        Self(serde_json::Value::String(text.to_string()))
    }
}

#[async_trait]
pub trait AiService: Send + Sync {
    /// Whether the client is present in this environment at all.
    fn is_loaded(&self) -> bool;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<RawServiceResponse>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn is_signed_in(&self) -> Result<bool>;

    /// Run the provider's sign-in flow. May prompt the user.
    async fn sign_in(&self) -> Result<()>;
}
