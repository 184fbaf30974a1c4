use super::types::{ChatCompletionRequest, ChatMessage, ChatMessageContent, MessagePart};
use super::{AiService, AnalysisRequest, AuthService, RawServiceResponse};
use crate::models::API_KEY_VAR;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::RwLock;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Chat-completions client for an OpenAI-compatible endpoint.
///
/// No request timeout is set: how long an analysis may take is left to the
/// service.
pub struct ChatClient {
    client: Client,
    api_key: RwLock<Option<String>>,
    key_var: String,
    base_url: String,
}

impl ChatClient {
    pub fn new(api_key: Option<String>, base_url: String) -> Self {
        Self::new_with_client(api_key, base_url, Client::new())
    }

    pub fn new_with_client(api_key: Option<String>, base_url: String, client: Client) -> Self {
        Self {
            client,
            api_key: RwLock::new(api_key),
            key_var: API_KEY_VAR.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Read the API key from a different environment variable.
    pub fn with_key_var(mut self, key_var: &str) -> Self {
        self.key_var = key_var.to_string();
        self
    }

    fn current_key(&self) -> Option<String> {
        self.api_key.read().ok().and_then(|key| key.clone())
    }

    fn build_request(request: &AnalysisRequest) -> ChatCompletionRequest {
        let content = match &request.content_ref {
            Some(data_uri) => ChatMessageContent::Parts(vec![
                MessagePart::text(request.prompt.clone()),
                MessagePart::image_url(data_uri.clone()),
            ]),
            None => ChatMessageContent::Text(request.prompt.clone()),
        };

        ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
        }
    }

    /// Keep only the error-bearing field of a non-2xx body, so the normalizer
    /// can report it but never mistake it for an analysis.
    fn error_body(status: StatusCode, body: &str) -> Result<RawServiceResponse> {
        let failure = || Error::ModelFailure(format!("API error (status {}): {}", status, body));

        let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(body) else {
            return Err(failure());
        };
        if let Some(error) = map.remove("error").filter(|error| !error.is_null()) {
            return Ok(RawServiceResponse(json!({ "error": error })));
        }
        match map.remove("message") {
            Some(Value::String(message)) => Ok(RawServiceResponse(json!({ "message": message }))),
            _ => Err(failure()),
        }
    }

    /// Reduce a successful completion body to its first choice so that
    /// `message.content` sits at the top level.
    fn unwrap_choices(body: Value) -> Value {
        match body {
            Value::Object(mut map) if map.contains_key("choices") => match map.remove("choices") {
                Some(Value::Array(choices)) => choices.into_iter().next().unwrap_or(Value::Null),
                Some(other) => {
                    map.insert("choices".to_string(), other);
                    Value::Object(map)
                }
                None => Value::Object(map),
            },
            other => other,
        }
    }
}

#[async_trait]
impl AiService for ChatClient {
    fn is_loaded(&self) -> bool {
        true
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<RawServiceResponse> {
        tracing::debug!(
            "Sending analysis request (model: {}, image: {})",
            request.model,
            request.content_ref.is_some()
        );

        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH);
        let mut builder = self.client.post(&url).json(&Self::build_request(request));
        if let Some(key) = self.current_key() {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send request to analysis service: {}", e);
            Error::NetworkFailure(e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!("Analysis service error (status {}): {}", status, body);
            return Self::error_body(status, &body);
        }

        let value = match serde_json::from_str::<Value>(&body) {
            Ok(value) => Self::unwrap_choices(value),
            Err(_) => Value::String(body),
        };

        Ok(RawServiceResponse(value))
    }
}

#[async_trait]
impl AuthService for ChatClient {
    async fn is_signed_in(&self) -> Result<bool> {
        Ok(self.current_key().is_some())
    }

    async fn sign_in(&self) -> Result<()> {
        dotenvy::dotenv().ok();

        let key = std::env::var(&self.key_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::AuthRequired(format!("{} is not set", self.key_var)))?;

        let mut slot = self
            .api_key
            .write()
            .map_err(|_| Error::AuthRequired("credential store is poisoned".to_string()))?;
        *slot = Some(key);

        tracing::info!("Signed in to analysis service using {}", self.key_var);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_request() -> AnalysisRequest {
        AnalysisRequest {
            prompt: "Analyze this text".to_string(),
            content_ref: None,
            model: "gpt-4o".to_string(),
        }
    }

    fn make_client(server: &MockServer, api_key: Option<&str>) -> ChatClient {
        ChatClient::new(api_key.map(str::to_string), server.uri())
    }

    #[tokio::test]
    async fn test_analyze_returns_first_choice() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "Clear and friendly."
                    },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, Some("test-key"));
        let raw = client.analyze(&text_request()).await.unwrap();

        assert_eq!(raw.as_value()["message"]["content"], "Clear and friendly.");
    }

    #[tokio::test]
    async fn test_analyze_sends_model_and_image_part() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("\"model\":\"gpt-4o\""))
            .and(body_string_contains("data:image/png;base64,AA=="))
            .and(body_string_contains("\"type\":\"image_url\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "ok" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server, Some("key"));
        let request = AnalysisRequest {
            content_ref: Some("data:image/png;base64,AA==".to_string()),
            ..text_request()
        };

        client.analyze(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_json_error_body_is_returned_for_normalizer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "quota exceeded", "type": "insufficient_quota" }
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, Some("key"));
        let raw = client.analyze(&text_request()).await.unwrap();

        assert_eq!(raw.as_value()["error"]["message"], "quota exceeded");
    }

    #[tokio::test]
    async fn test_plain_error_body_is_model_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .mount(&server)
            .await;

        let client = make_client(&server, Some("key"));
        let err = client.analyze(&text_request()).await.unwrap_err();

        assert!(matches!(err, Error::ModelFailure(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_error_status_with_reply_shaped_body_is_model_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("\"upstream timed out\""))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(502).set_body_json(serde_json::json!({ "text": "looks fine" })),
            )
            .mount(&server)
            .await;

        let client = make_client(&server, Some("key"));

        let err = client.analyze(&text_request()).await.unwrap_err();
        assert!(matches!(err, Error::ModelFailure(ref msg) if msg.contains("500")));

        let err = client.analyze(&text_request()).await.unwrap_err();
        assert!(matches!(err, Error::ModelFailure(ref msg) if msg.contains("502")));
    }

    #[tokio::test]
    async fn test_error_status_body_never_normalizes_to_a_result() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "message": "Service is warming up",
                "text": "pretend analysis"
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, Some("key"));
        let raw = client.analyze(&text_request()).await.unwrap();

        assert_eq!(raw, RawServiceResponse(serde_json::json!({ "message": "Service is warming up" })));
        assert!(crate::analysis::normalize(crate::models::ContentKind::Text, &raw).is_err());
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_bare_string() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("just words"))
            .mount(&server)
            .await;

        let client = make_client(&server, None);
        let raw = client.analyze(&text_request()).await.unwrap();

        assert_eq!(raw, RawServiceResponse::from("just words"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_failure() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let client = ChatClient::new(Some("key".to_string()), "http://127.0.0.1:9".to_string());
        let err = client.analyze(&text_request()).await.unwrap_err();

        assert!(matches!(err, Error::NetworkFailure(_)));
    }

    #[test]
    fn test_unwrap_choices_handles_empty_list() {
        let value = ChatClient::unwrap_choices(serde_json::json!({ "choices": [] }));
        assert!(value.is_null());

        let untouched = ChatClient::unwrap_choices(serde_json::json!({ "text": "hi" }));
        assert_eq!(untouched["text"], "hi");
    }

    #[tokio::test]
    async fn test_sign_in_reads_key_from_environment() {
        let var = "NEUROCHECK_TEST_SIGN_IN_KEY";
        let client = ChatClient::new(None, "http://localhost".to_string()).with_key_var(var);
        assert!(!client.is_signed_in().await.unwrap());

        std::env::set_var(var, "from-env");
        client.sign_in().await.unwrap();
        std::env::remove_var(var);

        assert!(client.is_signed_in().await.unwrap());
        assert_eq!(client.current_key().as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn test_sign_in_without_key_is_auth_required() {
        let var = "NEUROCHECK_TEST_MISSING_KEY";
        std::env::remove_var(var);
        let client = ChatClient::new(None, "http://localhost".to_string()).with_key_var(var);

        let err = client.sign_in().await.unwrap_err();
        assert!(matches!(err, Error::AuthRequired(_)));
    }
}
