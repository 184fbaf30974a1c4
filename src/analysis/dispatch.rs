use crate::ai::{AiService, AnalysisRequest, RawServiceResponse};
use crate::models::{ContentKind, ContentPayload, SessionState, SignInStatus};
use crate::{prompts, Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Kind-bound prompt text. The requested schema depends only on the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    pub kind: ContentKind,
    pub text: String,
}

impl AnalysisPrompt {
    /// Text is embedded inline; image data travels beside the prompt.
    pub fn for_payload(payload: &ContentPayload) -> Self {
        let text = match payload.kind() {
            ContentKind::Image => prompts::IMAGE_ANALYSIS.to_string(),
            ContentKind::Text => {
                prompts::render(prompts::TEXT_ANALYSIS, &[("text", payload.data())])
            }
        };
        Self {
            kind: payload.kind(),
            text,
        }
    }
}

/// Clears the in-flight flag when a dispatch finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sends one analysis request at a time, always with the same model.
pub struct AnalysisDispatcher {
    service: Arc<dyn AiService>,
    model: String,
    in_flight: AtomicBool,
}

impl AnalysisDispatcher {
    pub fn new(service: Arc<dyn AiService>, model: String) -> Self {
        Self {
            service,
            model,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn build_request(&self, payload: &ContentPayload) -> AnalysisRequest {
        let prompt = AnalysisPrompt::for_payload(payload);
        let content_ref = match payload.kind() {
            ContentKind::Image => Some(payload.data().to_string()),
            ContentKind::Text => None,
        };
        AnalysisRequest {
            prompt: prompt.text,
            content_ref,
            model: self.model.clone(),
        }
    }

    /// Issue the analysis call.
    ///
    /// Requires a ready service. A signed-out session only logs a warning,
    /// since the service may prompt for sign-in as part of the call.
    pub async fn dispatch(
        &self,
        payload: &ContentPayload,
        session: SessionState,
    ) -> Result<RawServiceResponse> {
        if !session.service_ready {
            return Err(Error::ServiceUnavailable(
                "analysis client is not loaded".to_string(),
            ));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        if session.signed_in != SignInStatus::SignedIn {
            warn!(
                "{}",
                Error::AuthRequired(format!(
                    "session is {:?}; the service may ask to sign in",
                    session.signed_in
                ))
            );
        }

        let request = self.build_request(payload);
        info!(
            "Dispatching {} analysis (model: {}, {} prompt bytes)",
            payload.kind(),
            self.model,
            request.prompt.len()
        );

        let response = self.service.analyze(&request).await?;
        debug!("Raw analysis response: {}", response.as_value());
        Ok(response)
    }
}
