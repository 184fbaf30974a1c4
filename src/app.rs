//! Application wiring: configuration to concrete services to a [`Pipeline`].

use crate::ai::{AiService, AuthService, ChatClient};
use crate::analysis::{AnalysisDispatcher, Sentiment};
use crate::content::{FileInput, PasteItem, ProgressFn};
use crate::models::{Config, ContentKind, NormalizedResult, SignInStatus};
use crate::pipeline::Pipeline;
use crate::readiness::ReadinessProbe;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub service: Arc<dyn AiService>,
    pub auth: Arc<dyn AuthService>,
}

/// Content submitted for analysis.
#[derive(Debug, Clone)]
pub enum Submission {
    File(FileInput),
    Text(String),
    Paste(Vec<PasteItem>),
}

/// Outcome of one successful analysis.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub kind: ContentKind,
    pub result: NormalizedResult,
    pub sentiment: Sentiment,
}

pub struct App {
    pipeline: Pipeline,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(
        services: AppServices,
        model: String,
        ready_grace: Duration,
        on_progress: Option<Arc<ProgressFn>>,
    ) -> Self {
        let dispatcher = Arc::new(AnalysisDispatcher::new(services.service.clone(), model));
        let probe = Arc::new(ReadinessProbe::new(
            services.service,
            services.auth,
            ready_grace,
        ));

        let pipeline = Pipeline::new(dispatcher, probe);
        let pipeline = match on_progress {
            Some(on_progress) => pipeline.with_progress(on_progress),
            None => pipeline,
        };

        Self { pipeline }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new(on_progress: Option<Arc<ProgressFn>>) -> Result<Self> {
        let config = Config::from_env()?;
        Ok(Self::from_config(&config, on_progress))
    }

    pub fn from_config(config: &Config, on_progress: Option<Arc<ProgressFn>>) -> Self {
        info!(
            "Analysis service: {} (model: {})",
            config.base_url, config.model
        );
        if config.api_key.is_none() {
            warn!("No API key configured; the service may refuse requests");
        }

        let client = Arc::new(ChatClient::new(
            config.api_key.clone(),
            config.base_url.clone(),
        ));

        Self::with_services(
            AppServices {
                service: client.clone(),
                auth: client,
            },
            config.model.clone(),
            config.ready_grace,
            on_progress,
        )
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    async fn ensure_signed_in(&self) {
        let probe = self.pipeline.probe();
        if probe.signed_in().await == SignInStatus::SignedIn {
            return;
        }

        match probe.sign_in().await {
            Ok(status) => info!("Sign-in status: {:?}", status),
            Err(e) => warn!("{}; continuing without sign-in", e),
        }
    }

    /// Select, read and analyze one submission.
    pub async fn analyze(&self, submission: Submission) -> Result<AnalysisReport> {
        let kind = match submission {
            Submission::File(input) => self.pipeline.select_file(input)?,
            Submission::Text(text) => self.pipeline.select_text(text)?,
            Submission::Paste(items) => self.pipeline.select_paste(items)?,
        };

        if self.pipeline.probe().service_ready().await {
            self.ensure_signed_in().await;
        }

        let result = self.pipeline.run().await?;
        let sentiment = self
            .pipeline
            .sentiment()
            .ok_or_else(|| Error::InvalidTransition("result was not retained".to_string()))?;

        Ok(AnalysisReport {
            kind,
            result,
            sentiment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiService;
    use crate::pipeline::PipelinePhase;

    fn app(service: &MockAiService) -> App {
        App::with_services(
            AppServices {
                service: Arc::new(service.clone()),
                auth: Arc::new(service.clone()),
            },
            "gpt-4o".to_string(),
            Duration::from_millis(1),
            None,
        )
    }

    #[tokio::test]
    async fn test_analyze_text_submission() {
        let service = MockAiService::new().with_message_content("Confusing in places.");
        let report = app(&service)
            .analyze(Submission::Text("Some text".to_string()))
            .await
            .unwrap();

        assert_eq!(report.kind, ContentKind::Text);
        assert_eq!(report.sentiment, Sentiment::NotFriendly);
    }

    #[tokio::test]
    async fn test_signed_out_user_is_signed_in_before_dispatch() {
        let service = MockAiService::new().with_signed_in(false);
        app(&service)
            .analyze(Submission::Text("Some text".to_string()))
            .await
            .unwrap();

        assert!(service.is_signed_in().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_sign_in_does_not_block_dispatch() {
        let service = MockAiService::new()
            .with_signed_in(false)
            .with_sign_in_failure();
        app(&service)
            .analyze(Submission::Text("Some text".to_string()))
            .await
            .unwrap();

        assert_eq!(service.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_paste_fails() {
        let service = MockAiService::new();
        let app = app(&service);
        let err = app.analyze(Submission::Paste(Vec::new())).await.unwrap_err();

        assert!(matches!(err, Error::UnsupportedContentType(_)));
        assert_eq!(app.pipeline().phase(), PipelinePhase::Failed);
    }
}
