use super::{AiService, AnalysisRequest, AuthService, RawServiceResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Scripted reply for [`MockAiService`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(serde_json::Value),
    NetworkFailure(String),
    ModelFailure(String),
}

/// In-memory stand-in for both the analysis and the auth service.
#[derive(Clone)]
pub struct MockAiService {
    replies: Arc<Mutex<Vec<MockReply>>>,
    requests: Arc<Mutex<Vec<AnalysisRequest>>>,
    call_count: Arc<Mutex<usize>>,
    loaded: Arc<AtomicBool>,
    signed_in: Arc<AtomicBool>,
    sign_in_succeeds: Arc<AtomicBool>,
    hold: Option<Arc<Notify>>,
}

impl MockAiService {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
            loaded: Arc::new(AtomicBool::new(true)),
            signed_in: Arc::new(AtomicBool::new(true)),
            sign_in_succeeds: Arc::new(AtomicBool::new(true)),
            hold: None,
        }
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push(reply);
        self
    }

    pub fn with_response(self, response: serde_json::Value) -> Self {
        self.with_reply(MockReply::Response(response))
    }

    /// Reply with `{ "message": { "content": text } }`.
    pub fn with_message_content(self, text: &str) -> Self {
        self.with_response(serde_json::json!({
            "message": { "role": "assistant", "content": text }
        }))
    }

    pub fn with_loaded(self, loaded: bool) -> Self {
        self.set_loaded(loaded);
        self
    }

    pub fn with_signed_in(self, signed_in: bool) -> Self {
        self.signed_in.store(signed_in, Ordering::SeqCst);
        self
    }

    pub fn with_sign_in_failure(self) -> Self {
        self.sign_in_succeeds.store(false, Ordering::SeqCst);
        self
    }

    /// Make every `analyze` call wait for [`release`](Self::release).
    pub fn with_hold(mut self) -> Self {
        self.hold = Some(Arc::new(Notify::new()));
        self
    }

    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.notify_one();
        }
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::SeqCst);
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        self.signed_in.store(signed_in, Ordering::SeqCst);
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn get_requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockAiService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiService for MockAiService {
    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<RawServiceResponse> {
        let index = {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            *count - 1
        };
        self.requests.lock().unwrap().push(request.clone());

        if let Some(hold) = &self.hold {
            hold.notified().await;
        }

        let reply = {
            let replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                None
            } else {
                Some(replies[index % replies.len()].clone())
            }
        };

        match reply {
            None => Ok(RawServiceResponse::from(
                "The content is calm, clear and accessible.",
            )),
            Some(MockReply::Response(value)) => Ok(RawServiceResponse(value)),
            Some(MockReply::NetworkFailure(msg)) => Err(Error::NetworkFailure(msg)),
            Some(MockReply::ModelFailure(msg)) => Err(Error::ModelFailure(msg)),
        }
    }
}

#[async_trait]
impl AuthService for MockAiService {
    async fn is_signed_in(&self) -> Result<bool> {
        Ok(self.signed_in.load(Ordering::SeqCst))
    }

    async fn sign_in(&self) -> Result<()> {
        if self.sign_in_succeeds.load(Ordering::SeqCst) {
            self.signed_in.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(Error::AuthRequired("sign-in was cancelled".to_string()))
        }
    }
}
