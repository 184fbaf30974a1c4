//! Service readiness and sign-in checks performed before each dispatch.

use crate::ai::{AiService, AuthService};
use crate::models::{SessionState, SignInStatus};
use crate::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

pub struct ReadinessProbe {
    service: Arc<dyn AiService>,
    auth: Arc<dyn AuthService>,
    grace: Duration,
    ready: Mutex<Option<bool>>,
}

impl ReadinessProbe {
    pub fn new(service: Arc<dyn AiService>, auth: Arc<dyn AuthService>, grace: Duration) -> Self {
        Self {
            service,
            auth,
            grace,
            ready: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<bool> {
        self.ready.lock().ok().and_then(|ready| *ready)
    }

    fn remember(&self, ready: bool) {
        if let Ok(mut slot) = self.ready.lock() {
            *slot = Some(ready);
        }
    }

    /// Whether the analysis client is present.
    ///
    /// A missing client gets exactly one grace period to appear. The outcome
    /// is then fixed until [`refresh`](Self::refresh).
    pub async fn service_ready(&self) -> bool {
        if let Some(ready) = self.cached() {
            return ready;
        }

        let ready = if self.service.is_loaded() {
            true
        } else {
            info!(
                "Analysis service not loaded yet, waiting {:?} before giving up",
                self.grace
            );
            tokio::time::sleep(self.grace).await;
            self.service.is_loaded()
        };

        if !ready {
            warn!("Analysis service is still not loaded; refresh to try again");
        }
        self.remember(ready);
        ready
    }

    /// Forget a previous readiness outcome so the next check probes again.
    pub fn refresh(&self) {
        if let Ok(mut slot) = self.ready.lock() {
            *slot = None;
        }
    }

    /// Evaluated fresh on every call: sign-in can change out of band.
    pub async fn signed_in(&self) -> SignInStatus {
        match self.auth.is_signed_in().await {
            Ok(true) => SignInStatus::SignedIn,
            Ok(false) => SignInStatus::SignedOut,
            Err(e) => {
                warn!("Could not determine sign-in state: {}", e);
                SignInStatus::Unknown
            }
        }
    }

    pub async fn session_state(&self) -> SessionState {
        let service_ready = self.service_ready().await;
        let signed_in = if service_ready {
            self.signed_in().await
        } else {
            SignInStatus::Unknown
        };
        SessionState {
            service_ready,
            signed_in,
        }
    }

    /// Run the interactive sign-in flow, then re-check sign-in state.
    pub async fn sign_in(&self) -> Result<SignInStatus> {
        self.auth.sign_in().await?;
        let status = self.signed_in().await;
        info!("Sign-in finished: {:?}", status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiService;
    use crate::Error;

    fn probe(service: &MockAiService, grace: Duration) -> ReadinessProbe {
        ReadinessProbe::new(
            Arc::new(service.clone()),
            Arc::new(service.clone()),
            grace,
        )
    }

    #[tokio::test]
    async fn test_loaded_service_is_ready() {
        let service = MockAiService::new();
        let state = probe(&service, Duration::from_millis(1)).session_state().await;
        assert_eq!(
            state,
            SessionState {
                service_ready: true,
                signed_in: SignInStatus::SignedIn
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_service_is_picked_up_within_grace() {
        let service = MockAiService::new().with_loaded(false);
        let probe = probe(&service, Duration::from_millis(500));

        let late = service.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            late.set_loaded(true);
        });

        assert!(probe.service_ready().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_service_latches_until_refresh() {
        let service = MockAiService::new().with_loaded(false);
        let probe = probe(&service, Duration::from_millis(500));

        assert!(!probe.service_ready().await);

        service.set_loaded(true);
        assert!(!probe.service_ready().await);

        probe.refresh();
        assert!(probe.service_ready().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unready_session_has_unknown_sign_in() {
        let service = MockAiService::new().with_loaded(false);
        let state = probe(&service, Duration::from_millis(10)).session_state().await;
        assert!(!state.service_ready);
        assert_eq!(state.signed_in, SignInStatus::Unknown);
    }

    #[tokio::test]
    async fn test_sign_in_state_is_not_cached() {
        let service = MockAiService::new().with_signed_in(false);
        let probe = probe(&service, Duration::from_millis(1));

        assert_eq!(probe.signed_in().await, SignInStatus::SignedOut);
        service.set_signed_in(true);
        assert_eq!(probe.signed_in().await, SignInStatus::SignedIn);
    }

    #[tokio::test]
    async fn test_sign_in_reevaluates() {
        let service = MockAiService::new().with_signed_in(false);
        let probe = probe(&service, Duration::from_millis(1));

        assert_eq!(probe.sign_in().await.unwrap(), SignInStatus::SignedIn);
    }

    #[tokio::test]
    async fn test_failed_sign_in_is_auth_required() {
        let service = MockAiService::new()
            .with_signed_in(false)
            .with_sign_in_failure();
        let probe = probe(&service, Duration::from_millis(1));

        assert!(matches!(
            probe.sign_in().await.unwrap_err(),
            Error::AuthRequired(_)
        ));
    }
}
