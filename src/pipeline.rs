//! Lifecycle of one analysis: select, read, dispatch, and hold the outcome.
//!
//! [`Pipeline`] owns the phase, the selected input, the payload and the
//! result. Every mutation goes through one of its transition methods; at most
//! one dispatch may be outstanding at a time.

use crate::analysis::{normalize, sentiment_of, AnalysisDispatcher, Sentiment};
use crate::content::{
    classify_file, classify_text, ingest, resolve_paste, Classification, FileInput, PasteItem,
    ProgressFn,
};
use crate::error::ErrorKind;
use crate::models::{ContentKind, ContentPayload, NormalizedResult};
use crate::readiness::ReadinessProbe;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PipelinePhase {
    Idle,
    Selecting,
    Reading,
    Dispatching,
    Success,
    Failed,
}

/// What went wrong, as recorded on the pipeline after entering `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub user_message: String,
}

impl From<&Error> for PipelineFailure {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            user_message: error.user_message(),
        }
    }
}

/// Progress marker reported once dispatch begins.
const DISPATCH_PROGRESS: u8 = 50;
const DONE_PROGRESS: u8 = 100;

struct State {
    phase: PipelinePhase,
    selection: Option<(FileInput, ContentKind)>,
    payload: Option<ContentPayload>,
    result: Option<NormalizedResult>,
    failure: Option<PipelineFailure>,
    progress: Option<u8>,
    // Bumped whenever held data is discarded, so late completions can tell.
    generation: u64,
}

impl State {
    fn new() -> Self {
        Self {
            phase: PipelinePhase::Idle,
            selection: None,
            payload: None,
            result: None,
            failure: None,
            progress: None,
            generation: 0,
        }
    }

    fn clear(&mut self) {
        self.selection = None;
        self.payload = None;
        self.result = None;
        self.failure = None;
        self.progress = None;
        self.generation += 1;
    }

    fn fail(&mut self, error: &Error) {
        error!("Analysis pipeline failed: {}", error);
        self.phase = PipelinePhase::Failed;
        self.payload = None;
        self.result = None;
        self.progress = None;
        self.failure = Some(PipelineFailure::from(error));
    }
}

/// Fails the pipeline when an `analyze` future is dropped mid-dispatch.
struct DispatchGuard<'a> {
    pipeline: &'a Pipeline,
    generation: u64,
    armed: bool,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.pipeline.lock();
        if state.generation == self.generation && state.phase == PipelinePhase::Dispatching {
            warn!("Analysis was abandoned before the service replied");
            state.fail(&Error::NetworkFailure(
                "request was abandoned before a reply arrived".to_string(),
            ));
        }
    }
}

/// Single-flight analysis state machine. Clones share the same state.
#[derive(Clone)]
pub struct Pipeline {
    state: Arc<Mutex<State>>,
    dispatcher: Arc<AnalysisDispatcher>,
    probe: Arc<ReadinessProbe>,
    on_progress: Option<Arc<ProgressFn>>,
}

impl Pipeline {
    pub fn new(dispatcher: Arc<AnalysisDispatcher>, probe: Arc<ReadinessProbe>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new())),
            dispatcher,
            probe,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: Arc<ProgressFn>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Called with the state lock released.
    fn notify(&self, percent: u8) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(percent);
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.lock().phase
    }

    pub fn result(&self) -> Option<NormalizedResult> {
        self.lock().result.clone()
    }

    pub fn last_error(&self) -> Option<PipelineFailure> {
        self.lock().failure.clone()
    }

    pub fn progress(&self) -> Option<u8> {
        self.lock().progress
    }

    pub fn selected_kind(&self) -> Option<ContentKind> {
        self.lock().selection.as_ref().map(|(_, kind)| *kind)
    }

    pub fn sentiment(&self) -> Option<Sentiment> {
        self.lock().result.as_ref().map(sentiment_of)
    }

    pub fn probe(&self) -> &ReadinessProbe {
        &self.probe
    }

    fn select(&self, input: FileInput, classification: Classification) -> Result<ContentKind> {
        let mut state = self.lock();
        if state.phase == PipelinePhase::Dispatching {
            return Err(Error::Busy);
        }

        state.clear();
        state.phase = PipelinePhase::Selecting;

        match classification.kind() {
            Some(kind) => {
                info!("Selected '{}' for {} analysis", input.name, kind);
                state.selection = Some((input, kind));
                Ok(kind)
            }
            None => {
                let declared = if input.mime_type.is_empty() {
                    "unknown"
                } else {
                    input.mime_type.as_str()
                };
                let err = Error::UnsupportedContentType(format!(
                    "File type \"{}\" is not supported",
                    declared
                ));
                state.fail(&err);
                Err(err)
            }
        }
    }

    /// Select a file. Discards any previous payload, result, or error.
    pub fn select_file(&self, input: FileInput) -> Result<ContentKind> {
        let classification = classify_file(&input);
        self.select(input, classification)
    }

    /// Select typed text.
    pub fn select_text(&self, text: String) -> Result<ContentKind> {
        let classification = classify_text(&text);
        self.select(FileInput::pasted_text(text), classification)
    }

    /// Select the first usable item of a clipboard paste.
    pub fn select_paste(&self, items: Vec<PasteItem>) -> Result<ContentKind> {
        match resolve_paste(items) {
            Ok(input) => self.select_file(input),
            Err(err) => {
                let mut state = self.lock();
                if state.phase == PipelinePhase::Dispatching {
                    return Err(Error::Busy);
                }
                state.clear();
                state.fail(&err);
                Err(err)
            }
        }
    }

    /// Read the selected input into a payload. The phase stays `Reading`
    /// until [`analyze`](Self::analyze) is called.
    pub async fn read(&self) -> Result<()> {
        let (input, kind, generation) = {
            let mut state = self.lock();
            match state.phase {
                PipelinePhase::Dispatching => return Err(Error::Busy),
                PipelinePhase::Selecting => {}
                other => {
                    return Err(Error::InvalidTransition(format!(
                        "cannot read while {:?}",
                        other
                    )))
                }
            }
            let Some((input, kind)) = state.selection.clone() else {
                return Err(Error::InvalidTransition(
                    "nothing has been selected".to_string(),
                ));
            };
            state.phase = PipelinePhase::Reading;
            (input, kind, state.generation)
        };

        let tracker = self.clone();
        let progress = move |percent: u8| {
            let current = {
                let mut state = tracker.lock();
                let current = state.generation == generation;
                if current {
                    state.progress = Some(percent);
                }
                current
            };
            if current {
                tracker.notify(percent);
            }
        };

        let outcome = ingest(&input, kind, &progress).await;

        let mut state = self.lock();
        if state.generation != generation {
            warn!("Discarding read of '{}': selection changed", input.name);
            return Err(Error::InvalidTransition(
                "selection changed while reading".to_string(),
            ));
        }
        match outcome {
            Ok(payload) => {
                state.payload = Some(payload);
                Ok(())
            }
            Err(err) => {
                state.fail(&err);
                Err(err)
            }
        }
    }

    /// Send the read payload for analysis and hold the normalized result.
    ///
    /// Rejected with [`Error::Busy`] while another dispatch is outstanding;
    /// the held state is left untouched in that case.
    pub async fn analyze(&self) -> Result<NormalizedResult> {
        let (payload, generation) = {
            let mut state = self.lock();
            match state.phase {
                PipelinePhase::Dispatching => return Err(Error::Busy),
                PipelinePhase::Reading => {}
                other => {
                    return Err(Error::InvalidTransition(format!(
                        "cannot analyze while {:?}",
                        other
                    )))
                }
            }
            let Some(payload) = state.payload.clone() else {
                return Err(Error::InvalidTransition(
                    "content has not finished reading".to_string(),
                ));
            };
            state.phase = PipelinePhase::Dispatching;
            state.progress = Some(DISPATCH_PROGRESS);
            (payload, state.generation)
        };
        let mut guard = DispatchGuard {
            pipeline: self,
            generation,
            armed: true,
        };
        self.notify(DISPATCH_PROGRESS);

        let session = self.probe.session_state().await;
        let outcome = match self.dispatcher.dispatch(&payload, session).await {
            Ok(raw) => normalize(payload.kind(), &raw),
            Err(err) => Err(err),
        };
        guard.armed = false;

        let mut state = self.lock();
        if state.generation != generation {
            warn!("Discarding analysis result for a superseded request");
            return Err(Error::InvalidTransition(
                "request was superseded".to_string(),
            ));
        }
        match outcome {
            Ok(result) => {
                info!(
                    "Analysis succeeded ({} result)",
                    if result.is_structured() {
                        "structured"
                    } else {
                        "plain text"
                    }
                );
                state.phase = PipelinePhase::Success;
                state.payload = None;
                state.result = Some(result.clone());
                state.progress = Some(DONE_PROGRESS);
                drop(state);
                self.notify(DONE_PROGRESS);
                Ok(result)
            }
            Err(err) => {
                state.fail(&err);
                Err(err)
            }
        }
    }

    /// Read then analyze the current selection.
    pub async fn run(&self) -> Result<NormalizedResult> {
        self.read().await?;
        self.analyze().await
    }

    /// Go back to `Selecting` with the previously selected input.
    pub fn retry(&self) -> Result<()> {
        let mut state = self.lock();
        match state.phase {
            PipelinePhase::Dispatching => return Err(Error::Busy),
            PipelinePhase::Failed | PipelinePhase::Success => {}
            other => {
                return Err(Error::InvalidTransition(format!(
                    "cannot retry while {:?}",
                    other
                )))
            }
        }
        let Some(selection) = state.selection.take() else {
            return Err(Error::InvalidTransition(
                "there is no selection to retry".to_string(),
            ));
        };

        state.clear();
        state.selection = Some(selection);
        state.phase = PipelinePhase::Selecting;
        info!("Retrying analysis");
        Ok(())
    }

    /// Drop everything and return to `Idle`. Not allowed mid-dispatch, since
    /// an issued request cannot be cancelled.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock();
        if state.phase == PipelinePhase::Dispatching {
            return Err(Error::Busy);
        }
        state.clear();
        state.phase = PipelinePhase::Idle;
        Ok(())
    }
}
