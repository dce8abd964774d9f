//! Pipeline orchestration: the state machine around the generation gateway.
//!
//! A run walks a fixed sequence — Analyzing → GeneratingStylesheet →
//! RewritingDocuments → Completed — invoking the gateway once for the shared
//! stylesheet and then once per input file, strictly in upload order. Any
//! gateway failure aborts the run: state becomes Error, the message is
//! retained, and in-memory artifacts from the attempt are discarded.
//!
//! Two guards protect the state machine:
//!
//! - **Single-flight**: `start` is rejected while a run is in flight; only
//!   Idle, Completed, and Error accept a new run.
//! - **Run epoch**: `reset` bumps an epoch counter; every transition and the
//!   completion commit re-check the epoch captured at `start`, so a gateway
//!   call resolving after a reset is discarded instead of mutating state or
//!   the persisted log.
//!
//! Validator findings are non-fatal: the run completes and surfaces them as
//! warnings, but a run with findings is not written to the run history.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::error::{GatewayError, StyleForgeError, ValidationError};
use crate::gateway::{GenerationGateway, strip_code_fences};
use crate::run_log::RunHistoryStore;
use crate::types::{
    ArtifactKind, GeneratedArtifact, InputSnapshot, PipelineState, RunRecord,
    STYLESHEET_FILE_NAME, markup_file_name,
};
use crate::validator::validate_stylesheet;

/// Progress notifications emitted while a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    /// `rewriting <name> (<i>/<n>)`, emitted before each rewrite call
    Progress(String),
    /// A structural validator finding, surfaced but non-fatal
    Warning(String),
}

/// Result of a completed (or discarded) run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Stylesheet first, then rewritten documents in upload order
    pub artifacts: Vec<GeneratedArtifact>,
    /// Structural validator findings, rendered
    pub warnings: Vec<String>,
    /// Id of the persisted run record; `None` when warnings withheld
    /// persistence or the outcome was discarded
    pub record_id: Option<String>,
    /// True when a reset overtook the run and its resolution was dropped
    pub discarded: bool,
}

struct Shared {
    state: PipelineState,
    epoch: u64,
}

/// Drives the generation pipeline over an injected gateway and run log.
pub struct PipelineOrchestrator {
    gateway: Arc<dyn GenerationGateway>,
    run_log: Arc<Mutex<RunHistoryStore>>,
    model: String,
    shared: Mutex<Shared>,
    last_error: Mutex<Option<String>>,
    events: Option<UnboundedSender<PipelineEvent>>,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        run_log: Arc<Mutex<RunHistoryStore>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            run_log,
            model: model.into(),
            shared: Mutex::new(Shared {
                state: PipelineState::Idle,
                epoch: 0,
            }),
            last_error: Mutex::new(None),
            events: None,
        }
    }

    /// Attach a channel that receives state changes, progress messages, and
    /// warnings as the pipeline executes.
    pub fn set_event_sink(&mut self, sender: UnboundedSender<PipelineEvent>) {
        self.events = Some(sender);
    }

    /// Current pipeline state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.shared.lock().unwrap().state
    }

    /// Message of the failure that moved the pipeline to Error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Return to Idle and invalidate any in-flight run.
    ///
    /// There is no cancellation primitive for a dispatched gateway call; the
    /// epoch bump ensures that when such a call eventually resolves, its
    /// resolution is discarded by the transition guards.
    pub fn reset(&self) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.epoch += 1;
            shared.state = PipelineState::Idle;
        }
        *self.last_error.lock().unwrap() = None;
        self.emit(PipelineEvent::StateChanged(PipelineState::Idle));
    }

    /// Execute one full run over the captured input snapshot.
    ///
    /// Fails synchronously with a [`ValidationError`] — leaving the state
    /// untouched — when a run is already in flight, no input files are
    /// present, or the prompt is blank after trimming. Gateway failures
    /// abort the run mid-flight with state → Error.
    ///
    /// The snapshot is the run's own copy of the inputs: edits made while
    /// the run is in flight do not affect it.
    pub async fn start(&self, snapshot: InputSnapshot) -> Result<RunOutcome, StyleForgeError> {
        let run_epoch = {
            let mut shared = self.shared.lock().unwrap();
            if !shared.state.accepts_start() {
                return Err(ValidationError::RunInFlight {
                    state: shared.state.to_string(),
                }
                .into());
            }
            if snapshot.files.is_empty() {
                return Err(ValidationError::NoInputFiles.into());
            }
            if snapshot.prompt.trim().is_empty() {
                return Err(ValidationError::EmptyPrompt.into());
            }
            shared.state = PipelineState::Analyzing;
            shared.epoch
        };
        self.emit(PipelineEvent::StateChanged(PipelineState::Analyzing));

        let InputSnapshot { files, prompt } = snapshot;
        info!(files = files.len(), "starting restyle run");

        if !self.transition(run_epoch, PipelineState::GeneratingStylesheet) {
            return Ok(Self::discarded());
        }
        let raw = match self
            .gateway
            .generate_stylesheet(&files, &prompt, &self.model)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(run_epoch, e)),
        };
        let stylesheet = strip_code_fences(&raw);

        let warnings: Vec<String> = validate_stylesheet(&stylesheet)
            .iter()
            .map(ToString::to_string)
            .collect();
        for warning in &warnings {
            warn!(warning = %warning, "stylesheet failed structural validation");
            self.emit(PipelineEvent::Warning(warning.clone()));
        }

        if !self.transition(run_epoch, PipelineState::RewritingDocuments) {
            return Ok(Self::discarded());
        }
        let total = files.len();
        let mut rewritten = Vec::with_capacity(total);
        for (index, file) in files.iter().enumerate() {
            let message = format!("rewriting {} ({}/{})", file.name, index + 1, total);
            info!("{message}");
            self.emit(PipelineEvent::Progress(message));

            match self
                .gateway
                .rewrite_document(file, &stylesheet, &prompt, &self.model)
                .await
            {
                Ok(markup) => rewritten.push(GeneratedArtifact {
                    file_name: markup_file_name(&file.name),
                    content: markup,
                    kind: ArtifactKind::Markup,
                }),
                // Earlier rewrites from this attempt are dropped with the run.
                Err(e) => return Err(self.fail(run_epoch, e)),
            }
        }

        let mut artifacts = Vec::with_capacity(total + 1);
        artifacts.push(GeneratedArtifact {
            file_name: STYLESHEET_FILE_NAME.to_string(),
            content: stylesheet,
            kind: ArtifactKind::Stylesheet,
        });
        artifacts.extend(rewritten);

        // Completion commit point: state change and persist are one guarded
        // step, so a stale resolution can neither transition nor persist.
        if !self.transition(run_epoch, PipelineState::Completed) {
            return Ok(Self::discarded());
        }

        let record_id = if warnings.is_empty() {
            let record = RunRecord::new(&prompt, artifacts.clone());
            let id = record.id.clone();
            self.run_log.lock().unwrap().append(record);
            Some(id)
        } else {
            // Known-malformed stylesheets stay out of the persisted log; the
            // artifacts still go back to the caller alongside the warnings.
            None
        };

        info!(persisted = record_id.is_some(), "restyle run completed");
        Ok(RunOutcome {
            artifacts,
            warnings,
            record_id,
            discarded: false,
        })
    }

    fn discarded() -> RunOutcome {
        RunOutcome {
            discarded: true,
            ..RunOutcome::default()
        }
    }

    /// Apply a state transition unless the run has been invalidated by a
    /// reset. Returns whether the transition applied.
    fn transition(&self, run_epoch: u64, next: PipelineState) -> bool {
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.epoch != run_epoch {
                return false;
            }
            shared.state = next;
        }
        self.emit(PipelineEvent::StateChanged(next));
        true
    }

    /// Record a gateway failure: state → Error with the message retained,
    /// unless the run is stale.
    fn fail(&self, run_epoch: u64, err: GatewayError) -> StyleForgeError {
        let applied = {
            let mut shared = self.shared.lock().unwrap();
            if shared.epoch == run_epoch {
                shared.state = PipelineState::Error;
                true
            } else {
                false
            }
        };
        if applied {
            *self.last_error.lock().unwrap() = Some(err.to_string());
            warn!(error = %err, "restyle run aborted");
            self.emit(PipelineEvent::StateChanged(PipelineState::Error));
        }
        err.into()
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStore, ScriptedGateway};
    use crate::types::InputFile;

    fn orchestrator_parts(
        gateway: ScriptedGateway,
    ) -> (Arc<ScriptedGateway>, PipelineOrchestrator) {
        let gateway = Arc::new(gateway);
        let run_log = Arc::new(Mutex::new(RunHistoryStore::load(Arc::new(
            MemoryStore::default(),
        ))));
        let orchestrator = PipelineOrchestrator::new(gateway.clone(), run_log, "test-model");
        (gateway, orchestrator)
    }

    fn orchestrator_with(gateway: ScriptedGateway) -> PipelineOrchestrator {
        orchestrator_parts(gateway).1
    }

    fn snapshot(file_names: &[&str], prompt: &str) -> InputSnapshot {
        let files = file_names
            .iter()
            .map(|name| InputFile::new(*name, format!("content of {name}")))
            .collect();
        InputSnapshot::new(files, prompt)
    }

    #[tokio::test]
    async fn clean_run_produces_ordered_artifacts_and_persists() {
        let orchestrator = orchestrator_with(
            ScriptedGateway::new()
                .stylesheet_ok("```css\nbody { color: teal; }\n```")
                .rewrite_ok("<article>one</article>"),
        );

        let outcome = orchestrator
            .start(snapshot(&["one.txt"], "make it teal"))
            .await
            .unwrap();

        assert_eq!(outcome.artifacts.len(), 2);
        assert_eq!(outcome.artifacts[0].kind, ArtifactKind::Stylesheet);
        assert_eq!(outcome.artifacts[0].file_name, "stylesheet.css");
        assert_eq!(outcome.artifacts[0].content, "body { color: teal; }");
        assert_eq!(outcome.artifacts[1].kind, ArtifactKind::Markup);
        assert_eq!(outcome.artifacts[1].file_name, "one.html");
        assert!(outcome.warnings.is_empty());
        assert!(!outcome.discarded);

        let record_id = outcome.record_id.expect("clean run persists");
        let run_log = orchestrator.run_log.lock().unwrap();
        assert_eq!(run_log.len(), 1);
        assert_eq!(run_log.list()[0].id, record_id);
        assert_eq!(run_log.list()[0].prompt, "make it teal");
        assert_eq!(run_log.list()[0].artifacts, outcome.artifacts);
        assert_eq!(orchestrator.state(), PipelineState::Completed);
    }

    #[tokio::test]
    async fn start_with_zero_files_fails_without_transition() {
        let orchestrator = orchestrator_with(ScriptedGateway::new());
        let err = orchestrator
            .start(snapshot(&[], "style me"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StyleForgeError::Validation(ValidationError::NoInputFiles)
        ));
        assert_eq!(orchestrator.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn start_with_blank_prompt_fails_without_transition() {
        let orchestrator = orchestrator_with(ScriptedGateway::new());
        let err = orchestrator
            .start(snapshot(&["a.txt"], "   \n\t"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StyleForgeError::Validation(ValidationError::EmptyPrompt)
        ));
        assert_eq!(orchestrator.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn mid_rewrite_failure_discards_run_and_store_is_unchanged() {
        let orchestrator = orchestrator_with(
            ScriptedGateway::new()
                .rewrite_ok("<article>first</article>")
                .rewrite_err(GatewayError::Transport("backend went away".to_string())),
        );

        let err = orchestrator
            .start(snapshot(&["a.txt", "b.txt"], "restyle"))
            .await
            .unwrap_err();

        assert!(matches!(err, StyleForgeError::Gateway(_)));
        assert_eq!(orchestrator.state(), PipelineState::Error);
        assert!(
            orchestrator
                .last_error()
                .unwrap()
                .contains("backend went away")
        );
        assert!(orchestrator.run_log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stylesheet_failure_moves_to_error() {
        let orchestrator = orchestrator_with(
            ScriptedGateway::new()
                .stylesheet_err(GatewayError::Provider {
                    status: 503,
                    message: "model loading".to_string(),
                }),
        );

        let err = orchestrator
            .start(snapshot(&["a.txt"], "restyle"))
            .await
            .unwrap_err();
        assert!(matches!(err, StyleForgeError::Gateway(_)));
        assert_eq!(orchestrator.state(), PipelineState::Error);
    }

    #[tokio::test]
    async fn rewrites_run_in_upload_order() {
        let (gateway, orchestrator) = orchestrator_parts(ScriptedGateway::new());

        orchestrator
            .start(snapshot(&["first.txt", "second.txt", "third.txt"], "order"))
            .await
            .unwrap();

        assert_eq!(
            gateway.calls(),
            vec![
                "stylesheet",
                "rewrite:first.txt",
                "rewrite:second.txt",
                "rewrite:third.txt",
            ]
        );
    }

    #[tokio::test]
    async fn warnings_complete_the_run_but_withhold_persistence() {
        let orchestrator = orchestrator_with(
            ScriptedGateway::new().stylesheet_ok("body { color: red;"),
        );

        let outcome = orchestrator
            .start(snapshot(&["a.txt"], "lopsided"))
            .await
            .unwrap();

        assert_eq!(orchestrator.state(), PipelineState::Completed);
        assert_eq!(outcome.warnings, vec!["missing 1 closing brace"]);
        assert!(outcome.record_id.is_none());
        assert_eq!(outcome.artifacts.len(), 2);
        assert!(orchestrator.run_log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_state_accepts_a_retry() {
        let orchestrator = orchestrator_with(
            ScriptedGateway::new()
                .stylesheet_err(GatewayError::Transport("flaky".to_string()))
                .stylesheet_ok("body {}"),
        );

        let snapshot_fn = || snapshot(&["a.txt"], "retry me");
        assert!(orchestrator.start(snapshot_fn()).await.is_err());
        assert_eq!(orchestrator.state(), PipelineState::Error);

        let outcome = orchestrator.start(snapshot_fn()).await.unwrap();
        assert!(outcome.record_id.is_some());
        assert_eq!(orchestrator.state(), PipelineState::Completed);
    }

    #[tokio::test]
    async fn reset_returns_to_idle_and_clears_error() {
        let orchestrator = orchestrator_with(
            ScriptedGateway::new()
                .stylesheet_err(GatewayError::Transport("boom".to_string())),
        );
        let _ = orchestrator.start(snapshot(&["a.txt"], "x")).await;
        assert_eq!(orchestrator.state(), PipelineState::Error);

        orchestrator.reset();
        assert_eq!(orchestrator.state(), PipelineState::Idle);
        assert!(orchestrator.last_error().is_none());
    }
}
