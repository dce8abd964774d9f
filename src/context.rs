//! Application context: the single startup-constructed object that owns
//! process state.
//!
//! The context loads the persisted theme, template catalog, and run history
//! once at construction, owns the input snapshot history and its debouncer,
//! and fronts the pipeline orchestrator. Components receive it explicitly;
//! there is no module-level mutable state.
//!
//! Every input mutation carries an [`EditSource`]: user edits feed the
//! snapshot history (structural edits immediately, prompt edits debounced),
//! replay during undo/redo restores state without re-recording.

use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::error::{CatalogError, StyleForgeError};
use crate::export::write_artifacts;
use crate::gateway::GenerationGateway;
use crate::history::{EditSource, InputSnapshotHistory, PromptDebouncer};
use crate::orchestrator::{PipelineEvent, PipelineOrchestrator, RunOutcome};
use crate::persist::{KvStore, load_or_default, save_logged};
use crate::run_log::RunHistoryStore;
use crate::templates::TemplateCatalog;
use crate::types::{
    InputFile, InputSnapshot, MAX_INPUT_FILES, PipelineState, RunRecord, ThemeMode,
};

/// Storage key for the persisted theme preference.
pub const THEME_KEY: &str = "theme";

/// Key bindings exposed by the application shell. Each is a no-op when its
/// precondition is unmet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Export the latest run's artifacts as flat entries under `dest`
    SaveAllArtifacts { dest: Utf8PathBuf },
    Undo,
    Redo,
}

/// Owns all per-process state and the pipeline orchestrator.
pub struct AppContext {
    store: Arc<dyn KvStore>,
    gateway: Arc<dyn GenerationGateway>,
    theme: ThemeMode,
    templates: TemplateCatalog,
    run_log: Arc<Mutex<RunHistoryStore>>,
    history: InputSnapshotHistory,
    debouncer: PromptDebouncer,
    files: Vec<InputFile>,
    prompt: String,
    orchestrator: PipelineOrchestrator,
    last_outcome: Option<RunOutcome>,
}

impl AppContext {
    /// Construct the context, loading persisted state through the store.
    #[must_use]
    pub fn new(
        store: Arc<dyn KvStore>,
        gateway: Arc<dyn GenerationGateway>,
        model: impl Into<String>,
    ) -> Self {
        let theme: ThemeMode = load_or_default(store.as_ref(), THEME_KEY);
        let templates = TemplateCatalog::load(store.clone());
        let run_log = Arc::new(Mutex::new(RunHistoryStore::load(store.clone())));
        let orchestrator = PipelineOrchestrator::new(gateway.clone(), run_log.clone(), model);

        Self {
            store,
            gateway,
            theme,
            templates,
            run_log,
            history: InputSnapshotHistory::default(),
            debouncer: PromptDebouncer::new(),
            files: Vec::new(),
            prompt: String::new(),
            orchestrator,
            last_outcome: None,
        }
    }

    /// Route pipeline events (state changes, progress, warnings) to `sender`.
    pub fn set_event_sink(&mut self, sender: UnboundedSender<PipelineEvent>) {
        self.orchestrator.set_event_sink(sender);
    }

    // ---- theme ----

    #[must_use]
    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    pub fn set_theme(&mut self, theme: ThemeMode) {
        self.theme = theme;
        save_logged(self.store.as_ref(), THEME_KEY, &self.theme);
    }

    // ---- inputs ----

    #[must_use]
    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Admit a document. Returns the assigned id, or `None` when the
    /// admission cap is reached (excess submissions are silently dropped).
    ///
    /// A structural edit: commits a snapshot immediately and cancels any
    /// pending debounced prompt commit (the new snapshot already carries the
    /// current prompt text).
    pub fn add_file(
        &mut self,
        name: impl Into<String>,
        content: impl Into<String>,
        source: EditSource,
    ) -> Option<String> {
        if self.files.len() >= MAX_INPUT_FILES {
            debug!("input file cap reached, dropping submission");
            return None;
        }
        let file = InputFile::new(name, content);
        let id = file.id.clone();
        self.files.push(file);
        self.commit_structural(source);
        Some(id)
    }

    /// Remove a document by id; a no-op for an unknown id.
    pub fn remove_file(&mut self, id: &str, source: EditSource) {
        let before = self.files.len();
        self.files.retain(|f| f.id != id);
        if self.files.len() != before {
            self.commit_structural(source);
        }
    }

    /// Update the prompt text. A free-text edit: the snapshot commit is
    /// debounced, and each edit within the quiet period restarts the timer.
    pub fn set_prompt(&mut self, text: impl Into<String>, source: EditSource, now: Instant) {
        self.prompt = text.into();
        if source == EditSource::UserEdit {
            self.debouncer.schedule(self.current_snapshot(), now);
        }
    }

    /// Adopt a template's prompt. Template selection is a committable edit
    /// with the same immediate-commit rule as structural edits.
    pub fn apply_template(&mut self, id: &str, source: EditSource) -> Result<(), CatalogError> {
        let prompt = self
            .templates
            .get(id)
            .ok_or_else(|| CatalogError::NotFound { id: id.to_string() })?
            .prompt
            .clone();
        self.prompt = prompt;
        self.commit_structural(source);
        Ok(())
    }

    /// Commit the pending debounced prompt edit if its quiet period has
    /// elapsed at `now`.
    pub fn poll_pending_edit(&mut self, now: Instant) {
        if let Some(snapshot) = self.debouncer.take_due(now) {
            self.history.record(snapshot, EditSource::UserEdit);
        }
    }

    /// Commit the pending debounced prompt edit immediately, if any.
    pub fn flush_pending_edit(&mut self) {
        if let Some(snapshot) = self.debouncer.flush() {
            self.history.record(snapshot, EditSource::UserEdit);
        }
    }

    /// Deadline of the pending prompt commit, for event-loop scheduling.
    #[must_use]
    pub fn pending_edit_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Step the history back and restore that snapshot. No-op at the start.
    pub fn undo(&mut self) {
        self.flush_pending_edit();
        let snapshot = self.history.undo().clone();
        self.restore(snapshot);
    }

    /// Step the history forward and restore that snapshot. No-op at the tail.
    pub fn redo(&mut self) {
        self.flush_pending_edit();
        let snapshot = self.history.redo().clone();
        self.restore(snapshot);
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Start a new project: clear inputs, replace the history with a single
    /// initial snapshot, and return the pipeline to Idle.
    pub fn reset_project(&mut self) {
        self.files.clear();
        self.prompt.clear();
        self.debouncer.cancel();
        self.history.reset(InputSnapshot::default());
        self.last_outcome = None;
        self.orchestrator.reset();
    }

    /// The current (file-set, prompt) pair.
    #[must_use]
    pub fn current_snapshot(&self) -> InputSnapshot {
        InputSnapshot::new(self.files.clone(), self.prompt.clone())
    }

    // ---- pipeline ----

    /// Run the pipeline over the current inputs. Any pending debounced
    /// prompt edit is committed first so the run captures the text the user
    /// last typed.
    pub async fn generate(&mut self) -> Result<RunOutcome, StyleForgeError> {
        self.flush_pending_edit();
        let outcome = self.orchestrator.start(self.current_snapshot()).await?;
        if !outcome.discarded {
            self.last_outcome = Some(outcome.clone());
        }
        Ok(outcome)
    }

    #[must_use]
    pub fn pipeline_state(&self) -> PipelineState {
        self.orchestrator.state()
    }

    #[must_use]
    pub fn last_pipeline_error(&self) -> Option<String> {
        self.orchestrator.last_error()
    }

    /// Artifacts of the most recent completed run, if any.
    #[must_use]
    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        self.last_outcome.as_ref()
    }

    // ---- run history ----

    /// Persisted run records, newest first.
    #[must_use]
    pub fn runs(&self) -> Vec<RunRecord> {
        self.run_log.lock().unwrap().list().to_vec()
    }

    /// Delete a persisted run record; no-op for an unknown id.
    pub fn remove_run(&mut self, id: &str) {
        self.run_log.lock().unwrap().remove(id);
    }

    // ---- templates ----

    #[must_use]
    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateCatalog {
        &mut self.templates
    }

    // ---- models ----

    /// Best-effort local model listing from the gateway.
    pub async fn list_models(&self) -> Vec<crate::types::ModelDescriptor> {
        self.gateway.list_local_models().await
    }

    // ---- command surface ----

    /// Dispatch a key binding. Each command is a no-op when its
    /// precondition (artifacts present / history available) is unmet.
    pub fn dispatch(&mut self, command: Command) -> Result<(), StyleForgeError> {
        match command {
            Command::SaveAllArtifacts { dest } => self.save_all_artifacts(&dest).map(|_| ()),
            Command::Undo => {
                if self.can_undo() {
                    self.undo();
                }
                Ok(())
            }
            Command::Redo => {
                if self.can_redo() {
                    self.redo();
                }
                Ok(())
            }
        }
    }

    /// Export the latest run's artifacts as flat entries under `dest`.
    /// No-op (returning no paths) when no artifacts exist.
    pub fn save_all_artifacts(
        &self,
        dest: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, StyleForgeError> {
        match &self.last_outcome {
            Some(outcome) if !outcome.artifacts.is_empty() => {
                Ok(write_artifacts(dest, &outcome.artifacts)?)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn commit_structural(&mut self, source: EditSource) {
        if source == EditSource::Replay {
            return;
        }
        self.debouncer.cancel();
        self.history.record(self.current_snapshot(), source);
    }

    fn restore(&mut self, snapshot: InputSnapshot) {
        // Replay: restore state without feeding the history.
        self.files = snapshot.files;
        self.prompt = snapshot.prompt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStore, ScriptedGateway};
    use std::time::Duration;

    fn context() -> AppContext {
        AppContext::new(
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedGateway::new()),
            "test-model",
        )
    }

    #[test]
    fn admission_cap_silently_drops_excess_files() {
        let mut ctx = context();
        for i in 0..MAX_INPUT_FILES {
            assert!(
                ctx.add_file(format!("f{i}.txt"), "text", EditSource::UserEdit)
                    .is_some()
            );
        }
        assert!(
            ctx.add_file("overflow.txt", "text", EditSource::UserEdit)
                .is_none()
        );
        assert_eq!(ctx.files().len(), MAX_INPUT_FILES);
    }

    #[test]
    fn structural_edits_commit_immediately() {
        let mut ctx = context();
        ctx.add_file("a.txt", "alpha", EditSource::UserEdit);
        assert!(ctx.can_undo());

        ctx.undo();
        assert!(ctx.files().is_empty());
        ctx.redo();
        assert_eq!(ctx.files().len(), 1);
    }

    #[test]
    fn prompt_edits_are_debounced_until_quiet() {
        let mut ctx = context();
        let t0 = Instant::now();
        ctx.set_prompt("make it", EditSource::UserEdit, t0);
        ctx.set_prompt("make it blue", EditSource::UserEdit, t0 + Duration::from_millis(400));

        // Quiet period has not elapsed since the second edit.
        ctx.poll_pending_edit(t0 + Duration::from_millis(1000));
        assert!(!ctx.can_undo());

        ctx.poll_pending_edit(t0 + Duration::from_millis(1400));
        assert!(ctx.can_undo());
        ctx.undo();
        assert_eq!(ctx.prompt(), "");
        ctx.redo();
        assert_eq!(ctx.prompt(), "make it blue");
    }

    #[test]
    fn structural_edit_cancels_pending_prompt_commit() {
        let mut ctx = context();
        let t0 = Instant::now();
        ctx.set_prompt("typed", EditSource::UserEdit, t0);
        ctx.add_file("a.txt", "alpha", EditSource::UserEdit);

        // Only the structural snapshot exists; it carries the typed prompt.
        ctx.poll_pending_edit(t0 + Duration::from_secs(5));
        ctx.undo();
        assert!(ctx.files().is_empty());
        assert_eq!(ctx.prompt(), "");
        assert!(!ctx.can_undo());
    }

    #[test]
    fn replay_mutations_do_not_feed_history() {
        let mut ctx = context();
        ctx.add_file("a.txt", "alpha", EditSource::UserEdit);
        let len_before = ctx.history.len();
        ctx.add_file("ghost.txt", "boo", EditSource::Replay);
        assert_eq!(ctx.history.len(), len_before);
    }

    #[test]
    fn apply_template_commits_immediately() {
        let mut ctx = context();
        let id = ctx.templates().list()[0].id.clone();
        ctx.apply_template(&id, EditSource::UserEdit).unwrap();
        assert!(!ctx.prompt().is_empty());
        assert!(ctx.can_undo());
    }

    #[test]
    fn reset_project_clears_inputs_and_history() {
        let mut ctx = context();
        ctx.add_file("a.txt", "alpha", EditSource::UserEdit);
        ctx.set_prompt("styled", EditSource::UserEdit, Instant::now());
        ctx.reset_project();

        assert!(ctx.files().is_empty());
        assert_eq!(ctx.prompt(), "");
        assert!(!ctx.can_undo());
        assert!(!ctx.can_redo());
        assert_eq!(ctx.pipeline_state(), PipelineState::Idle);
    }

    #[test]
    fn save_all_artifacts_is_noop_without_a_run() {
        let ctx = context();
        let dir = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        assert!(ctx.save_all_artifacts(&dest).unwrap().is_empty());
    }

    #[test]
    fn undo_redo_commands_are_noops_without_history() {
        let mut ctx = context();
        ctx.dispatch(Command::Undo).unwrap();
        ctx.dispatch(Command::Redo).unwrap();
        assert!(ctx.files().is_empty());
    }

    #[test]
    fn theme_round_trips_through_the_store() {
        let store = Arc::new(MemoryStore::default());
        {
            let mut ctx = AppContext::new(
                store.clone(),
                Arc::new(ScriptedGateway::new()),
                "test-model",
            );
            ctx.set_theme(ThemeMode::Dark);
        }
        let ctx = AppContext::new(store, Arc::new(ScriptedGateway::new()), "test-model");
        assert_eq!(ctx.theme(), ThemeMode::Dark);
    }

    #[tokio::test]
    async fn generate_flushes_pending_prompt_edit() {
        let mut ctx = context();
        ctx.add_file("a.txt", "alpha", EditSource::UserEdit);
        ctx.set_prompt("latest words", EditSource::UserEdit, Instant::now());

        let outcome = ctx.generate().await.unwrap();
        assert!(outcome.record_id.is_some());
        assert_eq!(ctx.runs()[0].prompt, "latest words");
        // The flush also committed the prompt snapshot to history.
        assert!(ctx.pending_edit_deadline().is_none());
    }
}
