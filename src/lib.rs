//! styleforge - restyle document sets through a local generation backend
//!
//! styleforge takes a small set of text documents plus a natural-language
//! style request and produces a coherent rewritten document set: one shared
//! stylesheet plus one rewritten markup document per input, generated by
//! driving an external text-generation service through a fixed multi-step
//! sequence.
//!
//! The crate's core is the orchestration around the generation calls:
//!
//! - [`history::InputSnapshotHistory`] — linear undo/redo over
//!   (file-set, prompt) snapshots, with debounced prompt commits and
//!   immediate structural commits.
//! - [`orchestrator::PipelineOrchestrator`] — the multi-stage state machine
//!   over the [`gateway::GenerationGateway`] seam, with single-flight and
//!   stale-resolution guards.
//! - [`run_log::RunHistoryStore`] — bounded, persisted, newest-first log of
//!   completed runs.
//! - [`validator::validate_stylesheet`] — pure structural validation of
//!   generated stylesheet text; findings are advisory.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! styleforge run notes.txt draft.txt --prompt "austere, academic, navy accents"
//! styleforge history list --json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use styleforge::context::AppContext;
//! use styleforge::gateway::LocalHttpGateway;
//! use styleforge::history::EditSource;
//! use styleforge::persist::JsonFileStore;
//!
//! # async fn demo() -> Result<(), styleforge::StyleForgeError> {
//! let store = Arc::new(JsonFileStore::new("/tmp/styleforge"));
//! let gateway = Arc::new(LocalHttpGateway::new(None)?);
//! let mut ctx = AppContext::new(store, gateway, "llama3.1");
//!
//! ctx.add_file("notes.txt", "raw notes", EditSource::UserEdit);
//! ctx.set_prompt("minimalist", EditSource::UserEdit, std::time::Instant::now());
//! let outcome = ctx.generate().await?;
//! println!("{} artifact(s)", outcome.artifacts.len());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod context;
pub mod error;
pub mod export;
pub mod gateway;
pub mod history;
pub mod logging;
pub mod orchestrator;
pub mod persist;
pub mod run_log;
pub mod templates;
pub mod types;
pub mod validator;

#[doc(hidden)]
pub mod test_support;

pub use context::{AppContext, Command};
pub use error::{
    CatalogError, GatewayError, PersistenceError, StyleForgeError, ValidationError,
};
pub use gateway::GenerationGateway;
pub use history::{EditSource, InputSnapshotHistory, PromptDebouncer};
pub use orchestrator::{PipelineEvent, PipelineOrchestrator, RunOutcome};
pub use run_log::RunHistoryStore;
pub use templates::TemplateCatalog;
pub use types::{
    ArtifactKind, GeneratedArtifact, InputFile, InputSnapshot, ModelDescriptor, PipelineState,
    RunRecord, StyleTemplate, ThemeMode,
};
pub use validator::{Finding, validate_stylesheet};
