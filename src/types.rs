use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of input documents admitted into a project.
///
/// Enforced at admission: submissions beyond the cap are silently dropped.
pub const MAX_INPUT_FILES: usize = 4;

/// Maximum number of run records retained in the persisted run history.
pub const RUN_HISTORY_CAP: usize = 20;

/// Quiet period after the last prompt keystroke before a history commit.
pub const PROMPT_DEBOUNCE_MS: u64 = 1000;

static FILE_SEQ: AtomicU64 = AtomicU64::new(1);
static RUN_SEQ: AtomicU64 = AtomicU64::new(1);

/// A user-submitted text document. Immutable once created; removed by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    /// Opaque unique token assigned at admission
    pub id: String,
    /// Display name, also the basis for the rewritten artifact's name
    pub name: String,
    /// Full text content
    pub content: String,
}

impl InputFile {
    /// Create an input file with a fresh process-unique id.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let seq = FILE_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("file-{seq}"),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Kind of generated output a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// The shared stylesheet, exactly one per run
    Stylesheet,
    /// A rewritten document, one per input file
    Markup,
}

impl ArtifactKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stylesheet => "stylesheet",
            Self::Markup => "markup",
        }
    }
}

/// One unit of generated output.
///
/// A completed run produces exactly one stylesheet artifact followed by one
/// markup artifact per input file, in upload order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// Entry name used when exporting (flat, no directories)
    pub file_name: String,
    /// Generated text
    pub content: String,
    /// Stylesheet or markup
    pub kind: ArtifactKind,
}

/// A captured (file-set, prompt) pair eligible for undo/redo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    /// Ordered input documents
    pub files: Vec<InputFile>,
    /// Current style request text
    pub prompt: String,
}

impl InputSnapshot {
    #[must_use]
    pub fn new(files: Vec<InputFile>, prompt: impl Into<String>) -> Self {
        Self {
            files,
            prompt: prompt.into(),
        }
    }
}

/// A completed pipeline run as retained in the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique record id
    pub id: String,
    /// RFC3339 UTC timestamp of completion
    pub created_at: DateTime<Utc>,
    /// Style request the run was generated from
    pub prompt: String,
    /// Stylesheet first, then rewritten documents in upload order
    pub artifacts: Vec<GeneratedArtifact>,
}

impl RunRecord {
    /// Create a record for a just-completed run with a fresh id.
    #[must_use]
    pub fn new(prompt: impl Into<String>, artifacts: Vec<GeneratedArtifact>) -> Self {
        let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
        let created_at = Utc::now();
        Self {
            id: format!("run-{}-{seq}", created_at.format("%Y%m%d%H%M%S")),
            created_at,
            prompt: prompt.into(),
            artifacts,
        }
    }
}

/// Pipeline progress states. Transitions happen only under orchestrator
/// control; Completed and Error return to Idle via explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Analyzing,
    GeneratingStylesheet,
    RewritingDocuments,
    Completed,
    Error,
}

impl PipelineState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::GeneratingStylesheet => "generating_stylesheet",
            Self::RewritingDocuments => "rewriting_documents",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether a new run may be started from this state.
    #[must_use]
    pub const fn accepts_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reusable style request in the template catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleTemplate {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub like_count: u32,
    pub is_liked: bool,
    /// Built-in templates are read-only; user-authored ones may be renamed
    /// or deleted
    pub is_user_authored: bool,
}

/// Descriptor for a model offered by the local generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model name as reported by the backend
    pub name: String,
    /// Parameter-size label if the backend reports one (e.g. "7B")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_size: Option<String>,
}

/// Persisted UI theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl std::str::FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme '{other}', expected light or dark")),
        }
    }
}

/// Derive the exported file name for a rewritten document from its input
/// name: the stem keeps its casing, the extension becomes `.html`.
#[must_use]
pub fn markup_file_name(input_name: &str) -> String {
    let base = input_name.rsplit(['/', '\\']).next().unwrap_or(input_name);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.html"),
        _ => format!("{base}.html"),
    }
}

/// File name of the shared stylesheet artifact.
pub const STYLESHEET_FILE_NAME: &str = "stylesheet.css";
