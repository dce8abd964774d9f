//! Error taxonomy for styleforge operations.
//!
//! Library code returns [`StyleForgeError`] and does NOT call
//! `std::process::exit()`; the CLI maps errors to exit status.
//!
//! The taxonomy mirrors the propagation policy: validation and gateway
//! failures are terminal for the current run and surfaced to the caller;
//! persistence failures are recovered locally (defaults on load, logged and
//! swallowed on write) and never reach the user-visible flow. Structural
//! validator findings are not errors at all — they travel as warnings on the
//! run outcome.

use thiserror::Error;

/// Top-level library error type.
#[derive(Error, Debug)]
pub enum StyleForgeError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("template catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input problems detected synchronously before a run starts.
///
/// A validation failure never transitions the pipeline state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no input documents present")]
    NoInputFiles,

    #[error("style prompt is empty")]
    EmptyPrompt,

    #[error("a run is already in flight (state: {state})")]
    RunInFlight { state: String },
}

/// Failures from the generation collaborator.
///
/// Any gateway failure aborts the run mid-flight; the run is retryable by
/// starting again with the same or edited inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport-level failure (connect, DNS, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("backend error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Backend answered but the body was not the expected shape
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// Backend cannot be constructed from the given configuration
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),
}

/// Failures of the key-value persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("failed to read key '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write key '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("failed to serialize value for key '{key}': {reason}")]
    Serialize { key: String, reason: String },
}

/// Template catalog mutation preconditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("template '{id}' not found")]
    NotFound { id: String },

    #[error("template '{id}' is built-in and cannot be renamed or deleted")]
    BuiltinImmutable { id: String },
}
