//! Test seams; not part of public API stability guarantees.
//!
//! Scripted collaborators for unit and integration tests: a queue-driven
//! generation gateway and an in-memory key-value store.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{GatewayError, PersistenceError};
use crate::gateway::GenerationGateway;
use crate::persist::KvStore;
use crate::types::{InputFile, ModelDescriptor};

/// Gateway stub driven by queued responses.
///
/// Each call pops the next scripted result for its kind; an empty queue
/// synthesizes a deterministic success so tests only script what they care
/// about. An optional latency is applied before every generation response,
/// which lets paused-clock tests interleave resets with in-flight calls.
#[derive(Default)]
pub struct ScriptedGateway {
    stylesheet: Mutex<VecDeque<Result<String, GatewayError>>>,
    rewrites: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
    models: Vec<ModelDescriptor>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stylesheet_ok(self, text: impl Into<String>) -> Self {
        self.stylesheet
            .lock()
            .unwrap()
            .push_back(Ok(text.into()));
        self
    }

    #[must_use]
    pub fn stylesheet_err(self, err: GatewayError) -> Self {
        self.stylesheet.lock().unwrap().push_back(Err(err));
        self
    }

    #[must_use]
    pub fn rewrite_ok(self, text: impl Into<String>) -> Self {
        self.rewrites.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    #[must_use]
    pub fn rewrite_err(self, err: GatewayError) -> Self {
        self.rewrites.lock().unwrap().push_back(Err(err));
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelDescriptor>) -> Self {
        self.models = models;
        self
    }

    /// Calls observed so far: `"stylesheet"` or `"rewrite:<name>"`, in
    /// dispatch order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn generate_stylesheet(
        &self,
        _files: &[InputFile],
        prompt: &str,
        _model: &str,
    ) -> Result<String, GatewayError> {
        self.calls.lock().unwrap().push("stylesheet".to_string());
        self.pause().await;
        let scripted = self.stylesheet.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("/* stylesheet for: {prompt} */ body {{}}")))
    }

    async fn rewrite_document(
        &self,
        file: &InputFile,
        _stylesheet: &str,
        _prompt: &str,
        _model: &str,
    ) -> Result<String, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("rewrite:{}", file.name));
        self.pause().await;
        let scripted = self.rewrites.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("<article>{}</article>", file.name)))
    }

    async fn list_local_models(&self) -> Vec<ModelDescriptor> {
        self.models.clone()
    }
}

/// In-memory key-value store with an optional write-failure switch.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Make every subsequent `set` fail, for exercising the swallowed
    /// write-failure policy.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write {
                key: key.to_string(),
                reason: "write failures enabled".to_string(),
            });
        }
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}
