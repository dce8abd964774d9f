//! Generation gateway abstraction and the local HTTP backend.
//!
//! The orchestrator drives text generation through the [`GenerationGateway`]
//! trait and never talks to a provider directly, so any backend (or a
//! scripted stub in tests) can stand behind it. The bundled implementation
//! targets an Ollama-compatible local server: `POST /api/generate` for
//! generation and `GET /api/tags` for best-effort model listing.
//!
//! Prompt content and model selection are passed through; the gateway adds
//! only the fixed task framing around the user's request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::types::{InputFile, ModelDescriptor};

/// Default base URL of the local generation server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model when none is selected.
pub const DEFAULT_MODEL: &str = "llama3.1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// External text-generation service consumed by the orchestrator.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Generate the shared stylesheet from all input files and the style
    /// prompt. Returns raw response text; callers strip fence markup.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on any transport or model failure.
    async fn generate_stylesheet(
        &self,
        files: &[InputFile],
        prompt: &str,
        model: &str,
    ) -> Result<String, GatewayError>;

    /// Rewrite one document against the generated stylesheet and the style
    /// prompt.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on any transport or model failure.
    async fn rewrite_document(
        &self,
        file: &InputFile,
        stylesheet: &str,
        prompt: &str,
        model: &str,
    ) -> Result<String, GatewayError>;

    /// List models offered by the local backend. Best-effort: returns an
    /// empty list on any failure, never errors.
    async fn list_local_models(&self) -> Vec<ModelDescriptor>;
}

/// Strip surrounding Markdown code-fence markup from a generated response.
///
/// Models routinely wrap output in ```` ```css … ``` ```` even when asked
/// not to. If the trimmed response opens with a fence line, that line and a
/// matching trailing fence line are removed; anything else passes through
/// trimmed.
#[must_use]
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines = trimmed.lines();
    lines.next(); // opening fence, possibly with a language tag
    let mut body: Vec<&str> = lines.collect();
    if body.last().is_some_and(|line| line.trim() == "```") {
        body.pop();
    }
    body.join("\n").trim().to_string()
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    details: Option<TagModelDetails>,
}

#[derive(Deserialize)]
struct TagModelDetails {
    #[serde(default)]
    parameter_size: Option<String>,
}

/// HTTP gateway against an Ollama-compatible local server.
pub struct LocalHttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl LocalHttpGateway {
    /// Create a gateway against `base_url` (falls back to
    /// [`DEFAULT_BASE_URL`] when `None`).
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Misconfiguration` if the HTTP client cannot
    /// be constructed.
    pub fn new(base_url: Option<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Misconfiguration(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    async fn generate(&self, model: &str, prompt: String) -> Result<String, GatewayError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(url = %url, model, "dispatching generation request");

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        Ok(body.response)
    }
}

#[async_trait]
impl GenerationGateway for LocalHttpGateway {
    async fn generate_stylesheet(
        &self,
        files: &[InputFile],
        prompt: &str,
        model: &str,
    ) -> Result<String, GatewayError> {
        let mut request = String::from(
            "You are a stylesheet author. Produce a single CSS stylesheet that \
             applies the requested style to the documents below. Respond with \
             CSS only, no commentary.\n\n",
        );
        request.push_str(&format!("Style request: {prompt}\n"));
        for file in files {
            request.push_str(&format!("\n--- {} ---\n{}\n", file.name, file.content));
        }
        self.generate(model, request).await
    }

    async fn rewrite_document(
        &self,
        file: &InputFile,
        stylesheet: &str,
        prompt: &str,
        model: &str,
    ) -> Result<String, GatewayError> {
        let request = format!(
            "You are a document rewriter. Rewrite the document below as HTML \
             markup in the requested style, consistent with the shared \
             stylesheet. Respond with markup only, no commentary.\n\n\
             Style request: {prompt}\n\nStylesheet:\n{stylesheet}\n\n\
             --- {} ---\n{}\n",
            file.name, file.content
        );
        self.generate(model, request).await
    }

    async fn list_local_models(&self) -> Vec<ModelDescriptor> {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "model listing unavailable");
                return Vec::new();
            }
        };
        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "model listing rejected");
            return Vec::new();
        }
        match response.json::<TagsResponse>().await {
            Ok(tags) => tags
                .models
                .into_iter()
                .map(|m| ModelDescriptor {
                    name: m.name,
                    parameter_size: m.details.and_then(|d| d.parameter_size),
                })
                .collect(),
            Err(e) => {
                warn!(url = %url, error = %e, "model listing unparsable");
                Vec::new()
            }
        }
    }
}
