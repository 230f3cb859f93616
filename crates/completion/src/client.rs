//! Blocking chat-completion client.

use std::time::Duration;

use cellscribe_config::{CompletionSettings, CredentialSource};

use crate::wire::{ChatRequest, ChatResponse};

/// Why a completion call produced no text.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// No usable API key; no request was sent
    #[error("no API key configured: set {var} (the placeholder value does not count)")]
    MissingCredential { var: String },

    /// HTTP 200 but no choice with message text
    #[error("response contained no completion text")]
    NoContent,

    /// HTTP 401
    #[error("authentication failed (HTTP 401): {body}")]
    Authentication { body: String },

    /// Any other non-200 status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, DNS, TLS or timeout failure
    #[error("network error: {0}")]
    Transport(String),

    /// HTTP 200 with a body that is not the expected JSON
    #[error("malformed response: {0}")]
    Decode(String),

    /// The HTTP client could not be constructed
    #[error("cannot build HTTP client: {0}")]
    Client(String),
}

impl CompletionError {
    /// HTTP status, for failures that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            CompletionError::Authentication { .. } => Some(401),
            CompletionError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, CompletionError::Authentication { .. })
    }
}

/// Chat-completion API client (blocking).
pub struct CompletionClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    referer: Option<String>,
    title: Option<String>,
    key_var: String,
    credentials: Box<dyn CredentialSource>,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("endpoint", &self.endpoint)
            .field("key_var", &self.key_var)
            .finish_non_exhaustive()
    }
}

impl CompletionClient {
    /// Build a client for the configured endpoint.
    ///
    /// The credential source is consulted on every call, never at
    /// construction, so a key added after startup is picked up.
    pub fn new(settings: &CompletionSettings, credentials: Box<dyn CredentialSource>) -> Result<Self, CompletionError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("cellscribe/{}", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| CompletionError::Client(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            referer: settings.referer.clone(),
            title: settings.title.clone(),
            key_var: settings.api_key_env.clone(),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one user message and return the first choice's text.
    pub fn complete(&self, prompt: &str, model: &str) -> Result<String, CompletionError> {
        let key = self.credentials.api_key().ok_or_else(|| CompletionError::MissingCredential {
            var: self.key_var.clone(),
        })?;

        tracing::debug!(endpoint = %self.endpoint, model, prompt_chars = prompt.chars().count(), "sending completion request");

        let mut request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&ChatRequest::user(model, prompt));
        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            request = request.header("X-Title", title);
        }

        let response = request
            .send()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().unwrap_or_default();
            tracing::debug!(status, "completion request rejected");
            if status == 401 {
                return Err(CompletionError::Authentication { body });
            }
            return Err(CompletionError::Http { status, body });
        }

        let body = response
            .text()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| CompletionError::Decode(e.to_string()))?;
        let text = parsed.into_first_content().ok_or(CompletionError::NoContent)?;

        tracing::debug!(chars = text.chars().count(), "completion received");
        Ok(text)
    }
}
