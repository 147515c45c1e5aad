//! Remote answer generation.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::generation_api_key,
    error::{Error, Result},
};

pub const GEMINI_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/";

/// A service that turns a free-text prompt into free text.
pub trait GenerationBackend {
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Google Gemini `generateContent` over HTTPS.
pub struct GeminiBackend {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            Error::RemoteGeneration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            client,
        })
    }

    /// Build a backend from `GEMINI_API_KEY`.
    ///
    /// Returns `None` when the credential is missing or the client cannot
    /// be built; remote generation then stays off for the session.
    pub fn from_env(model: &str, timeout: Duration) -> Option<Self> {
        let api_key = generation_api_key()?;
        match Self::new(api_key, model, timeout) {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!(error = %e, "remote generation disabled");
                None
            }
        }
    }

    /// Point the backend at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}models/{}:generateContent", self.base_url, self.model)
    }
}

impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|_| {
                Error::RemoteGeneration("invalid API key".to_string())
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "calling generateContent");
        let resp = self
            .client
            .post(self.endpoint())
            .headers(headers)
            .json(&body)
            .send()
            .map_err(|e| {
                Error::RemoteGeneration(format!("request failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::RemoteGeneration(format!(
                "Gemini returned {status}: {text}"
            )));
        }

        let parsed: GenerateResponse = resp.json().map_err(|e| {
            Error::RemoteGeneration(format!("failed to parse response: {e}"))
        })?;
        first_candidate_text(parsed)
    }
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn first_candidate_text(response: GenerateResponse) -> Result<String> {
    let answer = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if answer.trim().is_empty() {
        return Err(Error::RemoteGeneration(
            "response contained no text".to_string(),
        ));
    }
    Ok(answer)
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}
