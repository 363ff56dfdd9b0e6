// Google Gemini implementation of the text generator.
//
// Calls the `generateContent` REST endpoint. A 429, or any error body whose
// status is RESOURCE_EXHAUSTED, is reported as a rate limit so the labeler
// backs off; every other failure is final.
//
// API docs: https://ai.google.dev/api/generate-content

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{GenerationError, TextGenerator};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini text generator.
pub struct GeminiClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_url: &str, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url, self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Failed(format!("Failed to call Gemini API: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            GenerationError::Failed(format!("Failed to parse Gemini API response: {e}"))
        })?;

        let text = extract_text(&parsed)
            .ok_or_else(|| GenerationError::Failed("Gemini returned no candidate text".into()))?;

        debug!(
            model = %self.model,
            response_preview = %text.chars().take(50).collect::<String>(),
            "Generated text"
        );

        Ok(text)
    }
}

/// Map a non-success response to a generation error.
pub fn classify_failure(status: StatusCode, body: &str) -> GenerationError {
    let message = format!("Gemini API returned {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        GenerationError::RateLimited(message)
    } else {
        GenerationError::Failed(message)
    }
}

/// Concatenate the text parts of the first candidate. `None` when there is
/// no candidate or it carries no text (e.g. blocked by safety filters).
fn extract_text(response: &GenerateResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let text: String = candidate
        .content
        .as_ref()?
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

// --- Gemini API request/response types ---

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
