// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements the `LanguageModel` port against Google's Gemini API
// (https://ai.google.dev/gemini-api/docs).
//
// **Protocol notes:**
// - Authentication: the API key is passed as a query parameter (`?key=API_KEY`).
//   The key is chosen per call by the caller's key pool, not fixed at
//   construction.
// - Request format: `contents[]` with nested `parts`.
// - Response format: text is at `candidates[0].content.parts[*].text`.
//
// **Environment Variables:**
// - `GEMINI_API_KEYS` / `GEMINI_API_KEY` - keys from https://aistudio.google.com/apikey
// - `GEMINI_MODEL` - model name, e.g. `gemini-1.5-pro`

use crate::core::news::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/generate-content

/// A single part of content. Only text parts are used here.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// One turn of the conversation.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    /// "user" or "model"
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,

    /// Why generation stopped, e.g. "STOP" or "SAFETY".
    #[serde(default)]
    finish_reason: Option<String>,
}

/// The response from the Gemini generateContent endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

/// Error response from the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

/// Client for Google's Gemini `generateContent` endpoint.
///
/// # Example
/// ```ignore
/// let client = GeminiClient::new("gemini-1.5-pro".to_string());
/// let reply = client.generate(&api_key, "Summarize ...").await?;
/// ```
pub struct GeminiClient {
    client: Client,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Creates a client for `model` against the public Gemini endpoint.
    pub fn new(model: String) -> Self {
        Self::with_base_url(model, DEFAULT_GEMINI_BASE_URL.to_string())
    }

    /// Creates a client against another endpoint (tests, proxies).
    pub fn with_base_url(model: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        // Format: {base}/v1beta/models/{model}:generateContent
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn user_prompt(prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    /// Sends one prompt and returns the concatenated text of the first
    /// candidate.
    async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let request = Self::user_prompt(prompt);

        // Never log the key itself.
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            // Try to parse as Gemini error response for better error messages
            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(format!(
                    "Gemini API error ({}): {}",
                    status, error_response.error.message
                )
                .into());
            }

            return Err(format!("Gemini API error: {} - {}", status, error_text).into());
        }

        let response_json: GenerateContentResponse = response.json().await?;

        let candidate = response_json
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .ok_or(
                "No content in Gemini response - the model may have been blocked by safety filters",
            )?;

        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(format!(
                "Gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )
            .into());
        }

        tracing::debug!(chars = text.len(), "Gemini response received");
        Ok(text)
    }
}

// =============================================================================
// TESTS
// =============================================================================
