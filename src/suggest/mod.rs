//! AI suggestion client.
//!
//! Sends the free-form notes blob to the Gemini `generateContent`
//! endpoint with a fixed instruction to return a JSON array of short
//! actionable to-do strings, and parses that array back out. A missing
//! field or parse failure yields a single error and no partial
//! suggestions; the caller surfaces it once and resets to idle.

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Default `generateContent` endpoint.
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-09-2025:generateContent";

#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notes are empty")]
    EmptyNotes,
    #[error("malformed suggestion response: {0}")]
    MalformedResponse(String),
}

/// Client for the external suggestion service.
pub struct SuggestionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl SuggestionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key)
    }

    /// Use a non-default endpoint (tests, proxies, self-hosted relays).
    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Extract actionable to-do suggestions from a notes blob.
    pub async fn suggest_todos(&self, notes: &str) -> Result<Vec<String>, SuggestError> {
        if notes.trim().is_empty() {
            return Err(SuggestError::EmptyNotes);
        }

        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let response = self
            .client
            .post(&url)
            .json(&request_body(notes))
            .send()
            .await?;
        let payload: GenerateResponse = response.json().await?;

        let suggestions = parse_suggestions(&payload)?;
        log::debug!("suggest: extracted {} suggestion(s)", suggestions.len());
        Ok(suggestions)
    }
}

/// Build the `generateContent` request for a notes blob.
fn request_body(notes: &str) -> serde_json::Value {
    let prompt = format!(
        "Analyze the following unstructured notes and extract a list of actionable short \
         to-do items. Return ONLY a valid JSON array of strings \
         (e.g. [\"Buy milk\", \"Study math\"]). Notes: \"{}\"",
        notes
    );
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": { "responseMimeType": "application/json" }
    })
}

/// Pull the JSON array of suggestions out of a `generateContent`
/// response.
fn parse_suggestions(response: &GenerateResponse) -> Result<Vec<String>, SuggestError> {
    let text = response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.parts.first())
        .map(|part| part.text.as_str())
        .ok_or_else(|| SuggestError::MalformedResponse("no candidate text".to_string()))?;

    serde_json::from_str(text)
        .map_err(|e| SuggestError::MalformedResponse(format!("not a JSON string array: {}", e)))
}
