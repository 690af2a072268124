/// OpenAI API providers
///
/// Embeddings: POST /v1/embeddings, one request per text or per batch.
/// Preference extraction: POST /v1/chat/completions with an extraction prompt
/// whose answer is expected to be a JSON object (possibly inside a markdown
/// code fence).
use crate::{
    embeddings::Embedding,
    error::{AppError, AppResult},
    models::PreferenceRecord,
    services::providers::{EmbeddingProvider, PreferenceExtractor},
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

const EXTRACTION_TEMPERATURE: f32 = 0.3;

const EXTRACTION_PROMPT: &str = "Read the conversation below between a movie assistant and a viewer \
and extract the viewer's movie preferences. Answer with a single JSON object and nothing else, \
using these keys: \"actors\" (list of names), \"directors\" (list of names), \"genres\" (list), \
\"mood\" (string), \"themes\" (list), \"era\" (string), \"other\" (string). \
Omit keys the viewer did not mention.\n\nConversation:\n";

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Embedding,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

async fn error_for_status(response: reqwest::Response) -> AppResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::ExternalApi(format!(
        "OpenAI API returned status {}: {}",
        status, body
    )))
}

/// Orders embeddings by their response index and checks the count
fn into_embeddings(response: EmbeddingResponse, expected: usize) -> AppResult<Vec<Embedding>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(AppError::ExternalApi(format!(
            "Expected {} embeddings, received {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[derive(Clone)]
pub struct OpenAiEmbeddingProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String, model: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, input: serde_json::Value, expected: usize) -> AppResult<Vec<Embedding>> {
        let url = format!("{}/v1/embeddings", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": input }))
            .send()
            .await?;

        let response: EmbeddingResponse = error_for_status(response).await?.json().await?;
        into_embeddings(response, expected)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> AppResult<Embedding> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Cannot embed empty text".to_string(),
            ));
        }

        let mut embeddings = self.request(json!(text), 1).await?;
        embeddings
            .pop()
            .ok_or_else(|| AppError::ExternalApi("Empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.request(json!(texts), texts.len()).await?;
        tracing::debug!(count = embeddings.len(), model = %self.model, "Embedded batch");
        Ok(embeddings)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Strips a surrounding markdown code fence, if any
fn strip_code_fences(text: &str) -> &str {
    if let Some((_, rest)) = text.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    if let Some((_, rest)) = text.split_once("```") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    text.trim()
}

/// Parses a model answer into a preference record
fn parse_preferences(answer: &str) -> AppResult<PreferenceRecord> {
    serde_json::from_str(strip_code_fences(answer))
        .map_err(|e| AppError::ExternalApi(format!("Unparseable preference JSON: {}", e)))
}

#[derive(Clone)]
pub struct OpenAiPreferenceExtractor {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiPreferenceExtractor {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String, model: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
            model,
        }
    }

    async fn try_extract(&self, transcript: &str) -> AppResult<PreferenceRecord> {
        let url = format!("{}/v1/chat/completions", self.api_url);

        let body = json!({
            "model": self.model,
            "temperature": EXTRACTION_TEMPERATURE,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful assistant that extracts information and returns JSON."
                },
                {
                    "role": "user",
                    "content": format!("{}{}", EXTRACTION_PROMPT, transcript)
                }
            ]
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let response: ChatResponse = error_for_status(response).await?.json().await?;
        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::ExternalApi("Chat response had no content".to_string()))?;

        parse_preferences(&answer)
    }
}

#[async_trait::async_trait]
impl PreferenceExtractor for OpenAiPreferenceExtractor {
    async fn extract(&self, transcript: &str) -> PreferenceRecord {
        if transcript.trim().is_empty() {
            return PreferenceRecord::default();
        }

        match self.try_extract(transcript).await {
            Ok(preferences) => {
                tracing::info!(empty = preferences.is_empty(), "Extracted preferences");
                preferences
            }
            Err(e) => {
                tracing::warn!(error = %e, "Preference extraction failed, using empty record");
                PreferenceRecord::default()
            }
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
