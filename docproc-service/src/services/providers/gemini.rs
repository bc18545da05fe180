//! Gemini AI provider implementation.
//!
//! Sends a prompt plus one inline document to `models/{model}:generateContent`.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, VisionProvider};
use crate::models::EncodedDocument;
use crate::services::metrics;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedRequestExt;
use std::time::{Duration, Instant};

/// Header carrying the API key; keeps the key out of request URLs and logs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub api_base: String,
    pub timeout: Duration,
}

/// Gemini vision provider.
pub struct GeminiVisionProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiVisionProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Build the API URL for the given model method.
    fn api_url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.config.api_base, self.config.model, method)
    }

    fn build_request(
        prompt: &str,
        document: &EncodedDocument,
        params: &GenerationParams,
    ) -> GenerateContentRequest {
        let generation_config = if params.temperature.is_some() || params.max_tokens.is_some() {
            Some(GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
            })
        } else {
            None
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::InlineData {
                        inline_data: InlineData {
                            mime_type: document.mime_type.clone(),
                            data: document.data.clone(),
                        },
                    },
                ],
            }],
            generation_config,
        }
    }

    async fn send(&self, request: &GenerateContentRequest) -> Result<ProviderResponse, ProviderError> {
        let response = self
            .client
            .post(self.api_url("generateContent"))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(request)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_text = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited { retry_after_secs });
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        interpret_response(api_response)
    }
}

/// Turn a decoded `generateContent` body into a provider response.
fn interpret_response(api_response: GenerateContentResponse) -> Result<ProviderResponse, ProviderError> {
    if let Some(reason) = api_response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(ProviderError::ContentFiltered(reason.to_string()));
    }

    let candidate = api_response.candidates.first();

    let finish_reason = match candidate.and_then(|c| c.finish_reason.as_deref()) {
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Complete,
    };

    if finish_reason == FinishReason::ContentFilter {
        let reason = candidate
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_default();
        return Err(ProviderError::ContentFiltered(reason));
    }

    // Join every text part of the first candidate.
    let text = candidate
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::InlineData { .. } => None,
                })
                .collect::<String>()
        })
        .filter(|t| !t.trim().is_empty());

    let usage = api_response.usage_metadata.unwrap_or_default();

    Ok(ProviderResponse {
        text,
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
        finish_reason,
    })
}

#[async_trait]
impl VisionProvider for GeminiVisionProvider {
    async fn generate(
        &self,
        prompt: &str,
        document: &EncodedDocument,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = Self::build_request(prompt, document, params);

        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            mime_type = %document.mime_type,
            payload_len = document.data.len(),
            "Sending request to Gemini API"
        );

        let started = Instant::now();
        let result = self.send(&request).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(response) => {
                metrics::record_gemini_call("ok", elapsed);
                metrics::record_gemini_tokens(response.input_tokens, response.output_tokens);
                tracing::debug!(
                    model = %self.config.model,
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    finish_reason = ?response.finish_reason,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Gemini API request completed"
                );
            }
            Err(e) => {
                metrics::record_gemini_call(e.kind(), elapsed);
                tracing::warn!(
                    model = %self.config.model,
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Gemini API request failed"
                );
            }
        }

        result
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        // Listing models is the cheapest call that proves the key works
        let response = self
            .client
            .get(format!("{}/models", self.config.api_base))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .with_trace_context()
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(alias = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(alias = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> EncodedDocument {
        EncodedDocument {
            mime_type: "image/jpeg".to_string(),
            data: "aGVsbG8=".to_string(),
        }
    }

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_carries_prompt_then_inline_document() {
        let request = GeminiVisionProvider::build_request(
            "Analyze for tampering or forgery signs.",
            &document(),
            &GenerationParams::default(),
        );

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "Analyze for tampering or forgery signs." },
                        { "inline_data": { "mime_type": "image/jpeg", "data": "aGVsbG8=" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn generation_config_is_sent_when_tuned() {
        let params = GenerationParams {
            temperature: Some(0.2),
            max_tokens: Some(512),
        };
        let request = GeminiVisionProvider::build_request("p", &document(), &params);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["generationConfig"]["maxOutputTokens"], 512);
        assert!(value["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn text_parts_are_joined() {
        let response = interpret_response(parse(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Land " }, { "text": "Records" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 258, "candidatesTokenCount": 3, "totalTokenCount": 261 }
        })))
        .unwrap();

        assert_eq!(response.text.as_deref(), Some("Land Records"));
        assert_eq!(response.input_tokens, 258);
        assert_eq!(response.output_tokens, 3);
        assert_eq!(response.finish_reason, FinishReason::Complete);
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let response = interpret_response(parse(json!({ "candidates": [] }))).unwrap();
        assert!(response.text.is_none());
        assert_eq!(response.input_tokens, 0);
    }

    #[test]
    fn safety_finish_is_content_filtered() {
        let err = interpret_response(parse(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .unwrap_err();

        assert!(matches!(err, ProviderError::ContentFiltered(reason) if reason == "SAFETY"));
    }

    #[test]
    fn blocked_prompt_is_content_filtered() {
        let err = interpret_response(parse(json!({
            "promptFeedback": { "blockReason": "OTHER" }
        })))
        .unwrap_err();

        assert!(matches!(err, ProviderError::ContentFiltered(reason) if reason == "OTHER"));
    }

    #[test]
    fn max_tokens_keeps_partial_text() {
        let response = interpret_response(parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Names: ..." }] },
                "finishReason": "MAX_TOKENS"
            }]
        })))
        .unwrap();

        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.text.as_deref(), Some("Names: ..."));
    }

    #[test]
    fn api_url_targets_generate_content() {
        let provider = GeminiVisionProvider::new(GeminiConfig {
            api_key: Secret::new("k".to_string()),
            model: "gemini-1.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(30),
        })
        .unwrap();

        assert_eq!(
            provider.api_url("generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(provider.model(), "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn health_check_without_key_is_not_configured() {
        let provider = GeminiVisionProvider::new(GeminiConfig {
            api_key: Secret::new(String::new()),
            model: "gemini-1.5-flash".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        assert!(matches!(
            provider.health_check().await,
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
