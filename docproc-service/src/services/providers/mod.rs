//! AI provider abstractions and implementations.
//!
//! Document analysis talks to a [`VisionProvider`]; Gemini is the production
//! backend and the mock backs unit tests.

pub mod gemini;
pub mod mock;

use crate::models::EncodedDocument;
use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::ContentFiltered(_) => "content_filtered",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
            ProviderError::RateLimited { retry_after_secs } => AppError::TooManyRequests(
                "Gemini API rate limit exceeded".to_string(),
                retry_after_secs,
            ),
            ProviderError::ContentFiltered(reason) => AppError::UnprocessableEntity(
                anyhow::anyhow!("Document was blocked by the model's safety filters: {}", reason),
            ),
            ProviderError::ApiError(msg) | ProviderError::NetworkError(msg) => {
                AppError::BadGateway(msg)
            }
        }
    }
}

/// Result of a provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated text, `None` when the model returned no text part.
    pub text: Option<String>,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    /// Finish reason.
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
}

/// Generation parameters for AI requests.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    pub max_tokens: Option<i32>,
}

/// A model that can answer a prompt about a document.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Answer `prompt` with `document` attached as inline data.
    async fn generate(
        &self,
        prompt: &str,
        document: &EncodedDocument,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Cheap authenticated call used by the readiness probe.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
