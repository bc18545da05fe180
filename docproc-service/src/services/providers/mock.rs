//! Mock provider implementation for testing.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, VisionProvider};
use crate::models::EncodedDocument;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockMode {
    Echo,
    Silent,
    Disabled,
}

/// Mock vision provider for testing.
///
/// Echoes each prompt back and remembers every prompt it was asked.
pub struct MockVisionProvider {
    mode: MockMode,
    prompts: Mutex<Vec<String>>,
}

impl MockVisionProvider {
    pub fn new(enabled: bool) -> Self {
        let mode = if enabled {
            MockMode::Echo
        } else {
            MockMode::Disabled
        };
        Self {
            mode,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose answers carry no text.
    pub fn silent() -> Self {
        Self {
            mode: MockMode::Silent,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VisionProvider for MockVisionProvider {
    async fn generate(
        &self,
        prompt: &str,
        document: &EncodedDocument,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if self.mode == MockMode::Disabled {
            return Err(ProviderError::NotConfigured(
                "Mock vision provider not enabled".to_string(),
            ));
        }

        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let text = match self.mode {
            MockMode::Echo => Some(format!(
                "Mock response for: {} [{}]",
                prompt, document.mime_type
            )),
            _ => None,
        };

        Ok(ProviderResponse {
            text,
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: 10,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.mode == MockMode::Disabled {
            Err(ProviderError::NotConfigured(
                "Mock vision provider not enabled".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}
