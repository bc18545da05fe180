use crate::models::{DocumentAnalysis, EncodedDocument};
use crate::services::providers::{GenerationParams, ProviderError, VisionProvider};
use std::sync::Arc;

/// Returned in place of an answer when the model produced no text.
pub const NO_RESPONSE: &str = "No response";

pub const DETAILS_PROMPT: &str =
    "Extract and organize important details (Names, Dates, ID numbers, Locations, Key terms).";
pub const VERIFICATION_PROMPT: &str = "Analyze for tampering or forgery signs.";

/// Asks the model the three questions the service answers about a document.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    provider: Arc<dyn VisionProvider>,
    document_types: Vec<String>,
    params: GenerationParams,
}

impl DocumentAnalyzer {
    pub fn new(provider: Arc<dyn VisionProvider>, document_types: Vec<String>) -> Self {
        Self {
            provider,
            document_types,
            params: GenerationParams::default(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn VisionProvider> {
        &self.provider
    }

    pub fn classification_prompt(&self) -> String {
        format!(
            "Classify this document into: {}",
            self.document_types.join(", ")
        )
    }

    /// Classification, detail extraction and verification run concurrently;
    /// the first failure wins.
    pub async fn analyze(&self, document: &EncodedDocument) -> Result<DocumentAnalysis, ProviderError> {
        let classification_prompt = self.classification_prompt();

        let (document_type, details, verification) = tokio::try_join!(
            self.ask(&classification_prompt, document),
            self.ask(DETAILS_PROMPT, document),
            self.ask(VERIFICATION_PROMPT, document)
        )?;

        Ok(DocumentAnalysis {
            document_type,
            details,
            verification,
        })
    }

    async fn ask(&self, prompt: &str, document: &EncodedDocument) -> Result<String, ProviderError> {
        let response = self.provider.generate(prompt, document, &self.params).await?;
        Ok(response.text.unwrap_or_else(|| NO_RESPONSE.to_string()))
    }
}
