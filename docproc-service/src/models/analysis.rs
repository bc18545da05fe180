use serde::{Deserialize, Serialize};

/// Response body of `POST /process-document/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// Classification among the configured document types.
    #[serde(rename = "type")]
    pub document_type: String,
    /// Names, dates, ID numbers, locations and key terms.
    pub details: String,
    /// Assessment of tampering or forgery signs.
    pub verification: String,
}
