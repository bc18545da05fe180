use axum::body::Bytes;

/// A file received on the processing endpoint. Lives for one request.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedDocument {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn kind(&self) -> Option<DocumentKind> {
        DocumentKind::from_content_type(&self.content_type)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// The document families the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Classify a declared media type. Parameters such as `; charset=...`
    /// are ignored, and so is case.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/pdf" {
            Some(DocumentKind::Pdf)
        } else if essence.starts_with("image/") {
            Some(DocumentKind::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Image => "image",
        }
    }
}

/// Payload ready to be sent to the model as inline data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    pub mime_type: String,
    /// Standard base64, no line breaks.
    pub data: String,
}
