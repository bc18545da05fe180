pub mod analysis;
pub mod document;

pub use analysis::DocumentAnalysis;
pub use document::{DocumentKind, EncodedDocument, UploadedDocument};
