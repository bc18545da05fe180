pub mod documents;
pub mod health;

pub use documents::process_document;
pub use health::{health_check, metrics_endpoint, readiness_check, root};
