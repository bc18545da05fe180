//! service-core: Shared infrastructure for the document processing service.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
