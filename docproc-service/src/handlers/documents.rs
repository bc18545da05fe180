use crate::models::{DocumentAnalysis, UploadedDocument};
use crate::services::metrics;
use crate::startup::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

/// Name of the multipart part carrying the document.
pub const FILE_FIELD: &str = "file";

/// `POST /process-document/`: classify, extract and verify one uploaded
/// PDF or image.
pub async fn process_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DocumentAnalysis>, AppError> {
    let upload = read_upload(multipart).await?;
    let kind = upload.kind().map_or("unsupported", |k| k.as_str());

    tracing::info!(
        file_name = %upload.file_name,
        content_type = %upload.content_type,
        size = upload.size(),
        "Document received"
    );

    let encoded = state.encoder.encode(&upload).await.map_err(|e| {
        let outcome = if e.status_code().is_client_error() {
            "rejected"
        } else {
            "failed"
        };
        tracing::warn!(file_name = %upload.file_name, error = %e, "Document could not be encoded");
        metrics::record_document(kind, outcome);
        e
    })?;

    let analysis = state.analyzer.analyze(&encoded).await.map_err(|e| {
        tracing::error!(
            file_name = %upload.file_name,
            error = %e,
            "Document analysis failed"
        );
        metrics::record_document(kind, "failed");
        AppError::from(e)
    })?;

    metrics::record_document(kind, "ok");
    tracing::info!(file_name = %upload.file_name, "Document processed");

    Ok(Json(analysis))
}

/// Pull the `file` part out of the form; other parts are skipped.
async fn read_upload(mut multipart: Multipart) -> Result<UploadedDocument, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field.bytes().await.map_err(multipart_error)?;

        return Ok(UploadedDocument::new(file_name, content_type, data));
    }

    Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded")))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Uploaded file is too large".to_string())
    } else {
        AppError::BadRequest(anyhow::anyhow!(
            "Failed to read multipart body: {}",
            err.body_text()
        ))
    }
}
