use crate::config::{PdfMode, ProcessingConfig};
use crate::models::{DocumentKind, EncodedDocument, UploadedDocument};
use crate::services::executor::{CommandError, CommandExecutor};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageOutputFormat};
use service_core::error::AppError;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

const PDF_MAGIC: &[u8] = b"%PDF-";
/// Readers accept leading garbage before the header within the first KiB.
const PDF_HEADER_WINDOW: usize = 1024;
const RASTER_DPI: &str = "150";

/// Normalises an upload into the inline payload sent to the model.
#[derive(Clone)]
pub struct DocumentEncoder {
    pdf_mode: PdfMode,
    pdf_renderer: String,
    jpeg_quality: u8,
    max_image_pixels: u64,
    executor: CommandExecutor,
}

impl DocumentEncoder {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            pdf_mode: config.pdf_mode,
            pdf_renderer: config.pdf_renderer.clone(),
            jpeg_quality: config.jpeg_quality,
            max_image_pixels: config.max_image_pixels,
            executor: CommandExecutor::new(Duration::from_secs(config.pdf_render_timeout_secs)),
        }
    }

    pub async fn encode(&self, upload: &UploadedDocument) -> Result<EncodedDocument, AppError> {
        let kind = upload
            .kind()
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unsupported file format")))?;

        if upload.data.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Uploaded file is empty")));
        }

        match kind {
            DocumentKind::Image => {
                let jpeg = self.image_to_jpeg(upload.data.to_vec()).await?;
                Ok(jpeg_payload(&jpeg))
            }
            DocumentKind::Pdf => {
                if !looks_like_pdf(&upload.data) {
                    return Err(processing_error("missing %PDF- header"));
                }

                match self.pdf_mode {
                    PdfMode::Native => Ok(EncodedDocument {
                        mime_type: "application/pdf".to_string(),
                        data: STANDARD.encode(&upload.data),
                    }),
                    PdfMode::Rasterize => {
                        let jpeg = self.render_first_page(&upload.data).await?;
                        Ok(jpeg_payload(&jpeg))
                    }
                }
            }
        }
    }

    /// Check that the PDF renderer can be started. Only a spawn failure
    /// counts; the exit status of a version query varies between builds.
    pub async fn verify_renderer(&self) -> Result<(), AppError> {
        let workdir = std::env::temp_dir();
        match self
            .executor
            .execute(&self.pdf_renderer, &["-v"], Some(workdir.as_path()))
            .await
        {
            Err(e @ CommandError::Spawn { .. }) => Err(AppError::ConfigError(anyhow::anyhow!(
                "PDF_MODE=rasterize but the PDF renderer is unavailable: {}",
                e
            ))),
            _ => {
                tracing::info!(renderer = %self.pdf_renderer, "PDF renderer available");
                Ok(())
            }
        }
    }

    /// Decode any supported image format and re-encode it as RGB JPEG.
    async fn image_to_jpeg(&self, data: Vec<u8>) -> Result<Vec<u8>, AppError> {
        let quality = self.jpeg_quality;
        let max_pixels = self.max_image_pixels;

        tokio::task::spawn_blocking(move || reencode_jpeg(&data, quality, max_pixels))
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Image encoding task failed: {}", e)))?
            .map_err(processing_error)
    }

    async fn render_first_page(&self, pdf: &[u8]) -> Result<Vec<u8>, AppError> {
        let workdir = ScratchDir::create().await?;
        let input = workdir.path().join("input.pdf");
        tokio::fs::write(&input, pdf).await?;

        let quality = format!("quality={}", self.jpeg_quality);
        let result = self
            .executor
            .execute(
                &self.pdf_renderer,
                &[
                    "-f",
                    "1",
                    "-l",
                    "1",
                    "-singlefile",
                    "-r",
                    RASTER_DPI,
                    "-jpeg",
                    "-jpegopt",
                    quality.as_str(),
                    "input.pdf",
                    "page",
                ],
                Some(workdir.path()),
            )
            .await;

        match result {
            Ok(_) => {}
            // The renderer ran and rejected or choked on the file: the upload is at fault
            Err(CommandError::Failed { stderr, .. }) => return Err(processing_error(stderr)),
            Err(e @ CommandError::TimedOut(_)) => return Err(processing_error(e)),
            Err(e) => return Err(e.into()),
        }

        let jpeg = tokio::fs::read(workdir.path().join("page.jpg")).await?;

        tracing::debug!(jpeg_len = jpeg.len(), "Rendered first PDF page");

        Ok(jpeg)
    }
}

fn reencode_jpeg(data: &[u8], quality: u8, max_pixels: u64) -> anyhow::Result<Vec<u8>> {
    // Header only: nothing is decoded until the size is known to be acceptable
    let (width, height) = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()?;
    let pixels = u64::from(width) * u64::from(height);
    if pixels > max_pixels {
        anyhow::bail!(
            "image is {}x{} ({} pixels), the limit is {} pixels",
            width,
            height,
            pixels,
            max_pixels
        );
    }

    let img = image::load_from_memory(data)?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buffer = Vec::new();
    rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
    Ok(buffer)
}

fn jpeg_payload(jpeg: &[u8]) -> EncodedDocument {
    EncodedDocument {
        mime_type: "image/jpeg".to_string(),
        data: STANDARD.encode(jpeg),
    }
}

fn looks_like_pdf(data: &[u8]) -> bool {
    let window = &data[..data.len().min(PDF_HEADER_WINDOW)];
    window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

fn processing_error(cause: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Error processing file: {}", cause))
}

/// Per-request temp directory, removed on drop.
struct ScratchDir(PathBuf);

impl ScratchDir {
    async fn create() -> Result<Self, AppError> {
        let path = std::env::temp_dir().join(format!("docproc-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            tracing::warn!(path = ?self.0, error = %e, "Failed to remove scratch directory");
        }
    }
}
