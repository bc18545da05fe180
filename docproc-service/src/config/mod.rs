use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_DOCUMENT_TYPES: &str = "Land Records,Caste Certificates,Property Registrations";
pub const DEFAULT_PDF_RENDERER: &str = "pdftoppm";
/// 50 megapixels; decoding allocates width * height * 3 bytes.
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 50_000_000;

#[derive(Debug, Clone)]
pub struct DocprocConfig {
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
    pub processing: ProcessingConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Labels offered to the model when classifying.
    pub document_types: Vec<String>,
    pub max_upload_bytes: usize,
    pub pdf_mode: PdfMode,
    /// `pdftoppm`-compatible program used in rasterize mode.
    pub pdf_renderer: String,
    pub pdf_render_timeout_secs: u64,
    pub jpeg_quality: u8,
    /// Images with more pixels than this are rejected before decoding.
    pub max_image_pixels: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            document_types: split_list(DEFAULT_DOCUMENT_TYPES),
            max_upload_bytes: 20 * 1024 * 1024,
            pdf_mode: PdfMode::Native,
            pdf_renderer: DEFAULT_PDF_RENDERER.to_string(),
            pdf_render_timeout_secs: 30,
            jpeg_quality: 85,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
        }
    }
}

/// How PDFs are handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfMode {
    /// Send the PDF bytes as `application/pdf` inline data.
    Native,
    /// Render the first page to JPEG with `pdftoppm` and send the image.
    Rasterize,
}

impl FromStr for PdfMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(PdfMode::Native),
            "rasterize" => Ok(PdfMode::Rasterize),
            _ => Err(format!("Invalid PDF mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl DocprocConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env, APP__ prefix and PORT)
        let common_config = core_config::Config::load()?;

        let api_key = get_env("GEMINI_API_KEY", None)?;
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GEMINI_API_KEY is set but empty"
            )));
        }

        let jpeg_quality: u8 = parse_env("JPEG_QUALITY", "85")?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JPEG_QUALITY must be between 1 and 100, got {}",
                jpeg_quality
            )));
        }

        let max_image_pixels: u64 = parse_env("MAX_IMAGE_PIXELS", "50000000")?;
        if max_image_pixels == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAX_IMAGE_PIXELS must be greater than zero"
            )));
        }

        let document_types = split_list(&get_env("DOCUMENT_TYPES", Some(DEFAULT_DOCUMENT_TYPES))?);
        if document_types.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DOCUMENT_TYPES must name at least one document type"
            )));
        }

        Ok(DocprocConfig {
            common: common_config,
            gemini: GeminiSettings {
                api_key: Secret::new(api_key),
                model: get_env("GEMINI_MODEL", Some(DEFAULT_GEMINI_MODEL))?,
                api_base: get_env("GEMINI_API_BASE", Some(DEFAULT_GEMINI_API_BASE))?
                    .trim_end_matches('/')
                    .to_string(),
                timeout_secs: parse_env("GEMINI_TIMEOUT_SECS", "30")?,
            },
            processing: ProcessingConfig {
                document_types,
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", "20971520")?,
                pdf_mode: parse_env("PDF_MODE", "native")?,
                pdf_renderer: get_env("PDF_RENDERER", Some(DEFAULT_PDF_RENDERER))?,
                pdf_render_timeout_secs: parse_env("PDF_RENDER_TIMEOUT_SECS", "30")?,
                jpeg_quality,
                max_image_pixels,
            },
            cors: CorsConfig {
                allowed_origins: split_list(&get_env("CORS_ALLOWED_ORIGINS", Some("*"))?),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default))?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("Invalid value {:?} for {}: {}", raw, key, e))
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
