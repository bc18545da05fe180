#![allow(dead_code)]

use docproc_service::config::{
    CorsConfig, DocprocConfig, GeminiSettings, ProcessingConfig,
};
use docproc_service::startup::Application;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_MODEL: &str = "gemini-test";

/// Path the service posts to on the mock Gemini server.
pub fn generate_content_path() -> String {
    format!("/models/{}:generateContent", TEST_MODEL)
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub gemini: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with a tweak applied to the default test configuration.
    pub async fn spawn_with(tweak: impl FnOnce(&mut DocprocConfig)) -> Self {
        let gemini = MockServer::start().await;

        let mut config = test_config(&gemini.uri());
        tweak(&mut config);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling the root endpoint
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client.get(&address).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            gemini,
        }
    }

    pub async fn post_file(&self, file_name: &str, mime: &str, data: Vec<u8>) -> reqwest::Response {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(data)
                .file_name(file_name.to_string())
                .mime_str(mime)
                .unwrap(),
        );

        reqwest::Client::new()
            .post(format!("{}/process-document/", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Number of calls the mock Gemini server has received.
    pub async fn gemini_calls(&self) -> usize {
        self.gemini
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

pub fn test_config(gemini_base: &str) -> DocprocConfig {
    DocprocConfig {
        common: CoreConfig { port: 0 },
        gemini: GeminiSettings {
            api_key: Secret::new(TEST_API_KEY.to_string()),
            model: TEST_MODEL.to_string(),
            api_base: gemini_base.to_string(),
            timeout_secs: 5,
        },
        processing: ProcessingConfig::default(),
        cors: CorsConfig::default(),
    }
}

/// A `generateContent` success body answering with `text`.
pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 270, "candidatesTokenCount": 12, "totalTokenCount": 282 }
    })
}

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(16, 12, Rgb([30, 90, 200]));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .unwrap();
    buffer
}

pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >>\nendobj\n\
trailer\n<< /Root 1 0 R >>\n%%EOF\n"
        .to_vec()
}
