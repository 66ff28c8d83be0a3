//! Shared request flow for the cloud vision backends (Groq, Gemini).
//!
//! Cloud backends run on the blocking pool, so requests go through
//! `reqwest::blocking` and rate-limit waits use thread sleeps.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use finscan::retry::{backoff_delay, get_delay_from_env, parse_retry_after};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;

use super::backend::{OcrBackendType, OcrError};

/// Rate-limited responses tolerated per page before giving up.
const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Transcription instructions sent with every page. Checkbox marks are
/// spelled the way the form extractors look for them.
pub const TRANSCRIPTION_PROMPT: &str = "This image is one page of a financial disclosure filing. \
Transcribe every piece of text exactly as printed. Keep each table row on a single line with \
its cells separated by spaces. Write checked boxes as [X] and empty boxes as [ ]. \
Return only the transcription, with no commentary.";

/// A page image ready to embed in a request body.
pub struct EncodedImage {
    pub base64: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    pub fn read(image_path: &Path) -> Result<Self, OcrError> {
        let bytes = std::fs::read(image_path)?;
        let mime_type = match image_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("png") => "image/png",
            Some("tif") | Some("tiff") => "image/tiff",
            _ => "image/jpeg",
        };
        Ok(Self {
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type,
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// One hosted vision API.
pub trait VisionApi {
    const BACKEND: OcrBackendType;
    /// Env var holding the inter-request delay in milliseconds.
    const DELAY_ENV: &'static str;
    /// Shown when the API key is missing.
    const KEY_HINT: &'static str;

    fn api_key(&self) -> Option<&str>;

    fn request(&self, client: &Client, api_key: &str, image: &EncodedImage) -> RequestBuilder;

    /// Pull the transcription out of a successful response body.
    fn parse(&self, body: &str) -> Result<String, OcrError>;
}

/// Send one page through `api`, honoring rate limits.
pub fn transcribe<A: VisionApi>(
    api: &A,
    timeout: Duration,
    image_path: &Path,
) -> Result<String, OcrError> {
    let api_key = api
        .api_key()
        .ok_or_else(|| OcrError::BackendNotAvailable(A::KEY_HINT.to_string()))?;
    let image = EncodedImage::read(image_path)?;
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("finscan/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| OcrError::OcrFailed(format!("Failed to create HTTP client: {}", e)))?;

    let delay = get_delay_from_env(A::DELAY_ENV, 200);
    if delay > Duration::ZERO {
        std::thread::sleep(delay);
    }

    let response = send_with_rate_limit(A::BACKEND, || {
        api.request(&client, api_key, &image).send()
    })?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| OcrError::OcrFailed(format!("Failed to read {} response: {}", A::BACKEND, e)))?;
    if !status.is_success() {
        return Err(OcrError::OcrFailed(format!(
            "{} API error ({}): {}",
            A::BACKEND,
            status,
            body
        )));
    }
    api.parse(&body)
}

/// Resend on 429 until the API accepts or the retry allowance runs out.
fn send_with_rate_limit<F>(backend: OcrBackendType, send: F) -> Result<Response, OcrError>
where
    F: Fn() -> Result<Response, reqwest::Error>,
{
    let mut attempt = 0;
    loop {
        let response =
            send().map_err(|e| OcrError::OcrFailed(format!("HTTP request failed: {}", e)))?;
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if attempt >= MAX_RATE_LIMIT_RETRIES {
            return Err(OcrError::RateLimited {
                backend,
                retry_after_secs: retry_after.as_deref().and_then(|s| s.trim().parse().ok()),
            });
        }

        let wait = parse_retry_after(retry_after.as_deref())
            .unwrap_or_else(|| backoff_delay(attempt, 1000));
        tracing::warn!(
            "{} rate limited (attempt {}), waiting {:?}",
            backend,
            attempt + 1,
            wait
        );
        std::thread::sleep(wait);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_image_mime() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("page-1.png");
        std::fs::write(&png, b"abc").unwrap();
        let image = EncodedImage::read(&png).unwrap();
        assert_eq!(image.base64, "YWJj");
        assert_eq!(image.data_url(), "data:image/png;base64,YWJj");

        let tiff = dir.path().join("page-1.TIF");
        std::fs::write(&tiff, b"abc").unwrap();
        assert_eq!(EncodedImage::read(&tiff).unwrap().mime_type, "image/tiff");
    }

    #[test]
    fn test_prompt_uses_extractor_marks() {
        assert!(TRANSCRIPTION_PROMPT.contains("[X]"));
        assert!(TRANSCRIPTION_PROMPT.contains("[ ]"));
    }
}
