//! Google Gemini vision backend (cloud tier).
//!
//! Requires GEMINI_API_KEY. GEMINI_DELAY_MS sets the pause before each
//! request (default 200ms).

use std::path::Path;

use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::api_backend::{transcribe, EncodedImage, VisionApi, TRANSCRIPTION_PROMPT};
use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiBackend {
    config: OcrConfig,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl GeminiBackend {
    pub fn with_config(config: OcrConfig) -> Self {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            config,
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl VisionApi for GeminiBackend {
    const BACKEND: OcrBackendType = OcrBackendType::Gemini;
    const DELAY_ENV: &'static str = "GEMINI_DELAY_MS";
    const KEY_HINT: &'static str =
        "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/";

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn request(&self, client: &Client, api_key: &str, image: &EncodedImage) -> RequestBuilder {
        let body = GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text {
                        text: TRANSCRIPTION_PROMPT,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type,
                            data: &image.base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 8192,
            },
        };
        client
            .post(format!("{}/{}:generateContent", API_BASE, self.model))
            .header("x-goog-api-key", api_key)
            .json(&body)
    }

    fn parse(&self, body: &str) -> Result<String, OcrError> {
        let response: GenerateResponse = serde_json::from_str(body)
            .map_err(|e| OcrError::OcrFailed(format!("Failed to parse Gemini response: {}", e)))?;
        if let Some(error) = response.error {
            return Err(OcrError::OcrFailed(format!(
                "Gemini API error: {}",
                error.message
            )));
        }
        // Long pages may come back split across several parts.
        Ok(response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }
}

impl OcrBackend for GeminiBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Gemini
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        match self.api_key {
            None => Self::KEY_HINT.to_string(),
            Some(_) => format!("Gemini available (model: {})", self.model),
        }
    }

    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let text = transcribe(self, self.config.request_timeout, image_path)?;
        Ok(OcrResult {
            text,
            confidence: None,
            backend: OcrBackendType::Gemini,
            model: Some(self.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> GeminiBackend {
        GeminiBackend::with_config(OcrConfig::default()).with_api_key("k")
    }

    #[test]
    fn test_parse_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Name: Hon. Jane"},{"text":" Doe"}]}}]}"#;
        assert_eq!(backend().parse(body).unwrap(), "Name: Hon. Jane Doe");
    }

    #[test]
    fn test_parse_blank_page_and_errors() {
        assert_eq!(backend().parse(r#"{"candidates":[]}"#).unwrap(), "");
        let err = backend()
            .parse(r#"{"error":{"message":"quota"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("quota"));
        assert!(backend().parse("not json").is_err());
    }

    #[test]
    fn test_model_override() {
        let config = OcrConfig {
            model: Some("gemini-1.5-pro".to_string()),
            ..Default::default()
        };
        let backend = GeminiBackend::with_config(config).with_api_key("k");
        assert!(backend.is_available());
        assert!(backend.availability_hint().contains("gemini-1.5-pro"));
    }
}
