//! Groq vision backend (cloud tier), over the OpenAI-compatible chat API.
//!
//! Requires GROQ_API_KEY. GROQ_DELAY_MS sets the pause before each request.

use std::path::Path;

use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::api_backend::{transcribe, EncodedImage, VisionApi, TRANSCRIPTION_PROMPT};
use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};

const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqBackend {
    config: OcrConfig,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: [ContentPart<'a>; 2],
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl GroqBackend {
    pub fn with_config(config: OcrConfig) -> Self {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            config,
            api_key: std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty()),
            model,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl VisionApi for GroqBackend {
    const BACKEND: OcrBackendType = OcrBackendType::Groq;
    const DELAY_ENV: &'static str = "GROQ_DELAY_MS";
    const KEY_HINT: &'static str =
        "GROQ_API_KEY not set. Get an API key from https://console.groq.com/";

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn request(&self, client: &Client, api_key: &str, image: &EncodedImage) -> RequestBuilder {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: [
                    ContentPart::Text {
                        text: TRANSCRIPTION_PROMPT,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
            max_tokens: 8192,
            temperature: 0.0,
        };
        client.post(GROQ_URL).bearer_auth(api_key).json(&body)
    }

    fn parse(&self, body: &str) -> Result<String, OcrError> {
        let response: ChatResponse = serde_json::from_str(body)
            .map_err(|e| OcrError::OcrFailed(format!("Failed to parse Groq response: {}", e)))?;
        if let Some(error) = response.error {
            return Err(OcrError::OcrFailed(format!(
                "Groq API error: {}",
                error.message
            )));
        }
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

impl OcrBackend for GroqBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Groq
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        match self.api_key {
            None => Self::KEY_HINT.to_string(),
            Some(_) => format!("Groq available (model: {})", self.model),
        }
    }

    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let text = transcribe(self, self.config.request_timeout, image_path)?;
        Ok(OcrResult {
            text,
            confidence: None,
            backend: OcrBackendType::Groq,
            model: Some(self.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> GroqBackend {
        GroqBackend::with_config(OcrConfig::default()).with_api_key("k")
    }

    #[test]
    fn test_image_part_tagging() {
        let part = ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "data:image/png;base64,AAAA".to_string(),
            },
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"Status: Member"}},{"message":{"content":"x"}}]}"#;
        assert_eq!(backend().parse(body).unwrap(), "Status: Member");
        assert_eq!(backend().parse(r#"{"choices":[]}"#).unwrap(), "");
    }

    #[test]
    fn test_parse_api_error() {
        let err = backend()
            .parse(r#"{"error":{"message":"model decommissioned"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("model decommissioned"));
    }
}
