//! Document handle supplied by the caller and the properties snapshot kept in the audit trail.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::TemplateType;

/// Container format detected from the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Image,
    Text,
    Unsupported,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Image => "image",
            DocumentFormat::Text => "text",
            DocumentFormat::Unsupported => "unsupported",
        }
    }
}

/// Read-only description of one input document.
///
/// Built once when the raw bytes are opened and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    pub id: String,
    pub byte_len: u64,
    pub page_count: u32,
    pub encrypted: bool,
    pub format: DocumentFormat,
    pub mime_type: Option<String>,
    /// Authoring tool / producer tag (e.g. "Microsoft Word", "ScanSnap").
    pub producer: Option<String>,
    /// Container format version (e.g. PDF "1.7").
    pub format_version: Option<String>,
    /// Hex SHA-256 of the raw bytes.
    pub content_hash: String,
    pub template_hint: Option<TemplateType>,
}

impl DocumentHandle {
    /// Compute SHA-256 hash of content.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Handle for bytes no reader understands.
    pub fn unsupported(id: &str, content: &[u8], template_hint: Option<TemplateType>) -> Self {
        Self {
            id: id.to_string(),
            byte_len: content.len() as u64,
            page_count: 0,
            encrypted: false,
            format: DocumentFormat::Unsupported,
            mime_type: None,
            producer: None,
            format_version: None,
            content_hash: Self::compute_hash(content),
            template_hint,
        }
    }

    /// Snapshot for the audit trail.
    pub fn properties(&self) -> DocumentProperties {
        DocumentProperties {
            byte_len: self.byte_len,
            page_count: self.page_count,
            encrypted: self.encrypted,
            format: self.format,
            mime_type: self.mime_type.clone(),
            producer: self.producer.clone(),
            format_version: self.format_version.clone(),
            content_sha256: self.content_hash.clone(),
        }
    }
}

/// Document properties as recorded in `audit.document_properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProperties {
    pub byte_len: u64,
    pub page_count: u32,
    pub encrypted: bool,
    pub format: DocumentFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    pub content_sha256: String,
}
