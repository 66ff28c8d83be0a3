//! Document readers: open raw bytes and expose per-page native text and rasters.
//!
//! The container format is detected from magic bytes with `infer`; plain
//! UTF-8 text (pages separated by form feeds, as `pdftotext` emits) is
//! recognized separately. Anything else is unsupported.

mod pdf;
mod raster;
mod text;

pub use pdf::{find_page_image, PdfReader};
pub use raster::ImageReader;
pub use text::TextReader;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use finscan::models::{DocumentFormat, DocumentHandle, TemplateType};

use crate::error::ReaderError;

/// Read-only access to one opened document.
pub trait DocumentReader: Send + Sync {
    /// Immutable description of the document.
    fn handle(&self) -> &DocumentHandle;

    /// Native (embedded) text of a 1-based page. Empty for raster-only pages.
    fn native_page_text(&self, page: u32) -> Result<String, ReaderError>;

    /// Write a raster of the page into `dir` and return its path.
    fn render_page(&self, page: u32, dir: &Path) -> Result<PathBuf, ReaderError>;

    /// Reject page numbers outside `1..=page_count`.
    fn check_page(&self, page: u32) -> Result<(), ReaderError> {
        let page_count = self.handle().page_count;
        if page == 0 || page > page_count {
            return Err(ReaderError::PageOutOfRange { page, page_count });
        }
        Ok(())
    }
}

/// Detect the container format of raw bytes.
pub fn detect_format(content: &[u8]) -> (DocumentFormat, Option<&'static str>) {
    if content.is_empty() {
        return (DocumentFormat::Unsupported, None);
    }
    if let Some(kind) = infer::get(content) {
        let mime = kind.mime_type();
        return match mime {
            "application/pdf" => (DocumentFormat::Pdf, Some(mime)),
            "image/png" | "image/jpeg" | "image/tiff" | "image/bmp" | "image/gif" => {
                (DocumentFormat::Image, Some(mime))
            }
            _ => (DocumentFormat::Unsupported, Some(mime)),
        };
    }
    if looks_like_text(content) {
        return (DocumentFormat::Text, Some("text/plain"));
    }
    (DocumentFormat::Unsupported, None)
}

/// Valid UTF-8 with no control characters besides layout whitespace.
fn looks_like_text(content: &[u8]) -> bool {
    match std::str::from_utf8(content) {
        Ok(s) => !s
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c')),
        Err(_) => false,
    }
}

/// Open raw bytes with the reader matching their format.
pub fn open_document(
    id: &str,
    content: &[u8],
    template_hint: Option<TemplateType>,
    render_dpi: u32,
) -> Result<Arc<dyn DocumentReader>, ReaderError> {
    let (format, mime) = detect_format(content);
    let mut handle = DocumentHandle::unsupported(id, content, template_hint);
    handle.format = format;
    handle.mime_type = mime.map(str::to_string);

    match format {
        DocumentFormat::Pdf => Ok(Arc::new(PdfReader::open(handle, content, render_dpi)?)),
        DocumentFormat::Image => Ok(Arc::new(ImageReader::open(handle, content)?)),
        DocumentFormat::Text => Ok(Arc::new(TextReader::open(handle, content)?)),
        DocumentFormat::Unsupported => Err(ReaderError::Unreadable(match mime {
            Some(mime) => format!("unsupported content type {}", mime),
            None if content.is_empty() => "empty document".to_string(),
            None => "unrecognized byte stream".to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf_magic() {
        let (format, mime) = detect_format(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n");
        assert_eq!(format, DocumentFormat::Pdf);
        assert_eq!(mime, Some("application/pdf"));
    }

    #[test]
    fn test_detect_text() {
        let (format, _) = detect_format(b"PERIODIC TRANSACTION REPORT\n\x0cPage two");
        assert_eq!(format, DocumentFormat::Text);
    }

    #[test]
    fn test_detect_garbage() {
        let (format, _) = detect_format(b"\x13\x37\xc0\xde\x00\x01corrupt\xff\xfe");
        assert_eq!(format, DocumentFormat::Unsupported);
        assert_eq!(detect_format(b"").0, DocumentFormat::Unsupported);
    }

    #[test]
    fn test_open_unsupported_is_unreadable() {
        let err = open_document("x", b"\x13\x37\xc0\xde\x00\x01", None, 300)
            .err()
            .unwrap();
        assert!(matches!(err, ReaderError::Unreadable(_)));
    }

    #[test]
    fn test_open_text_document() {
        let reader = open_document("doc", b"page one\x0cpage two", None, 300).unwrap();
        assert_eq!(reader.handle().page_count, 2);
        assert_eq!(reader.handle().format, DocumentFormat::Text);
        assert_eq!(reader.native_page_text(2).unwrap(), "page two");
        assert!(matches!(
            reader.native_page_text(3),
            Err(ReaderError::PageOutOfRange { page: 3, page_count: 2 })
        ));
    }
}
