//! Single raster images (scans, phone photos) treated as one-page documents.

use std::path::{Path, PathBuf};

use finscan::models::DocumentHandle;
use image::ImageFormat;

use super::DocumentReader;
use crate::error::ReaderError;

pub struct ImageReader {
    handle: DocumentHandle,
    content: Vec<u8>,
    extension: &'static str,
}

impl ImageReader {
    /// Only the header is checked here; a corrupt body surfaces later as a
    /// page-level preprocessing failure.
    pub fn open(mut handle: DocumentHandle, content: &[u8]) -> Result<Self, ReaderError> {
        let format = image::guess_format(content)
            .map_err(|e| ReaderError::Unreadable(format!("unrecognized image: {}", e)))?;
        let extension = format.extensions_str().first().copied().unwrap_or("img");
        handle.page_count = 1;
        handle.format_version = Some(format_name(format).to_string());
        Ok(Self {
            handle,
            content: content.to_vec(),
            extension,
        })
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Gif => "gif",
        _ => "other",
    }
}

impl DocumentReader for ImageReader {
    fn handle(&self) -> &DocumentHandle {
        &self.handle
    }

    fn native_page_text(&self, page: u32) -> Result<String, ReaderError> {
        self.check_page(page)?;
        Ok(String::new())
    }

    fn render_page(&self, page: u32, dir: &Path) -> Result<PathBuf, ReaderError> {
        self.check_page(page)?;
        let path = dir.join(format!("page-{}.{}", page, self.extension));
        std::fs::write(&path, &self.content)?;
        Ok(path)
    }
}
