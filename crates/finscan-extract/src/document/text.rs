//! Plain-text documents, one page per form-feed separated chunk.

use std::path::{Path, PathBuf};

use finscan::models::DocumentHandle;

use super::DocumentReader;
use crate::error::ReaderError;

pub struct TextReader {
    handle: DocumentHandle,
    pages: Vec<String>,
}

impl TextReader {
    pub fn open(mut handle: DocumentHandle, content: &[u8]) -> Result<Self, ReaderError> {
        let text = std::str::from_utf8(content)
            .map_err(|e| ReaderError::Unreadable(format!("invalid UTF-8: {}", e)))?;
        let mut pages: Vec<String> = text.split('\x0c').map(str::to_string).collect();
        // A trailing form feed closes the last page rather than opening a new one.
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        handle.page_count = pages.len() as u32;
        Ok(Self { handle, pages })
    }
}

impl DocumentReader for TextReader {
    fn handle(&self) -> &DocumentHandle {
        &self.handle
    }

    fn native_page_text(&self, page: u32) -> Result<String, ReaderError> {
        self.check_page(page)?;
        Ok(self.pages[(page - 1) as usize].clone())
    }

    fn render_page(&self, page: u32, _dir: &Path) -> Result<PathBuf, ReaderError> {
        self.check_page(page)?;
        Err(ReaderError::NoRaster(page))
    }
}
