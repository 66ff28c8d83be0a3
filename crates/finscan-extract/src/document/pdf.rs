//! PDF documents via the poppler command-line tools.
//!
//! `pdfinfo` supplies page count, encryption flag and producer tag,
//! `pdftotext` the native text of one page, and `pdftoppm` the page raster.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use finscan::models::DocumentHandle;
use tempfile::NamedTempFile;

use super::DocumentReader;
use crate::error::ReaderError;

pub struct PdfReader {
    handle: DocumentHandle,
    file: NamedTempFile,
    dpi: u32,
}

/// Fields of interest from `pdfinfo` output.
#[derive(Debug, Default, PartialEq)]
struct PdfInfo {
    pages: u32,
    encrypted: bool,
    producer: Option<String>,
    version: Option<String>,
}

impl PdfInfo {
    fn parse(output: &str) -> Self {
        let mut info = PdfInfo::default();
        let mut creator = None;
        for line in output.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Pages" => info.pages = value.parse().unwrap_or(0),
                "Encrypted" => info.encrypted = value.starts_with("yes"),
                "Producer" if !value.is_empty() => info.producer = Some(value.to_string()),
                "Creator" if !value.is_empty() => creator = Some(value.to_string()),
                "PDF version" if !value.is_empty() => info.version = Some(value.to_string()),
                _ => {}
            }
        }
        if info.producer.is_none() {
            info.producer = creator;
        }
        info
    }
}

fn run_tool(tool: &'static str, command: &mut Command) -> Result<Output, ReaderError> {
    match command.output() {
        Ok(output) => Ok(output),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ReaderError::ToolNotFound(tool)),
        Err(e) => Err(ReaderError::Io(e)),
    }
}

impl PdfReader {
    pub fn open(mut handle: DocumentHandle, content: &[u8], dpi: u32) -> Result<Self, ReaderError> {
        let mut file = tempfile::Builder::new()
            .prefix("finscan-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(content)?;
        file.flush()?;

        let output = run_tool("pdfinfo", Command::new("pdfinfo").arg(file.path()))?;
        if !output.status.success() {
            return Err(ReaderError::Unreadable(format!(
                "pdfinfo failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let info = PdfInfo::parse(&String::from_utf8_lossy(&output.stdout));
        if info.pages == 0 {
            return Err(ReaderError::Unreadable("PDF has no pages".to_string()));
        }

        handle.page_count = info.pages;
        handle.encrypted = info.encrypted;
        handle.producer = info.producer;
        handle.format_version = info.version;

        Ok(Self { handle, file, dpi })
    }
}

impl DocumentReader for PdfReader {
    fn handle(&self) -> &DocumentHandle {
        &self.handle
    }

    fn native_page_text(&self, page: u32) -> Result<String, ReaderError> {
        self.check_page(page)?;
        let page_str = page.to_string();
        let output = run_tool(
            "pdftotext",
            Command::new("pdftotext")
                .args(["-layout", "-f", &page_str, "-l", &page_str])
                .arg(self.file.path())
                .arg("-"),
        )?;
        if !output.status.success() {
            return Err(ReaderError::Unreadable(format!(
                "pdftotext failed on page {}: {}",
                page,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn render_page(&self, page: u32, dir: &Path) -> Result<PathBuf, ReaderError> {
        self.check_page(page)?;
        let page_str = page.to_string();
        let dpi = self.dpi.to_string();
        let output = run_tool(
            "pdftoppm",
            Command::new("pdftoppm")
                .args(["-png", "-r", &dpi, "-f", &page_str, "-l", &page_str])
                .arg(self.file.path())
                .arg(dir.join("page")),
        )?;
        if !output.status.success() {
            return Err(ReaderError::Unreadable(format!(
                "pdftoppm failed on page {}",
                page
            )));
        }
        find_page_image(dir, page)
            .ok_or_else(|| ReaderError::Unreadable(format!("No image generated for page {}", page)))
    }
}

/// Find the image file for a specific page number.
///
/// pdftoppm names files like page-01.png, page-02.png, etc.
/// The padding width varies based on total page count.
pub fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    for digits in [1, 2, 3, 4] {
        let path = dir.join(format!("page-{:0width$}.png", page, width = digits));
        if path.exists() {
            return Some(path);
        }
    }
    None
}
