//! Local recognition tier: the `tesseract` command-line engine.

use std::path::Path;
use std::process::Command;

use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
use super::model_utils::check_binary;

const BINARY: &str = "tesseract";

/// Disclosure pages are dense tabular forms; treat each page as one
/// uniform block so table rows stay on a single line.
const PAGE_SEGMENTATION_MODE: &str = "6";

pub struct TesseractBackend {
    config: OcrConfig,
}

impl TesseractBackend {
    pub fn new() -> Self {
        Self::with_config(OcrConfig::default())
    }

    pub fn with_config(config: OcrConfig) -> Self {
        Self { config }
    }

    fn command(&self, image_path: &Path) -> Command {
        let mut cmd = Command::new(BINARY);
        cmd.arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .args(["--psm", PAGE_SEGMENTATION_MODE]);
        cmd
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for TesseractBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Tesseract
    }

    fn is_available(&self) -> bool {
        check_binary(BINARY)
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            format!("tesseract found (language: {})", self.config.language)
        } else {
            "tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        }
    }

    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let output = self.command(image_path).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::BackendNotAvailable(self.availability_hint())
            } else {
                OcrError::Io(e)
            }
        })?;
        if !output.status.success() {
            return Err(OcrError::OcrFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        tracing::debug!(
            "tesseract recognized {} bytes from {}",
            output.stdout.len(),
            image_path.display()
        );
        Ok(OcrResult {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            confidence: None,
            backend: OcrBackendType::Tesseract,
            model: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let backend = TesseractBackend::with_config(OcrConfig {
            language: "eng+spa".to_string(),
            ..Default::default()
        });
        let cmd = backend.command(Path::new("/tmp/page-1.png"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "/tmp/page-1.png");
        assert_eq!(args[1], "stdout");
        assert!(args.windows(2).any(|w| w == ["-l", "eng+spa"]));
        assert!(args.windows(2).any(|w| w == ["--psm", "6"]));
    }
}
