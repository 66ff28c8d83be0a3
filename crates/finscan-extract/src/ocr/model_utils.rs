//! Shared utilities for OCR backends.

/// Hint shown when poppler's rasterizer is missing.
pub const PDFTOPPM_NOT_FOUND: &str =
    "pdftoppm not installed. Install with: apt install poppler-utils";

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Check pdftoppm availability, returning a hint message if missing.
pub fn check_pdftoppm_hint() -> Option<String> {
    if check_binary("pdftoppm") {
        None
    } else {
        Some(PDFTOPPM_NOT_FOUND.to_string())
    }
}
