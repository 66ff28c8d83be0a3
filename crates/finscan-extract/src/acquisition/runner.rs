//! Page-level recognition: render, optional preprocessing, then OCR under a
//! per-attempt timeout with bounded retries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use finscan::config::AcquisitionConfig;
use finscan::retry::backoff_delay;

use crate::document::DocumentReader;
use crate::error::ReaderError;
use crate::ocr::{OcrBackend, OcrError, OcrResult};
use crate::preprocess::Preprocessor;

/// Timeout and retry settings for one recognition call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Retries after the first call.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.attempt_timeout_secs),
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        }
    }
}

/// Why a page produced no recognition text.
#[derive(Debug)]
pub enum PageFailure {
    /// The page has no raster or could not be rendered.
    Render(ReaderError),
    /// The preprocessor could not decode or re-encode the raster.
    Preprocessing(String),
    Recognition(OcrError),
}

impl std::fmt::Display for PageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageFailure::Render(e) => write!(f, "render failed: {}", e),
            PageFailure::Preprocessing(e) => write!(f, "preprocessing failed: {}", e),
            PageFailure::Recognition(e) => write!(f, "recognition failed: {}", e),
        }
    }
}

/// Run one recognition call on the blocking pool, retrying transient errors
/// with exponential backoff. A rate limit with a Retry-After hint waits for
/// the hinted interval instead.
pub async fn recognize_with_retry(
    backend: Arc<dyn OcrBackend>,
    image: PathBuf,
    policy: RetryPolicy,
) -> Result<OcrResult, OcrError> {
    let backend_type = backend.backend_type();
    let mut attempt = 0u32;

    loop {
        let call_backend = backend.clone();
        let call_image = image.clone();
        let call = tokio::task::spawn_blocking(move || call_backend.ocr_image(&call_image));

        let result = match tokio::time::timeout(policy.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(OcrError::OcrFailed(format!(
                "recognition task aborted: {}",
                join_err
            ))),
            Err(_) => Err(OcrError::Timeout {
                backend: backend_type,
                timeout: policy.timeout,
            }),
        };

        match result {
            Ok(result) => {
                tracing::debug!(
                    "{} recognized {} chars from {} (engine confidence {:?})",
                    backend_type,
                    result.text.len(),
                    image.display(),
                    result.confidence
                );
                return Ok(result);
            }
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = match &e {
                    OcrError::RateLimited {
                        retry_after_secs: Some(secs),
                        ..
                    } => Duration::from_secs(*secs),
                    _ => backoff_delay(attempt, policy.backoff_base_ms),
                };
                attempt += 1;
                tracing::warn!(
                    "{} call failed ({}), retry {}/{} in {:?}",
                    backend_type,
                    e,
                    attempt,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Render a page into `dir`, preprocessing it when a preprocessor is given.
fn prepare_page(
    reader: &dyn DocumentReader,
    page: u32,
    dir: &Path,
    preprocessor: Option<&Preprocessor>,
) -> Result<PathBuf, PageFailure> {
    let raw = reader.render_page(page, dir).map_err(PageFailure::Render)?;
    let Some(preprocessor) = preprocessor else {
        return Ok(raw);
    };
    let cleaned = dir.join(format!("page-{}-clean.png", page));
    preprocessor
        .preprocess_file(&raw, &cleaned)
        .map_err(|e| PageFailure::Preprocessing(e.to_string()))?;
    Ok(cleaned)
}

/// Recognize one page end to end.
pub async fn recognize_page(
    reader: Arc<dyn DocumentReader>,
    backend: Arc<dyn OcrBackend>,
    page: u32,
    dir: PathBuf,
    preprocessor: Option<Preprocessor>,
    policy: RetryPolicy,
) -> Result<OcrResult, PageFailure> {
    let image = tokio::task::spawn_blocking(move || {
        prepare_page(reader.as_ref(), page, &dir, preprocessor.as_ref())
    })
    .await
    .map_err(|e| PageFailure::Preprocessing(format!("page preparation aborted: {}", e)))??;

    recognize_with_retry(backend, image, policy)
        .await
        .map_err(PageFailure::Recognition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrBackendType;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyBackend {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl OcrBackend for FlakyBackend {
        fn backend_type(&self) -> OcrBackendType {
            OcrBackendType::Tesseract
        }
        fn is_available(&self) -> bool {
            true
        }
        fn availability_hint(&self) -> String {
            String::new()
        }
        fn ocr_image(&self, _image_path: &Path) -> Result<OcrResult, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(OcrError::OcrFailed("flaky".into()));
            }
            Ok(OcrResult {
                text: "recognized".into(),
                confidence: None,
                backend: OcrBackendType::Tesseract,
                model: None,
            })
        }
    }

    struct SlowBackend;

    impl OcrBackend for SlowBackend {
        fn backend_type(&self) -> OcrBackendType {
            OcrBackendType::Gemini
        }
        fn is_available(&self) -> bool {
            true
        }
        fn availability_hint(&self) -> String {
            String::new()
        }
        fn ocr_image(&self, _image_path: &Path) -> Result<OcrResult, OcrError> {
            std::thread::sleep(Duration::from_millis(300));
            Err(OcrError::OcrFailed("too late".into()))
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(5),
            max_retries,
            backoff_base_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let backend = Arc::new(FlakyBackend {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        });
        let result = recognize_with_retry(backend.clone(), PathBuf::from("page.png"), policy(3))
            .await
            .unwrap();
        assert_eq!(result.text, "recognized");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let backend = Arc::new(FlakyBackend {
            failures_left: AtomicU32::new(10),
            calls: AtomicU32::new(0),
        });
        let err = recognize_with_retry(backend.clone(), PathBuf::from("page.png"), policy(2))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::OcrFailed(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_applies_per_attempt() {
        let policy = RetryPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 0,
            backoff_base_ms: 1,
        };
        let err = recognize_with_retry(Arc::new(SlowBackend), PathBuf::from("page.png"), policy)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::Timeout { .. }));
    }
}
