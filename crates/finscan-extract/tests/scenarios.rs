//! End-to-end extraction scenarios.
//!
//! Each test drives raw bytes through the full engine and checks the
//! finalized record: status, fields, rows and the audit trail.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{GrayImage, ImageFormat, Luma};

use finscan::budget::{AtomicBudget, BudgetError, BudgetProvider};
use finscan::config::EngineConfig;
use finscan::models::{
    AttemptOutcome, ExtractionMethod, ExtractionRecord, FieldData, FinalStatus, TemplateType,
    TextAvailability,
};
use finscan_extract::ocr::{OcrBackend, OcrBackendType, OcrError, OcrResult};
use finscan_extract::{CancellationFlag, ExtractionEngine, ExtractionRequest};

/// Recognition backend that always returns the same text.
struct FixedBackend {
    backend_type: OcrBackendType,
    text: String,
}

impl OcrBackend for FixedBackend {
    fn backend_type(&self) -> OcrBackendType {
        self.backend_type
    }
    fn is_available(&self) -> bool {
        true
    }
    fn availability_hint(&self) -> String {
        String::new()
    }
    fn ocr_image(&self, _image_path: &Path) -> Result<OcrResult, OcrError> {
        Ok(OcrResult {
            text: self.text.clone(),
            confidence: None,
            backend: self.backend_type,
            model: None,
        })
    }
}

fn backend(backend_type: OcrBackendType, text: &str) -> Arc<dyn OcrBackend> {
    Arc::new(FixedBackend {
        backend_type,
        text: text.to_string(),
    })
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.acquisition.max_retries = 0;
    config.acquisition.backoff_base_ms = 1;
    config
}

fn engine(budget: u64) -> (ExtractionEngine, Arc<AtomicBudget>) {
    let budget = Arc::new(AtomicBudget::new(budget));
    (ExtractionEngine::new(config(), budget.clone()), budget)
}

fn scanned_page() -> Vec<u8> {
    let img = GrayImage::from_pixel(80, 80, Luma([255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn ptr_header() -> String {
    "PERIODIC TRANSACTION REPORT
Clerk of the House of Representatives
Filing ID #20026537
Name: Hon. Jane Doe
Status: Member
State/District: CA12
TRANSACTIONS
ID Owner Asset Transaction Type Date Notification Date Amount
"
    .to_string()
}

const PTR_FOOTER: &str = "* For the complete list of asset type abbreviations, please visit the Clerk's site.
Digitally Signed: Hon. Jane Doe , 2025-01-21";

/// A native transaction report with `rows` purchase rows.
fn ptr_document(rows: usize) -> String {
    let mut text = ptr_header();
    for i in 0..rows {
        text.push_str(&format!(
            "SP Holding {} Corporation - Common Stock (HC{}) [ST] P 2025-01-{:02} 2025-01-20 $1,001 - $15,000\n",
            i + 1,
            i + 1,
            i + 5
        ));
    }
    text.push_str(PTR_FOOTER);
    text
}

async fn run(engine: &ExtractionEngine, request: ExtractionRequest) -> ExtractionRecord {
    engine.process(request, &CancellationFlag::new()).await.record
}

fn assert_confidence_bounds(record: &ExtractionRecord) {
    for (name, confidence) in &record.audit.field_confidence {
        assert!(
            (0.0..=1.0).contains(confidence),
            "{} confidence {} out of bounds",
            name,
            confidence
        );
    }
    assert!((0.0..=1.0).contains(&record.audit.aggregate_confidence));
    assert!((0.0..=100.0).contains(&record.audit.completeness_pct));
}

#[tokio::test]
async fn test_native_transaction_report_completes() {
    let (engine, budget) = engine(10);
    let record = run(
        &engine,
        ExtractionRequest::new("ptr-native", ptr_document(9).into_bytes()),
    )
    .await;

    assert_eq!(record.status, FinalStatus::Complete);
    assert_eq!(record.template_type, TemplateType::TransactionReport);
    assert_eq!(record.transactions.len(), 9);
    assert_eq!(
        record.transactions[8].asset,
        "Holding 9 Corporation - Common Stock (HC9) [ST]"
    );
    assert_eq!(
        record.fields.get("filer_status"),
        Some(&Some(FieldData::Enum("Member".to_string())))
    );
    assert!(record.audit.aggregate_confidence >= 0.9);
    assert_eq!(record.audit.completeness_pct, 100.0);
    assert_eq!(record.audit.extraction_attempts.len(), 1);
    assert_eq!(
        record.audit.extraction_attempts[0].method,
        ExtractionMethod::NativeText
    );
    assert_eq!(record.audit.classification.verdict, TextAvailability::Native);
    assert!(record.audit.validation_errors.is_empty());
    assert!(record.audit.validation_warnings.is_empty());
    assert!(record.audit.suspicious_patterns.is_empty());
    assert_eq!(budget.remaining(), 10);
    assert_confidence_bounds(&record);
}

#[tokio::test]
async fn test_unreadable_scan_without_authorization_needs_review() {
    let (engine, budget) = engine(10);
    let engine = engine
        .with_local_backend(backend(OcrBackendType::Tesseract, "~~ |# ;;"))
        .with_cloud_backend(backend(OcrBackendType::Gemini, &ptr_document(1)));
    let record = run(
        &engine,
        ExtractionRequest::new("scan-denied", scanned_page()).with_cloud_authorized(false),
    )
    .await;

    assert_eq!(record.status, FinalStatus::RequiresManualReview);
    let methods: Vec<ExtractionMethod> = record
        .audit
        .extraction_attempts
        .iter()
        .map(|a| a.method)
        .collect();
    assert_eq!(
        methods,
        vec![ExtractionMethod::NativeText, ExtractionMethod::LocalOcr]
    );
    assert!(record
        .audit
        .notes
        .iter()
        .any(|n| n.contains("not authorized")));
    assert!(record
        .audit
        .notes
        .iter()
        .any(|n| n.contains("manual review required")));
    assert_eq!(budget.remaining(), 10);
    assert_confidence_bounds(&record);
}

#[tokio::test]
async fn test_date_order_violation_is_a_warning() {
    let (engine, _) = engine(0);
    let mut text = ptr_header();
    text.push_str(
        "SP Microsoft Corporation - Common Stock (MSFT) [ST] P 2025-02-01 2025-01-15 $1,001 - $15,000\n",
    );
    text.push_str(PTR_FOOTER);
    let record = run(&engine, ExtractionRequest::new("ptr-dates", text.into_bytes())).await;

    assert_eq!(record.status, FinalStatus::Complete);
    assert_eq!(record.transactions.len(), 1);
    assert!(record.audit.validation_errors.is_empty());
    assert!(record.audit.validation_warnings.contains(
        &"date_order_violation: transaction_date 2025-02-01 is after notification_date 2025-01-15 (row 1)"
            .to_string()
    ));
}

#[tokio::test]
async fn test_corrupt_bytes_fail_validation() {
    let (engine, _) = engine(10);
    let record = run(
        &engine,
        ExtractionRequest::new(
            "corrupt",
            b"\x13\x37\xc0\xde\x00\x01corrupt\xff\xfe".to_vec(),
        ),
    )
    .await;

    assert_eq!(record.status, FinalStatus::ValidationFailed);
    assert!(record.fields.is_empty());
    assert!(record.transactions.is_empty());
    assert!(record.audit.extraction_attempts.is_empty());
    assert_eq!(
        record.audit.classification.verdict,
        TextAvailability::Unsupported
    );
    assert!(record
        .audit
        .notes
        .iter()
        .any(|n| n.starts_with("Unsupported format")));
    assert_eq!(record.audit.document_properties.byte_len, 15);
}

#[tokio::test]
async fn test_same_input_serializes_identically() {
    let (engine, _) = engine(0);
    let request = ExtractionRequest::new("ptr-twice", ptr_document(3).into_bytes());
    let first = run(&engine, request.clone()).await.to_json(false).unwrap();
    let second = run(&engine, request).await.to_json(false).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_authorized_cloud_escalates_in_order() {
    let (engine, budget) = engine(5);
    let engine = engine
        .with_local_backend(backend(OcrBackendType::Tesseract, "~~ |# ;;"))
        .with_cloud_backend(backend(OcrBackendType::Gemini, &ptr_document(2)));
    let record = run(
        &engine,
        ExtractionRequest::new("scan-cloud", scanned_page()).with_cloud_authorized(true),
    )
    .await;

    let attempts = &record.audit.extraction_attempts;
    let methods: Vec<ExtractionMethod> = attempts.iter().map(|a| a.method).collect();
    assert_eq!(
        methods,
        vec![
            ExtractionMethod::NativeText,
            ExtractionMethod::LocalOcr,
            ExtractionMethod::CloudOcr
        ]
    );
    // Every tier before the last one fell short.
    for attempt in &attempts[..attempts.len() - 1] {
        assert_ne!(attempt.outcome, AttemptOutcome::Success);
    }
    assert_eq!(budget.remaining(), 4);
    assert_eq!(record.status, FinalStatus::Complete);
    assert_eq!(record.template_type, TemplateType::TransactionReport);
    assert_eq!(record.transactions.len(), 2);
    assert!(record
        .audit
        .notes
        .iter()
        .any(|n| n == "template detected after text acquisition: transaction_report"));
    // Cloud-sourced values carry the cloud tier weight.
    let cloud_weight = config().scoring.cloud_ocr_weight;
    for confidence in record.audit.field_confidence.values() {
        assert!(*confidence <= cloud_weight + 1e-9);
    }
    assert_confidence_bounds(&record);
}

#[tokio::test]
async fn test_completeness_counts_expected_fields() {
    let (engine, _) = engine(0);
    let text = ptr_document(2)
        .replace("Filing ID #20026537\n", "")
        .replace("State/District: CA12\n", "");
    let record = run(&engine, ExtractionRequest::new("ptr-partial", text.into_bytes())).await;

    // Five header fields plus the transaction table; two headers missing.
    let expected = 4.0 / 6.0 * 100.0;
    assert!((record.audit.completeness_pct - expected).abs() < 1e-3);
    assert_eq!(record.fields.get("filing_id"), Some(&None));
    assert_eq!(record.audit.field_confidence.get("filing_id"), Some(&0.0));
    assert_eq!(record.status, FinalStatus::Complete);
}

#[tokio::test]
async fn test_multi_page_report_without_rows_is_suspicious() {
    let (engine, _) = engine(0);
    let text = format!(
        "{}\x0cPage 2 of 2. The reporting individual lists transactions on the attached schedule which was not included with this filing.\n{}",
        ptr_header(),
        PTR_FOOTER
    );
    let record = run(
        &engine,
        ExtractionRequest::new("ptr-empty", text.into_bytes())
            .with_template_hint(Some(TemplateType::TransactionReport)),
    )
    .await;

    assert_eq!(record.audit.document_properties.page_count, 2);
    assert!(record.transactions.is_empty());
    assert!(record
        .audit
        .suspicious_patterns
        .iter()
        .any(|p| p.starts_with("transaction_report_without_rows")));
}

#[tokio::test]
async fn test_garbled_rows_are_not_an_empty_table() {
    let (engine, _) = engine(0);
    let text = format!(
        "{}SP Mcrsft Crp C0mm0n Stk P 2O25-0l-15 $l,00l\nAppl lnc Cmmn St0ck S 2025-01-1O $15.001\n{}",
        ptr_header(),
        PTR_FOOTER
    );
    let record = run(&engine, ExtractionRequest::new("ptr-garbled", text.into_bytes())).await;

    assert_eq!(record.audit.document_properties.page_count, 1);
    assert!(record.transactions.is_empty());
    let expected = 5.0 / 6.0 * 100.0;
    assert!((record.audit.completeness_pct - expected).abs() < 1e-3);
    assert_eq!(record.audit.field_confidence.get("transactions"), Some(&0.0));
    assert!(record
        .audit
        .suspicious_patterns
        .iter()
        .any(|p| p.starts_with("unparsed_rows: 2")));
}

/// Budget whose every reservation loses a race with another writer.
struct ContendedBudget {
    calls: AtomicUsize,
}

impl BudgetProvider for ContendedBudget {
    fn remaining(&self) -> u64 {
        5
    }
    fn try_reserve(&self, _units: u64) -> Result<u64, BudgetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BudgetError::Contended)
    }
}

#[tokio::test]
async fn test_contended_budget_needs_review() {
    let budget = Arc::new(ContendedBudget {
        calls: AtomicUsize::new(0),
    });
    let engine = ExtractionEngine::new(config(), budget.clone())
        .with_local_backend(backend(OcrBackendType::Tesseract, "~~ |# ;;"))
        .with_cloud_backend(backend(OcrBackendType::Gemini, &ptr_document(1)));
    let record = run(
        &engine,
        ExtractionRequest::new("scan-contended", scanned_page()).with_cloud_authorized(true),
    )
    .await;

    assert_eq!(record.status, FinalStatus::RequiresManualReview);
    assert_eq!(budget.calls.load(Ordering::SeqCst), 1);
    assert!(record
        .audit
        .extraction_attempts
        .iter()
        .all(|a| a.method != ExtractionMethod::CloudOcr));
    assert!(record
        .audit
        .notes
        .iter()
        .any(|n| n.contains("changed concurrently")));
}

#[tokio::test]
async fn test_cancelled_document_is_finalized() {
    let (engine, _) = engine(0);
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let output = engine
        .process(
            ExtractionRequest::new("ptr-cancelled", ptr_document(1).into_bytes()),
            &cancel,
        )
        .await;

    assert_eq!(output.record.status, FinalStatus::RequiresManualReview);
    assert!(output.text.is_none());
    assert!(output
        .record
        .audit
        .notes
        .contains(&"Cancelled before classify stage".to_string()));
}
