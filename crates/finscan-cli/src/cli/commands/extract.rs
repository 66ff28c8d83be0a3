//! Single-document extraction command.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use finscan::budget::AtomicBudget;
use finscan::config::EngineConfig;
use finscan::models::TemplateType;
use finscan_extract::{CancellationFlag, ExtractionEngine, ExtractionRequest};

/// Extract one file and print the record.
pub async fn cmd_extract(
    config: EngineConfig,
    file: &Path,
    id: Option<String>,
    template: Option<&str>,
    authorize_cloud: bool,
    pretty: bool,
) -> anyhow::Result<()> {
    let template_hint = template.map(parse_template).transpose()?;
    let document_id = id.unwrap_or_else(|| document_id_for(file));
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let budget = Arc::new(AtomicBudget::new(config.budget.cloud_pages));
    let engine = ExtractionEngine::with_default_backends(config, budget);

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finalizing at the next stage boundary");
            on_interrupt.cancel();
        }
    });

    let request = ExtractionRequest::new(document_id, content)
        .with_template_hint(template_hint)
        .with_cloud_authorized(authorize_cloud);
    let output = engine.process(request, &cancel).await;
    println!("{}", output.record.to_json(pretty)?);
    Ok(())
}

fn parse_template(name: &str) -> anyhow::Result<TemplateType> {
    match TemplateType::from_str(name) {
        Some(TemplateType::Unknown) | None => {
            let known: Vec<&str> = TemplateType::ALL.iter().map(|t| t.as_str()).collect();
            anyhow::bail!("Unknown template '{}' (expected one of: {})", name, known.join(", "))
        }
        Some(template_type) => Ok(template_type),
    }
}

fn document_id_for(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
