//! Recognition backend availability check.

use console::style;

use finscan::config::EngineConfig;
use finscan_extract::ocr::{
    check_pdftoppm_hint, CloudChain, OcrBackend, OcrConfig, TesseractBackend,
};

/// Report which tiers of the acquisition cascade can run.
pub fn cmd_backends(config: &EngineConfig) -> anyhow::Result<()> {
    println!("\n{}", style("Recognition Backends").bold());
    println!("{}", "-".repeat(50));

    println!("\n{}", style("Rasterizer:").cyan());
    match check_pdftoppm_hint() {
        None => println!("  {:<15} {}", "pdftoppm", style("✓ found").green()),
        Some(hint) => {
            println!("  {:<15} {}", "pdftoppm", style("✗ not found").red());
            println!("                  {}", style(hint).dim());
        }
    }

    println!("\n{}", style("Local tier:").cyan());
    let tesseract = TesseractBackend::with_config(OcrConfig::from_engine(config));
    if tesseract.is_available() {
        println!(
            "  {:<15} {} ({})",
            "tesseract",
            style("✓ available").green(),
            config.acquisition.language
        );
    } else {
        println!("  {:<15} {}", "tesseract", style("✗ not available").red());
        println!(
            "                  {}",
            style(tesseract.availability_hint()).dim()
        );
    }

    println!("\n{}", style("Cloud tier:").cyan());
    if config.cloud.backends.is_empty() {
        println!("  {}", style("none configured").dim());
    }
    for name in &config.cloud.backends {
        if CloudChain::service_available(name) {
            println!("  {:<15} {}", name, style("✓ available").green());
        } else {
            println!("  {:<15} {}", name, style("○ not configured").yellow());
            match CloudChain::service_hint(name) {
                Some(hint) => println!("                  {}", style(hint).dim()),
                None => println!("                  {}", style("not a cloud service").dim()),
            }
        }
    }
    println!(
        "\n  Cloud budget: {} page(s); escalation also requires per-document authorization",
        config.budget.cloud_pages
    );
    Ok(())
}
