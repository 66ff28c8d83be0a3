//! Template catalog listing.

use console::style;

use finscan_extract::templates::TemplateRegistry;

/// Print every built-in template with its expected fields.
pub fn cmd_templates() -> anyhow::Result<()> {
    for template in TemplateRegistry::global().all() {
        println!(
            "\n{} {}",
            style(template.template_type.as_str()).cyan().bold(),
            style(format!("({})", template.title)).dim()
        );
        for field in &template.schema.fields {
            let required = if field.required {
                style("required").yellow().to_string()
            } else {
                String::new()
            };
            println!(
                "  {:<24} {:<16} {}",
                field.name,
                field.value_type.as_str(),
                required
            );
            if !field.options.is_empty() {
                println!("  {:<24} {}", "", style(field.options.join(" | ")).dim());
            }
        }
        if template.schema.has_rows {
            println!("  {:<24} {:<16}", "transactions", "rows");
        }
    }
    Ok(())
}
