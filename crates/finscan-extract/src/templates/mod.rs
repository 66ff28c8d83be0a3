//! Template registry: the static catalog of disclosure templates.
//!
//! Each template carries its structural markers (for classification), the
//! ordered pattern rules per field, the row layout for repeated structures
//! and the validation schema. New templates are added to the catalog; the
//! pipeline never changes.

mod catalog;

use std::sync::LazyLock;

use finscan::models::{TemplateType, ValueType};
use regex::Regex;

/// Name under which the repeated-row structure is counted as a field.
pub const TRANSACTIONS_FIELD: &str = "transactions";

/// How a rule's patterns are resolved against the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Capture group 1 of the first matching pattern is the value.
    Capture,
    /// Patterns locate a label; the value is the state of the adjacent mark.
    Checkbox,
    /// One label pattern per option; the checked label selects the option.
    CheckboxGroup,
}

/// Ordered match expressions for one field. First match wins.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub field: &'static str,
    pub patterns: Vec<Regex>,
    pub required: bool,
    pub value_type: ValueType,
    /// Enumeration members. For checkbox groups, `options[i]` is the value
    /// selected by `patterns[i]`.
    pub options: Vec<&'static str>,
    pub kind: MatchKind,
}

impl PatternRule {
    pub fn capture(field: &'static str, value_type: ValueType, patterns: &[&str]) -> Self {
        Self {
            field,
            patterns: patterns.iter().map(|p| compile(p)).collect(),
            required: false,
            value_type,
            options: Vec::new(),
            kind: MatchKind::Capture,
        }
    }

    pub fn checkbox(field: &'static str, labels: &[&str]) -> Self {
        Self {
            field,
            patterns: labels.iter().map(|p| compile(p)).collect(),
            required: false,
            value_type: ValueType::Checkbox,
            options: Vec::new(),
            kind: MatchKind::Checkbox,
        }
    }

    pub fn checkbox_group(field: &'static str, options: &[(&str, &'static str)]) -> Self {
        Self {
            field,
            patterns: options.iter().map(|(p, _)| compile(p)).collect(),
            required: false,
            value_type: ValueType::Enum,
            options: options.iter().map(|(_, v)| *v).collect(),
            kind: MatchKind::CheckboxGroup,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn options(mut self, options: &[&'static str]) -> Self {
        self.options = options.to_vec();
        self
    }
}

/// A cell of a repeated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCell {
    Owner,
    Asset,
    Action,
    TransactionDate,
    NotificationDate,
    Amount,
}

impl RowCell {
    /// Capture-group name used by row patterns.
    pub fn group(&self) -> &'static str {
        match self {
            RowCell::Owner => "owner",
            RowCell::Asset => "asset",
            RowCell::Action => "action",
            RowCell::TransactionDate => "transaction_date",
            RowCell::NotificationDate => "notification_date",
            RowCell::Amount => "amount",
        }
    }
}

/// One row-level pattern, with an optional fixed action label.
#[derive(Debug, Clone)]
pub struct RowRule {
    pub pattern: Regex,
    pub action: Option<&'static str>,
}

impl RowRule {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: compile(pattern),
            action: None,
        }
    }

    pub fn with_action(pattern: &str, action: &'static str) -> Self {
        Self {
            pattern: compile(pattern),
            action: Some(action),
        }
    }
}

/// Layout of a repeated-row region.
#[derive(Debug, Clone)]
pub struct RowSpec {
    /// The region begins after the first line matching any of these.
    pub region_start: Vec<Regex>,
    /// The region ends at the first following line matching any of these.
    pub region_end: Vec<Regex>,
    /// Lines inside the region that are layout rather than rows: column
    /// headers, detail lines, page markers. Lines matching a start marker
    /// are treated the same way.
    pub skip: Vec<Regex>,
    /// Ordered row patterns, applied per line; first match wins.
    pub rules: Vec<RowRule>,
    /// Cells a complete row fills.
    pub cells: Vec<RowCell>,
}

/// A side of a date-order business rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRef {
    Field(&'static str),
    Row(RowCell),
}

impl DateRef {
    pub fn name(&self) -> &'static str {
        match self {
            DateRef::Field(name) => name,
            DateRef::Row(cell) => cell.group(),
        }
    }
}

/// Cross-field rules. Violations are warnings, never blocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessRule {
    /// `earlier` must not fall after `later`.
    DateOrder { earlier: DateRef, later: DateRef },
}

/// Schema entry for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub value_type: ValueType,
    pub required: bool,
    pub options: Vec<&'static str>,
}

/// Validation schema for one template type.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSchema {
    pub template_type: TemplateType,
    pub fields: Vec<FieldSchema>,
    pub has_rows: bool,
    pub business_rules: Vec<BusinessRule>,
}

impl TemplateSchema {
    /// Expected field names, including the row structure when present.
    pub fn expected_fields(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.fields.iter().map(|f| f.name).collect();
        if self.has_rows {
            names.push(TRANSACTIONS_FIELD);
        }
        names
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Everything the engine knows about one template type.
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub template_type: TemplateType,
    pub title: &'static str,
    pub markers: Vec<Regex>,
    pub rules: Vec<PatternRule>,
    pub rows: Option<RowSpec>,
    pub schema: TemplateSchema,
}

impl TemplateSpec {
    pub fn new(
        template_type: TemplateType,
        title: &'static str,
        markers: &[&str],
        rules: Vec<PatternRule>,
        rows: Option<RowSpec>,
        business_rules: Vec<BusinessRule>,
    ) -> Self {
        let schema = TemplateSchema {
            template_type,
            fields: rules
                .iter()
                .map(|r| FieldSchema {
                    name: r.field,
                    value_type: r.value_type,
                    required: r.required,
                    options: r.options.clone(),
                })
                .collect(),
            has_rows: rows.is_some(),
            business_rules,
        };
        Self {
            template_type,
            title,
            markers: markers.iter().map(|p| compile(p)).collect(),
            rules,
            rows,
            schema,
        }
    }

    /// Number of structural markers present in `text`.
    pub fn marker_hits(&self, text: &str) -> usize {
        self.markers.iter().filter(|m| m.is_match(text)).count()
    }
}

/// Schema lookup by template type.
pub trait SchemaRegistry: Send + Sync {
    fn schema(&self, template_type: TemplateType) -> Option<&TemplateSchema>;
}

/// The static template catalog.
pub struct TemplateRegistry {
    templates: Vec<TemplateSpec>,
}

static REGISTRY: LazyLock<TemplateRegistry> = LazyLock::new(TemplateRegistry::builtin);

impl TemplateRegistry {
    /// Process-wide registry with the built-in templates.
    pub fn global() -> &'static TemplateRegistry {
        &REGISTRY
    }

    pub fn builtin() -> Self {
        Self {
            templates: catalog::builtin_templates(),
        }
    }

    pub fn get(&self, template_type: TemplateType) -> Option<&TemplateSpec> {
        self.templates
            .iter()
            .find(|t| t.template_type == template_type)
    }

    pub fn all(&self) -> impl Iterator<Item = &TemplateSpec> {
        self.templates.iter()
    }

    /// Template whose markers best match `text`; ties go to catalog order.
    pub fn detect(&self, text: &str) -> Option<(TemplateType, usize)> {
        let mut best: Option<(TemplateType, usize)> = None;
        for template in &self.templates {
            let hits = template.marker_hits(text);
            if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
                best = Some((template.template_type, hits));
            }
        }
        best
    }
}

impl SchemaRegistry for TemplateRegistry {
    fn schema(&self, template_type: TemplateType) -> Option<&TemplateSchema> {
        self.get(template_type).map(|t| &t.schema)
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("template pattern should compile")
}
