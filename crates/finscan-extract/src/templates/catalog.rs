//! Built-in disclosure templates.
//!
//! Patterns run against normalized text, so dates are already ISO and
//! whitespace is collapsed to single spaces.

use finscan::models::{TemplateType, ValueType};
use regex::Regex;

use super::{BusinessRule, DateRef, PatternRule, RowCell, RowRule, RowSpec, TemplateSpec};

const DATE: &str = r"\d{4}-\d{2}-\d{2}";
const RANGE: &str = r"\$[\d,]+(?:\.\d{2})?\s*-\s*\$[\d,]+(?:\.\d{2})?|Over \$[\d,]+";
const EXACT: &str = r"\$[\d,]+(?:\.\d{2})?";
const OWNER: &str = r"(?:(?P<owner>SP|JT|DC)\s+)?";

const FILER_STATUSES: &[&str] = &["Member", "Officer or Employee", "Candidate"];

pub(super) fn builtin_templates() -> Vec<TemplateSpec> {
    vec![
        transaction_report(),
        annual_disclosure(),
        candidate_disclosure(),
        extension_request(),
        termination_notice(),
        gift_travel_report(),
    ]
}

fn filer_name() -> PatternRule {
    PatternRule::capture(
        "filer_name",
        ValueType::FreeText,
        &[
            r"(?im)^\s*Name:\s*(\S.*?)\s*$",
            r"(?im)^\s*Filer(?:'s)?\s+Name:\s*(\S.*?)\s*$",
            r"(?im)^\s*Name\s+of\s+(?:Filer|Reporting\s+Individual):\s*(\S.*?)\s*$",
        ],
    )
    .required()
}

fn filer_status() -> PatternRule {
    PatternRule::capture(
        "filer_status",
        ValueType::Enum,
        &[
            r"(?im)^\s*Status:\s*(Member|Officer or Employee|Candidate)\b",
            r"(?im)^\s*Filer\s+Status:\s*(\S.*?)\s*$",
        ],
    )
    .options(FILER_STATUSES)
}

fn state_district() -> PatternRule {
    PatternRule::capture(
        "state_district",
        ValueType::FreeText,
        &[r"(?im)^\s*State/District:\s*([A-Z]{2}\s?\d{0,2})\b"],
    )
}

fn filing_id() -> PatternRule {
    PatternRule::capture(
        "filing_id",
        ValueType::FreeText,
        &[r"(?i)Filing\s+ID\s*#?\s*:?\s*(\d{5,})"],
    )
}

fn filing_year() -> PatternRule {
    PatternRule::capture(
        "filing_year",
        ValueType::FreeText,
        &[
            r"(?im)^\s*Filing\s+Year:\s*(\d{4})\b",
            r"(?i)Calendar\s+Year\s+(\d{4})\b",
        ],
    )
    .required()
}

fn signature_date() -> PatternRule {
    let patterns = [
        format!(r"(?i)Digitally\s+Signed:[^\n]*?({})", DATE),
        format!(r"(?i)Signature\s+Date:\s*({})", DATE),
        format!(r"(?i)Date\s+Signed:\s*({})", DATE),
    ];
    let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    PatternRule::capture("signature_date", ValueType::Date, &refs).required()
}

fn date_field(field: &'static str, labels: &[&str]) -> PatternRule {
    let patterns: Vec<String> = labels
        .iter()
        .map(|label| format!(r"(?i){}:?\s*({})", label, DATE))
        .collect();
    let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    PatternRule::capture(field, ValueType::Date, &refs)
}

fn transaction_report() -> TemplateSpec {
    let full = format!(
        r"^{OWNER}(?P<asset>.+?)\s+(?P<action>S \(partial\)|P|S|E)\s+(?P<transaction_date>{DATE})\s+(?P<notification_date>{DATE})\s+(?P<amount>{RANGE})"
    );
    let spelled = format!(
        r"(?i)^{OWNER}(?P<asset>.+?)\s+(?P<action>Partial Sale|Purchase|Sale|Exchange)\s+(?P<transaction_date>{DATE})\s+(?:(?P<notification_date>{DATE})\s+)?(?P<amount>{RANGE})"
    );
    let no_notification = format!(
        r"^{OWNER}(?P<asset>.+?)\s+(?P<action>S \(partial\)|P|S|E)\s+(?P<transaction_date>{DATE})\s+(?P<amount>{RANGE})"
    );

    TemplateSpec::new(
        TemplateType::TransactionReport,
        "Periodic Transaction Report",
        &[
            r"(?i)PERIODIC\s+TRANSACTION\s+REPORT",
            r"(?i)Notification\s+Date",
            r"(?i)\bTransaction\s+Type\b",
        ],
        vec![
            filer_name(),
            filer_status().required(),
            state_district(),
            filing_id(),
            signature_date(),
        ],
        Some(RowSpec {
            region_start: vec![
                super::compile(r"(?i)^\s*(?:ID\s+)?Owner\s+Asset\b"),
                super::compile(r"(?i)^\s*TRANSACTIONS\s*$"),
            ],
            region_end: vec![
                super::compile(r"(?i)^\s*\*\s*For\s+the\s+complete\s+list"),
                super::compile(r"(?i)^\s*(?:INITIAL\s+PUBLIC\s+OFFERINGS|CERTIFICATION\s+AND\s+SIGNATURE|I\s+CERTIFY)"),
            ],
            skip: row_layout(&[
                r"(?i)^\s*(?:F\s*S|S\s*O|D|C|L|Filing\s+Status|Subholding\s+Of|Description|Comments|Location)\s*:",
                r"(?i)^\s*(?:Type\s+Date|Cap\.?\s+Gains)\b",
            ]),
            rules: vec![
                RowRule::new(&full),
                RowRule::new(&spelled),
                RowRule::new(&no_notification),
            ],
            cells: vec![
                RowCell::Asset,
                RowCell::Action,
                RowCell::TransactionDate,
                RowCell::NotificationDate,
                RowCell::Amount,
            ],
        }),
        vec![
            BusinessRule::DateOrder {
                earlier: DateRef::Row(RowCell::TransactionDate),
                later: DateRef::Row(RowCell::NotificationDate),
            },
            BusinessRule::DateOrder {
                earlier: DateRef::Row(RowCell::NotificationDate),
                later: DateRef::Field("signature_date"),
            },
        ],
    )
}

/// Layout lines every row region may carry, plus template-specific ones.
fn row_layout(extra: &[&str]) -> Vec<Regex> {
    [
        r"(?i)^\s*Page\s+\d+\s+of\s+\d+\b",
        r"(?i)^\s*None(?:\s+disclosed)?\.?\s*$",
    ]
    .iter()
    .chain(extra)
    .map(|pattern| super::compile(pattern))
    .collect()
}

fn asset_schedule() -> RowSpec {
    let with_income = format!(
        r"^{OWNER}(?P<asset>.+?)\s+(?P<amount>{RANGE}|None)\s+(?P<action>[A-Za-z][A-Za-z ,/()-]*?)(?:\s+(?:{RANGE}|{EXACT}|None).*)?$"
    );
    let value_only = format!(r"^{OWNER}(?P<asset>.+?)\s+(?P<amount>{RANGE})\s*$");
    RowSpec {
        region_start: vec![super::compile(r"(?i)^\s*SCHEDULE\s+A\b")],
        region_end: vec![
            super::compile(r"(?i)^\s*SCHEDULE\s+[B-Z]\b"),
            super::compile(r"(?i)^\s*(?:CERTIFICATION|I\s+CERTIFY)"),
        ],
        skip: row_layout(&[
            r"(?i)^\s*Asset\s+Owner\b",
            r"(?i)^\s*(?:Description|Comments|Location)\s*:",
        ]),
        rules: vec![RowRule::new(&with_income), RowRule::new(&value_only)],
        cells: vec![RowCell::Asset, RowCell::Amount, RowCell::Action],
    }
}

fn annual_disclosure() -> TemplateSpec {
    TemplateSpec::new(
        TemplateType::AnnualDisclosure,
        "Annual Financial Disclosure Report",
        &[
            r"(?i)FINANCIAL\s+DISCLOSURE\s+REPORT",
            r"(?i)Filing\s+Type:\s*Annual",
            r"(?i)SCHEDULE\s+A\b",
        ],
        vec![
            filer_name(),
            filer_status().required(),
            state_district(),
            filing_id(),
            PatternRule::capture(
                "filing_type",
                ValueType::Enum,
                &[r"(?im)^\s*Filing\s+Type:\s*(\S.*?)\s*$"],
            )
            .options(&["Annual Report", "Amendment Report", "New Filer Report"])
            .required(),
            filing_year(),
            date_field("filing_date", &[r"Filing\s+Date", r"Date\s+Filed"]),
            signature_date(),
        ],
        Some(asset_schedule()),
        vec![BusinessRule::DateOrder {
            earlier: DateRef::Field("signature_date"),
            later: DateRef::Field("filing_date"),
        }],
    )
}

fn candidate_disclosure() -> TemplateSpec {
    TemplateSpec::new(
        TemplateType::CandidateDisclosure,
        "Candidate Financial Disclosure Report",
        &[
            r"(?i)FINANCIAL\s+DISCLOSURE\s+REPORT",
            r"(?i)Filing\s+Type:\s*Candidate",
            r"(?i)Candidate\s+Report",
            r"(?i)Date\s+of\s+Election",
        ],
        vec![
            filer_name(),
            filer_status(),
            state_district().required(),
            filing_id(),
            PatternRule::capture(
                "filing_type",
                ValueType::Enum,
                &[r"(?im)^\s*Filing\s+Type:\s*(\S.*?)\s*$"],
            )
            .options(&["Candidate Report", "Amendment Report"])
            .required(),
            filing_year(),
            date_field("election_date", &[r"Date\s+of\s+Election", r"Election\s+Date"]),
            signature_date(),
        ],
        Some(asset_schedule()),
        Vec::new(),
    )
}

fn extension_request() -> TemplateSpec {
    TemplateSpec::new(
        TemplateType::ExtensionRequest,
        "Extension Request",
        &[
            r"(?i)EXTENSION\s+REQUEST",
            r"(?i)REQUEST\s+FOR\s+(?:AN\s+)?EXTENSION",
            r"(?i)\b\d{2}\s+days?\s+extension\b|Extension\s+Requested",
        ],
        vec![
            filer_name(),
            filer_status(),
            PatternRule::checkbox_group(
                "report_type",
                &[
                    (r"(?i)Annual\s+Report", "Annual Report"),
                    (r"(?i)Candidate\s+Report", "Candidate Report"),
                    (r"(?i)Termination\s+Report", "Termination Report"),
                ],
            )
            .required(),
            date_field(
                "original_due_date",
                &[r"Original\s+Due\s+Date", r"Report\s+Due\s+Date"],
            )
            .required(),
            PatternRule::checkbox_group(
                "extension_days",
                &[
                    (r"(?i)\b30\s+days\b", "30"),
                    (r"(?i)\b60\s+days\b", "60"),
                    (r"(?i)\b90\s+days\b", "90"),
                ],
            )
            .required(),
            date_field("request_date", &[r"Date\s+of\s+Request", r"Request\s+Date"]),
            PatternRule::checkbox("approved", &[r"(?i)\bApproved\b"]),
        ],
        None,
        vec![BusinessRule::DateOrder {
            earlier: DateRef::Field("request_date"),
            later: DateRef::Field("original_due_date"),
        }],
    )
}

fn termination_notice() -> TemplateSpec {
    TemplateSpec::new(
        TemplateType::TerminationNotice,
        "Termination Report",
        &[
            r"(?i)TERMINATION\s+REPORT",
            r"(?i)Date\s+of\s+Termination",
            r"(?i)Termination\s+Date",
        ],
        vec![
            filer_name(),
            filer_status(),
            PatternRule::capture(
                "employing_office",
                ValueType::FreeText,
                &[r"(?im)^\s*Employing\s+Office:\s*(\S.*?)\s*$"],
            ),
            date_field(
                "termination_date",
                &[r"Date\s+of\s+Termination", r"Termination\s+Date"],
            )
            .required(),
            PatternRule::checkbox("final_report", &[r"(?i)\bFinal\s+report\b"]),
            signature_date(),
        ],
        None,
        vec![BusinessRule::DateOrder {
            earlier: DateRef::Field("termination_date"),
            later: DateRef::Field("signature_date"),
        }],
    )
}

fn gift_travel_report() -> TemplateSpec {
    let travel = format!(
        r"^(?P<transaction_date>{DATE})\s*(?:-|to|through)\s*{DATE}\s+(?P<asset>.+?)(?:\s+(?P<amount>{EXACT}))?\s*$"
    );
    let gift = format!(
        r"^{OWNER}(?P<transaction_date>{DATE})\s+(?P<asset>.+?)\s+(?P<amount>{EXACT})\s*$"
    );

    TemplateSpec::new(
        TemplateType::GiftTravelReport,
        "Gift and Travel Report",
        &[
            r"(?i)GIFTS?\s+(?:AND|&)\s+TRAVEL",
            r"(?i)Privately[- ]Funded\s+Travel|TRAVEL\s+PAYMENTS",
            r"(?i)SCHEDULE\s+G\b",
        ],
        vec![
            filer_name(),
            filer_status(),
            filing_year(),
            signature_date(),
        ],
        Some(RowSpec {
            region_start: vec![
                super::compile(r"(?i)^\s*SCHEDULE\s+G\b"),
                super::compile(r"(?i)^\s*SCHEDULE\s+H\b"),
                super::compile(r"(?i)^\s*(?:GIFTS|TRAVEL)\s*$"),
            ],
            region_end: vec![super::compile(
                r"(?i)^\s*(?:CERTIFICATION|I\s+CERTIFY|Signature\s+Date:|Digitally\s+Signed:)",
            )],
            skip: row_layout(&[r"(?i)^\s*(?:Source|Date\(?s\)?)\s+(?:Description|Date|Itinerary|Source)\b"]),
            rules: vec![
                RowRule::with_action(&travel, "travel"),
                RowRule::with_action(&gift, "gift"),
            ],
            cells: vec![RowCell::Asset, RowCell::TransactionDate, RowCell::Amount],
        }),
        vec![BusinessRule::DateOrder {
            earlier: DateRef::Row(RowCell::TransactionDate),
            later: DateRef::Field("signature_date"),
        }],
    )
}
