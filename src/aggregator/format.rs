//! Clinical summary rendering
//!
//! Pure formatting of an aggregation result into the report string returned
//! to the agent runtime. Given identical inputs the output is byte-identical;
//! the only time-dependent text is the optional elapsed annotation appended
//! to the title by [`render_summary_with_elapsed`].

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::{FetchOutcome, SECTION_SPECS};

/// Fixed first line of every summary
pub const SUMMARY_TITLE: &str = "📘 CLINICAL SUMMARY";

/// Marker rendered for sections with no records (empty or failed fetch)
pub const NONE_FOUND: &str = "None found.";

/// Marker rendered for sections abandoned at the aggregation deadline
pub const TIMED_OUT: &str = "⏳ Timed out.";

const UNKNOWN: &str = "Unknown";

/// Read `record[field].text`, falling back when any link in the chain is
/// absent or not a string. Total over arbitrary JSON.
pub fn field_text<'a>(record: &'a Value, field: &str, fallback: &'a str) -> &'a str {
    record
        .get(field)
        .and_then(|f| f.get("text"))
        .and_then(Value::as_str)
        .unwrap_or(fallback)
}

fn format_patient(patient: &Value) -> String {
    let id = patient
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("N/A");

    let name = patient
        .get("name")
        .and_then(Value::as_array)
        .and_then(|names| names.first())
        .cloned()
        .unwrap_or(Value::Null);

    let mut parts: Vec<String> = name
        .get("given")
        .and_then(Value::as_array)
        .map(|given| {
            given
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if let Some(family) = name.get("family").and_then(Value::as_str) {
        parts.push(family.to_string());
    }
    let full_name = parts.join(" ").trim().to_string();

    let gender = patient
        .get("gender")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN);
    let birth_date = patient
        .get("birthDate")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN);

    format!(
        "Patient ID: {}\nName: {}\nGender: {}\nBirth Date: {}",
        id,
        if full_name.is_empty() { "N/A" } else { &full_name },
        gender,
        birth_date
    )
}

fn format_section(label: &str, field: &str, outcome: &FetchOutcome) -> String {
    let body = match outcome {
        FetchOutcome::Succeeded(records) if !records.is_empty() => records
            .iter()
            .enumerate()
            .map(|(i, record)| format!("{} {}: {}", label, i + 1, field_text(record, field, UNKNOWN)))
            .collect::<Vec<_>>()
            .join("\n"),
        FetchOutcome::Succeeded(_) | FetchOutcome::Failed(_) => NONE_FOUND.to_string(),
        FetchOutcome::TimedOut => TIMED_OUT.to_string(),
    };

    format!("\n\n🔹 {label} 🔹\n{body}")
}

/// Render the full report: title, patient header, then one section per
/// resource type in the fixed section order regardless of completion order.
/// A resource type missing from `outcomes` renders as timed out.
pub fn render_summary(patient: &Value, outcomes: &HashMap<&'static str, FetchOutcome>) -> String {
    render_summary_with_elapsed(patient, outcomes, None)
}

/// Same as [`render_summary`], with an elapsed-time annotation on the title.
pub fn render_summary_with_elapsed(
    patient: &Value,
    outcomes: &HashMap<&'static str, FetchOutcome>,
    elapsed: Option<Duration>,
) -> String {
    let title = match elapsed {
        Some(elapsed) => format!("{SUMMARY_TITLE} ({:.1}s)", elapsed.as_secs_f64()),
        None => SUMMARY_TITLE.to_string(),
    };

    let mut output = vec![title, format_patient(patient)];
    for spec in &SECTION_SPECS {
        output.push(match outcomes.get(spec.resource_type) {
            Some(outcome) => format_section(spec.label, spec.field, outcome),
            None => format_section(spec.label, spec.field, &FetchOutcome::TimedOut),
        });
    }

    output.join("\n")
}
