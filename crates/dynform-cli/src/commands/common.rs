use std::collections::BTreeMap;
use std::path::Path;

use dynform_core::auth::same_credential;
use dynform_core::dropdown::DropdownState;
use dynform_core::form::FieldBucket;
use dynform_core::{ConfigDescriptor, ConfigValues, DynamicConfigForm, InputType, OptionEntry};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct FieldItem {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub required: bool,
    pub selected: bool,
}

#[derive(Debug, Serialize)]
pub struct DropdownReport {
    pub loading: bool,
    pub recovered: bool,
    pub options: Vec<OptionEntry>,
}

/// A stored OAuth2 credential and the fields currently holding it
#[derive(Debug, Serialize)]
pub struct CredentialReport {
    pub label: String,
    pub selected_in: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FormReport {
    pub values: ConfigValues,
    pub valid: bool,
    pub invalid_fields: Vec<String>,
    pub dropdowns: BTreeMap<String, DropdownReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialReport>,
}

pub fn load_descriptors(path: &Path) -> Result<Vec<ConfigDescriptor>, CliError> {
    let descriptors_error = |message: String| CliError::Descriptors {
        path: path.display().to_string(),
        message,
    };

    let raw = std::fs::read_to_string(path).map_err(|error| descriptors_error(error.to_string()))?;
    serde_json::from_str::<Vec<ConfigDescriptor>>(&raw)
        .map_err(|error| descriptors_error(error.to_string()))
}

/// Split `KEY=VALUE`. The value is parsed as JSON, falling back to plain text.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), CliError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidAssignment(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidAssignment(raw.to_string()));
    }

    let value = serde_json::from_str::<Value>(value.trim())
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn input_type_name(descriptor: &ConfigDescriptor) -> String {
    serde_json::to_value(descriptor.input_type)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn field_items(bucket: &FieldBucket) -> Vec<FieldItem> {
    bucket
        .required()
        .iter()
        .chain(bucket.all_optional())
        .map(|descriptor| FieldItem {
            key: descriptor.key.clone(),
            label: descriptor.label.clone(),
            input_type: input_type_name(descriptor),
            required: descriptor.required,
            selected: descriptor.required || bucket.is_selected(&descriptor.key),
        })
        .collect()
}

pub fn format_field_lines(bucket: &FieldBucket) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Required:".to_string());
    if bucket.required().is_empty() {
        lines.push("  (none)".to_string());
    }
    for descriptor in bucket.required() {
        lines.push(format_field_line(descriptor, ' '));
    }

    lines.push("Optional:".to_string());
    if bucket.all_optional().is_empty() {
        lines.push("  (none)".to_string());
    }
    for descriptor in bucket.all_optional() {
        let marker = if bucket.is_selected(&descriptor.key) {
            '+'
        } else {
            '-'
        };
        lines.push(format_field_line(descriptor, marker));
    }

    lines
}

fn format_field_line(descriptor: &ConfigDescriptor, marker: char) -> String {
    let label = if descriptor.label.is_empty() {
        String::new()
    } else {
        format!(" \"{}\"", descriptor.label)
    };
    format!(
        " {marker} {} [{}]{label}",
        descriptor.key,
        input_type_name(descriptor)
    )
}

pub fn build_report(form: &DynamicConfigForm) -> FormReport {
    let dropdowns = form
        .dropdown_fields()
        .map(|key| {
            let state = form.dropdown_state(key).unwrap_or_default();
            let report = DropdownReport {
                loading: state.is_loading(),
                recovered: matches!(state, DropdownState::Ready { recovered: true, .. }),
                options: state.options().to_vec(),
            };
            (key.to_string(), report)
        })
        .collect();

    let invalid_fields = form
        .invalid_fields()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    FormReport {
        values: form.snapshot(),
        valid: invalid_fields.is_empty(),
        invalid_fields,
        dropdowns,
        credentials: credential_reports(form),
    }
}

fn credential_reports(form: &DynamicConfigForm) -> Vec<CredentialReport> {
    let auth_fields = form
        .descriptors()
        .iter()
        .filter(|descriptor| descriptor.input_type == InputType::Oauth2)
        .filter_map(|descriptor| {
            form.value(&descriptor.key)
                .ok()
                .map(|value| (descriptor.key.as_str(), value))
        })
        .collect::<Vec<_>>();

    form.credential_options()
        .into_iter()
        .map(|option| CredentialReport {
            selected_in: auth_fields
                .iter()
                .filter(|(_, value)| same_credential(&option.value, value))
                .map(|(key, _)| (*key).to_string())
                .collect(),
            label: option.label,
        })
        .collect()
}

pub fn format_report_lines(report: &FormReport) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Values:".to_string());
    if report.values.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (key, value) in &report.values {
        lines.push(format!("  {key} = {value}"));
    }

    if !report.dropdowns.is_empty() {
        lines.push("Dropdowns:".to_string());
    }
    for (key, dropdown) in &report.dropdowns {
        if dropdown.loading {
            lines.push(format!("  {key}: loading"));
            continue;
        }
        let suffix = if dropdown.recovered {
            " (lookup failed)"
        } else {
            ""
        };
        lines.push(format!(
            "  {key}: {} option(s){suffix}",
            dropdown.options.len()
        ));
        for option in &dropdown.options {
            lines.push(format!("    {} = {}", option.label, option.value));
        }
    }

    if !report.credentials.is_empty() {
        lines.push("Credentials:".to_string());
    }
    for credential in &report.credentials {
        if credential.selected_in.is_empty() {
            lines.push(format!("  {}", credential.label));
        } else {
            lines.push(format!(
                "  {} (selected in {})",
                credential.label,
                credential.selected_in.join(", ")
            ));
        }
    }

    if report.valid {
        lines.push("Form is valid".to_string());
    } else {
        lines.push(format!(
            "Missing required values: {}",
            report.invalid_fields.join(", ")
        ));
    }

    lines
}
