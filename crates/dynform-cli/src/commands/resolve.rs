use std::path::PathBuf;
use std::sync::Arc;

use dynform_core::auth::{CredentialStore, DismissingEditor, StaticCredentialStore};
use dynform_core::engine::FormServices;
use dynform_core::lookup::{HttpLookupService, LookupService, StaticLookupService};
use dynform_core::util::normalize_text_option;
use dynform_core::DynamicConfigForm;

use crate::commands::common::{
    build_report, format_report_lines, load_descriptors, parse_assignment,
};
use crate::error::CliError;
use crate::profiles::ProfileStore;

#[derive(Debug, Clone, Default)]
pub struct ResolveArgs {
    pub descriptors: PathBuf,
    pub assignments: Vec<String>,
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub options: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
    pub step: Option<String>,
    pub component: Option<String>,
    pub json: bool,
}

pub async fn run_resolve(args: ResolveArgs, profile_name: Option<&str>) -> Result<(), CliError> {
    let descriptors = load_descriptors(&args.descriptors)?;
    let assignments = args
        .assignments
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let store = ProfileStore::open_default()?;
    let profile_name = store.selected_name(profile_name);
    let profile = store.get(&profile_name).cloned().unwrap_or_default();

    let credentials = args
        .credentials
        .clone()
        .or_else(|| store.credentials_path(&profile));
    let services = build_services(&args, profile.lookup_base_url(), credentials)?;
    let step_name = normalize_text_option(args.step.clone())
        .or_else(|| profile.step_name())
        .unwrap_or_default();
    let component_name = normalize_text_option(args.component.clone())
        .or_else(|| profile.component_name())
        .unwrap_or_default();
    tracing::debug!(
        profile = %profile_name,
        step = %step_name,
        component = %component_name,
        "Resolving configuration form"
    );

    let mut form = DynamicConfigForm::new(step_name, component_name, services);
    form.load(descriptors)?;
    for key in &args.add {
        form.add_optional(key)?;
    }
    for key in &args.remove {
        if !form.remove_optional(key)? {
            tracing::warn!("Field '{key}' is not a selected optional field");
        }
    }
    for (key, value) in assignments {
        form.set_value(&key, value)?;
    }
    form.settle().await;

    let report = build_report(&form);
    form.dispose();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }

    Ok(())
}

/// `--options` wins over the profile's lookup endpoint.
pub fn build_services(
    args: &ResolveArgs,
    lookup_base_url: Option<String>,
    credentials: Option<PathBuf>,
) -> Result<FormServices, CliError> {
    let lookup: Arc<dyn LookupService> = if let Some(path) = &args.options {
        Arc::new(StaticLookupService::from_path(path)?)
    } else if let Some(base_url) = lookup_base_url {
        Arc::new(HttpLookupService::new(base_url)?)
    } else {
        return Err(CliError::LookupNotConfigured);
    };

    let credentials: Arc<dyn CredentialStore> = match credentials {
        Some(path) => Arc::new(StaticCredentialStore::from_path(&path)?),
        None => Arc::new(StaticCredentialStore::default()),
    };

    Ok(FormServices {
        lookup,
        credentials,
        editor: Arc::new(DismissingEditor),
    })
}
