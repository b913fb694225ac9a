use std::path::PathBuf;

use dynform_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::error::CliError;
use crate::profiles::{Profile, ProfileStore};

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            lookup_url,
            step_name,
            component_name,
            credentials_path,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            lookup_url,
            step_name,
            component_name,
            credentials_path,
            no_activate,
        ),
        ConfigCommands::Show { profile, json } => {
            run_config_show(profile.as_deref().or(global_profile), json)
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    lookup_url: Option<String>,
    step_name: Option<String>,
    component_name: Option<String>,
    credentials_path: Option<PathBuf>,
    no_activate: bool,
) -> Result<(), CliError> {
    let lookup_url = lookup_url.map(normalize_lookup_url).transpose()?;

    let mut store = ProfileStore::open_default()?;
    let profile_name = store.selected_name(profile_name);
    let profile = store.entry(&profile_name);
    if let Some(value) = lookup_url {
        profile.lookup_base_url = Some(value);
    }
    if let Some(value) = normalize_text_option(step_name) {
        profile.step_name = Some(value);
    }
    if let Some(value) = normalize_text_option(component_name) {
        profile.component_name = Some(value);
    }
    if let Some(value) = credentials_path {
        profile.credentials_path = Some(value);
    }
    let has_lookup = profile.lookup_base_url().is_some();

    if !no_activate {
        store.activate(&profile_name);
    }
    store.save()?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        store.path().display()
    );

    if !has_lookup {
        println!(
            "Profile '{profile_name}' has no lookup_url; pass --options <PATH> to `dynform resolve`."
        );
    }

    Ok(())
}

pub fn run_config_show(profile_name: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let store = ProfileStore::open_default()?;
    let profile_name = store.selected_name(profile_name);
    let profile = store
        .get(&profile_name)
        .ok_or_else(|| CliError::Config(format!("Profile '{profile_name}' does not exist")))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }

    let active = if store.is_active(&profile_name) {
        " (active)"
    } else {
        ""
    };
    println!("Profile '{profile_name}'{active}");
    for line in format_profile_lines(profile, store.credentials_path(profile)) {
        println!("{line}");
    }
    Ok(())
}

/// `credentials` is the resolved credentials file of the profile.
pub fn format_profile_lines(profile: &Profile, credentials: Option<PathBuf>) -> Vec<String> {
    let show = |value: Option<String>| value.unwrap_or_else(|| "(unset)".to_string());
    vec![
        format!("  lookup_url: {}", show(profile.lookup_base_url())),
        format!("  step_name: {}", show(profile.step_name())),
        format!("  component_name: {}", show(profile.component_name())),
        format!(
            "  credentials: {}",
            show(credentials.map(|path| path.display().to_string()))
        ),
    ]
}

pub fn normalize_lookup_url(url: String) -> Result<String, CliError> {
    let normalized = normalize_text_option(Some(url))
        .ok_or_else(|| CliError::Config("lookup_url must not be empty".to_string()))?;
    if !is_http_url(&normalized) {
        return Err(CliError::Config(
            "lookup_url must include http:// or https://".to_string(),
        ));
    }
    Ok(normalized.trim_end_matches('/').to_string())
}
