use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dynform")]
#[command(about = "Build configuration forms and resolve their dropdowns from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for lookup configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show required, optional and selected fields of a descriptor file
    Inspect {
        /// JSON file holding the descriptor list
        descriptors: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build a form, apply edits and resolve every dropdown
    Resolve {
        /// JSON file holding the descriptor list
        descriptors: PathBuf,
        /// Set a field value; the value is parsed as JSON, falling back to text
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Show an optional field before applying values
        #[arg(long, value_name = "KEY")]
        add: Vec<String>,
        /// Hide a selected optional field
        #[arg(long, value_name = "KEY")]
        remove: Vec<String>,
        /// Answer lookups from a local options table instead of the endpoint
        #[arg(long, value_name = "PATH")]
        options: Option<PathBuf>,
        /// JSON file holding stored credentials
        #[arg(long, value_name = "PATH")]
        credentials: Option<PathBuf>,
        /// Step name sent with lookups
        #[arg(long, value_name = "NAME")]
        step: Option<String>,
        /// Component name sent with lookups
        #[arg(long, value_name = "NAME")]
        component: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Base URL of the component options endpoint
        #[arg(long, value_name = "URL")]
        lookup_url: Option<String>,
        /// Default step name
        #[arg(long, value_name = "NAME")]
        step_name: Option<String>,
        /// Default component name
        #[arg(long, value_name = "NAME")]
        component_name: Option<String>,
        /// Default credentials file
        #[arg(long, value_name = "PATH")]
        credentials_path: Option<PathBuf>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show a profile
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
