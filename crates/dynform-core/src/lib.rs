//! dynform-core - Core library for dynform
//!
//! This crate contains the configuration-form engine: descriptor models, the
//! field model and form state, the change pipeline, dependent dropdown
//! resolution and the credential create/edit flows used by every dynform
//! front end.

pub mod auth;
pub mod dropdown;
pub mod engine;
pub mod error;
pub mod form;
pub mod lookup;
pub mod models;
pub mod pipeline;
pub mod util;

pub use engine::DynamicConfigForm;
pub use error::{Error, Result};
pub use models::{ConfigDescriptor, ConfigValues, Credential, InputType, OptionEntry};
