//! Data models for dynform

mod credential;
mod descriptor;
mod option;

pub use credential::{access_token_of, Credential};
pub use descriptor::{initial_values, validate_descriptors, ConfigDescriptor, ConfigValues, InputType};
pub use option::{OptionEntry, OptionsRequest, OptionsResponse};
