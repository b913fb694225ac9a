//! Two-way binding contract of a form

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ConfigDescriptor, ConfigValues};

/// Callback receiving the full value mapping on every change
pub type ChangeListener = Box<dyn FnMut(&ConfigValues) + Send>;

/// Callback invoked when interaction begins
pub type TouchedListener = Box<dyn FnMut() + Send>;

/// Structured validity marker, serialized as `{"invalid": true}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub invalid: bool,
}

impl ValidationError {
    pub const INVALID: Self = Self { invalid: true };
}

/// Capability set of a value-holding, validatable control.
pub trait ConfigValueAccessor {
    /// Replace the whole field set and rebuild state.
    fn write_value(&mut self, descriptors: Vec<ConfigDescriptor>) -> Result<()>;

    fn register_on_change(&mut self, listener: ChangeListener);

    fn register_on_touched(&mut self, listener: TouchedListener);

    /// Toggle editability of every child control without altering values.
    fn set_enabled(&mut self, enabled: bool);

    /// `None` when valid, otherwise the invalid marker.
    fn validate(&self) -> Option<ValidationError>;
}
