//! Single field control

use serde_json::Value;

use crate::util::is_missing_value;

/// Field-level validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// Value must be present (`null`, `""` and `[]` are missing)
    Required,
}

impl Validator {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Required => !is_missing_value(value),
        }
    }
}

/// Value holder for one live field
#[derive(Debug, Clone, PartialEq)]
pub struct FormControl {
    value: Value,
    validators: Vec<Validator>,
    enabled: bool,
    touched: bool,
}

impl FormControl {
    pub const fn new(value: Value, validators: Vec<Validator>) -> Self {
        Self {
            value,
            validators,
            enabled: true,
            touched: false,
        }
    }

    /// Control without a value or validators, as created for a newly added
    /// optional field.
    pub const fn empty() -> Self {
        Self::new(Value::Null, Vec::new())
    }

    pub const fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn is_required(&self) -> bool {
        self.validators.contains(&Validator::Required)
    }

    /// Disabled controls are never invalid.
    pub fn is_valid(&self) -> bool {
        !self.enabled
            || self
                .validators
                .iter()
                .all(|validator| validator.accepts(&self.value))
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub const fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn mark_touched(&mut self) {
        self.touched = true;
    }
}
