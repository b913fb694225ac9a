//! Key → control mapping mirroring the field model

use std::collections::BTreeMap;

use serde_json::Value;

use super::{FieldBucket, FormControl, ValidationError, Validator};
use crate::error::{Error, Result};
use crate::models::{ConfigDescriptor, ConfigValues};

/// Live controls of one form instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    controls: BTreeMap<String, FormControl>,
    bucket: FieldBucket,
    enabled: bool,
}

impl FormState {
    /// Build controls for every required descriptor and every optional
    /// descriptor that already carries a value. Required controls get the
    /// presence validator; optional ones get none.
    pub fn build(descriptors: &[ConfigDescriptor]) -> Self {
        let bucket = FieldBucket::partition(descriptors);
        let controls = bucket
            .required()
            .iter()
            .chain(bucket.selected_optional())
            .map(|descriptor| {
                let validators = if descriptor.required {
                    vec![Validator::Required]
                } else {
                    Vec::new()
                };
                let value = descriptor.value.clone().unwrap_or(Value::Null);
                (descriptor.key.clone(), FormControl::new(value, validators))
            })
            .collect();

        let mut state = Self {
            controls,
            bucket,
            enabled: true,
        };
        state.mark_all_as_touched();
        state
    }

    pub const fn bucket(&self) -> &FieldBucket {
        &self.bucket
    }

    pub fn control(&self, key: &str) -> Option<&FormControl> {
        self.controls.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.controls.contains_key(key)
    }

    /// Keys of live controls, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.controls.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Add an empty control for an optional field that is not shown yet.
    pub fn add_optional(&mut self, descriptor: &ConfigDescriptor) -> Result<()> {
        if descriptor.required || self.bucket.find_optional(&descriptor.key).is_none() {
            return Err(Error::NotOptional(descriptor.key.clone()));
        }
        if self.bucket.is_selected(&descriptor.key) || self.contains(&descriptor.key) {
            return Err(Error::AlreadySelected(descriptor.key.clone()));
        }

        let mut control = FormControl::empty();
        control.set_enabled(self.enabled);
        self.controls.insert(descriptor.key.clone(), control);
        self.bucket.select(descriptor.clone());
        Ok(())
    }

    /// Remove the control of a selected optional field.
    ///
    /// Returns `false` without touching anything when the key is not a
    /// selected optional field.
    pub fn remove_optional(&mut self, key: &str) -> bool {
        if !self.bucket.deselect(key) {
            return false;
        }
        self.controls.remove(key);
        true
    }

    pub fn value(&self, key: &str) -> Result<&Value> {
        self.controls
            .get(key)
            .map(FormControl::value)
            .ok_or_else(|| Error::UnknownField(key.to_string()))
    }

    pub fn set_value(&mut self, key: &str, value: Value) -> Result<()> {
        let control = self
            .controls
            .get_mut(key)
            .ok_or_else(|| Error::UnknownField(key.to_string()))?;
        control.set_value(value);
        Ok(())
    }

    /// Current key → value mapping of every live control.
    pub fn snapshot(&self) -> ConfigValues {
        self.controls
            .iter()
            .map(|(key, control)| (key.clone(), control.value().clone()))
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.controls.values().all(FormControl::is_valid)
    }

    /// `None` when every control passes; a disabled form is never invalid.
    pub fn validate(&self) -> Option<ValidationError> {
        if self.is_valid() {
            None
        } else {
            Some(ValidationError::INVALID)
        }
    }

    /// Keys of controls failing their validators.
    pub fn invalid_fields(&self) -> Vec<&str> {
        self.controls
            .iter()
            .filter(|(_, control)| !control.is_valid())
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle every child control; values are kept.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        for control in self.controls.values_mut() {
            control.set_enabled(enabled);
        }
    }

    pub fn mark_all_as_touched(&mut self) {
        for control in self.controls.values_mut() {
            control.mark_touched();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::models::InputType;

    fn scenario() -> Vec<ConfigDescriptor> {
        vec![
            ConfigDescriptor::new("a", "A", InputType::ShortText).required(),
            ConfigDescriptor::new("b", "B", InputType::Dropdown),
        ]
    }

    #[test]
    fn required_fields_get_presence_validator_and_optional_never_do() {
        let descriptors = vec![
            ConfigDescriptor::new("a", "A", InputType::ShortText).required(),
            ConfigDescriptor::new("b", "B", InputType::Number).with_value(json!(1)),
            ConfigDescriptor::new("c", "C", InputType::Checkbox)
                .required()
                .with_value(json!(true)),
        ];
        let state = FormState::build(&descriptors);

        assert!(state.control("a").unwrap().is_required());
        assert!(state.control("c").unwrap().is_required());
        assert!(state.control("b").unwrap().validators().is_empty());
    }

    #[test]
    fn add_and_remove_optional_field() {
        let descriptors = scenario();
        let mut state = FormState::build(&descriptors);
        assert_eq!(state.keys().collect::<Vec<_>>(), vec!["a"]);

        state.add_optional(&descriptors[1]).unwrap();
        assert_eq!(state.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(state.value("b").unwrap(), &Value::Null);
        assert!(state.bucket().is_selected("b"));

        assert!(state.remove_optional("b"));
        assert_eq!(state.keys().collect::<Vec<_>>(), vec!["a"]);
        assert!(!state.remove_optional("b"));
    }

    #[test]
    fn add_optional_rejects_required_and_already_selected() {
        let descriptors = scenario();
        let mut state = FormState::build(&descriptors);

        assert!(matches!(
            state.add_optional(&descriptors[0]),
            Err(Error::NotOptional(key)) if key == "a"
        ));
        state.add_optional(&descriptors[1]).unwrap();
        assert!(matches!(
            state.add_optional(&descriptors[1]),
            Err(Error::AlreadySelected(key)) if key == "b"
        ));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn remove_required_field_is_noop() {
        let mut state = FormState::build(&scenario());
        assert!(!state.remove_optional("a"));
        assert!(state.contains("a"));
    }

    #[test]
    fn validity_tracks_required_values() {
        let mut state = FormState::build(&scenario());
        assert_eq!(state.validate(), Some(ValidationError::INVALID));
        assert_eq!(state.invalid_fields(), vec!["a"]);

        state.set_value("a", json!("filled")).unwrap();
        assert_eq!(state.validate(), None);
        assert!(state.invalid_fields().is_empty());
    }

    #[test]
    fn disabled_form_is_not_invalid_and_keeps_values() {
        let descriptors = vec![
            ConfigDescriptor::new("a", "A", InputType::ShortText).required(),
            ConfigDescriptor::new("b", "B", InputType::ShortText).with_value(json!("kept")),
        ];
        let mut state = FormState::build(&descriptors);
        let before = state.snapshot();

        state.set_enabled(false);
        assert_eq!(state.validate(), None);
        assert_eq!(state.snapshot(), before);
        assert!(!state.control("b").unwrap().is_enabled());

        state.set_enabled(true);
        assert_eq!(state.validate(), Some(ValidationError::INVALID));
    }

    #[test]
    fn snapshot_and_touched_state_after_build() {
        let descriptors = vec![
            ConfigDescriptor::new("a", "A", InputType::ShortText)
                .required()
                .with_value(json!("x")),
            ConfigDescriptor::new("b", "B", InputType::ShortText),
        ];
        let state = FormState::build(&descriptors);
        assert_eq!(Value::Object(state.snapshot()), json!({"a": "x"}));
        assert!(state.control("a").unwrap().is_touched());
    }

    #[test]
    fn unknown_field_access_is_an_error() {
        let mut state = FormState::build(&scenario());
        assert!(matches!(state.value("zzz"), Err(Error::UnknownField(_))));
        assert!(matches!(
            state.set_value("b", json!(1)),
            Err(Error::UnknownField(key)) if key == "b"
        ));
    }
}
