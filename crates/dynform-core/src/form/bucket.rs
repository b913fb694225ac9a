//! Partition of descriptors into required and optional fields

use crate::models::ConfigDescriptor;

/// Required / optional / selected-optional view of a descriptor set.
///
/// `selected_optional` is always a subset of `all_optional`, in the order the
/// fields were selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBucket {
    required: Vec<ConfigDescriptor>,
    all_optional: Vec<ConfigDescriptor>,
    selected_optional: Vec<ConfigDescriptor>,
}

impl FieldBucket {
    /// Partition descriptors, preserving input order.
    pub fn partition(descriptors: &[ConfigDescriptor]) -> Self {
        let (required, all_optional): (Vec<_>, Vec<_>) = descriptors
            .iter()
            .cloned()
            .partition(|descriptor| descriptor.required);
        let selected_optional = all_optional
            .iter()
            .filter(|descriptor| descriptor.has_value())
            .cloned()
            .collect();

        Self {
            required,
            all_optional,
            selected_optional,
        }
    }

    pub fn required(&self) -> &[ConfigDescriptor] {
        &self.required
    }

    pub fn all_optional(&self) -> &[ConfigDescriptor] {
        &self.all_optional
    }

    pub fn selected_optional(&self) -> &[ConfigDescriptor] {
        &self.selected_optional
    }

    /// Optional fields the user can still add, in descriptor order.
    pub fn unselected_optional(&self) -> Vec<&ConfigDescriptor> {
        self.all_optional
            .iter()
            .filter(|descriptor| !self.is_selected(&descriptor.key))
            .collect()
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected_optional
            .iter()
            .any(|descriptor| descriptor.key == key)
    }

    pub fn find_optional(&self, key: &str) -> Option<&ConfigDescriptor> {
        self.all_optional
            .iter()
            .find(|descriptor| descriptor.key == key)
    }

    pub(crate) fn select(&mut self, descriptor: ConfigDescriptor) {
        self.selected_optional.push(descriptor);
    }

    /// Drop a selected field by key. Returns `false` when it was not selected.
    pub(crate) fn deselect(&mut self, key: &str) -> bool {
        let Some(index) = self
            .selected_optional
            .iter()
            .position(|descriptor| descriptor.key == key)
        else {
            return false;
        };
        self.selected_optional.remove(index);
        true
    }
}
