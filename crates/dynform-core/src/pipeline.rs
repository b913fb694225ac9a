//! Change pipeline: raw change notifications plus a deduplicated stream of
//! triggering mappings for dropdown resolution.

use std::fmt;

use crate::form::ChangeListener;
use crate::models::ConfigValues;

/// Forwards every emission to the change listener and lets only structurally
/// distinct mappings through.
#[derive(Default)]
pub struct ChangePipeline {
    last_distinct: Option<ConfigValues>,
    on_change: Option<ChangeListener>,
}

impl ChangePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The listener survives reseeding; only the dedup state is reset.
    pub fn set_listener(&mut self, listener: ChangeListener) {
        self.on_change = Some(listener);
    }

    /// Start a new sequence from the descriptor values. The seed always
    /// triggers and is not forwarded to the change listener.
    pub fn seed(&mut self, initial: ConfigValues) -> ConfigValues {
        self.last_distinct = Some(initial.clone());
        initial
    }

    /// Push a raw emission. Returns the mapping when it differs from the
    /// previous distinct one.
    pub fn emit(&mut self, mapping: ConfigValues) -> Option<ConfigValues> {
        if let Some(listener) = self.on_change.as_mut() {
            listener(&mapping);
        }

        if self.last_distinct.as_ref() == Some(&mapping) {
            tracing::debug!("Dropping duplicate value mapping");
            return None;
        }
        self.last_distinct = Some(mapping.clone());
        Some(mapping)
    }

    pub const fn last_distinct(&self) -> Option<&ConfigValues> {
        self.last_distinct.as_ref()
    }
}

impl fmt::Debug for ChangePipeline {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ChangePipeline")
            .field("last_distinct", &self.last_distinct)
            .field("has_listener", &self.on_change.is_some())
            .finish()
    }
}
