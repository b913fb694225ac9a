//! Dependent dropdown resolution.
//!
//! Every dropdown field owns a `watch` channel carrying its [`DropdownState`].
//! A refresh with a new triggering mapping issues one lookup per field and moves
//! the field to `Loading`; observers share that single request through their
//! receivers. Lookups are polled cooperatively from the owner's event loop via
//! [`DropdownResolver::next_resolution`], nothing is spawned.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::watch;

use crate::lookup::{LookupResult, LookupService};
use crate::models::{ConfigDescriptor, ConfigValues, OptionEntry, OptionsRequest, OptionsResponse};

/// Resolution state of one dropdown field
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DropdownState {
    /// No request issued yet
    #[default]
    Idle,
    /// Waiting for the lookup tagged with `generation`
    Loading { generation: u64 },
    /// Options of the latest settled request. `recovered` marks a failed
    /// lookup downgraded to an empty list.
    Ready {
        options: Vec<OptionEntry>,
        generation: u64,
        recovered: bool,
    },
}

impl DropdownState {
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn options(&self) -> &[OptionEntry] {
        match self {
            Self::Ready { options, .. } => options,
            Self::Idle | Self::Loading { .. } => &[],
        }
    }
}

/// Options applied to a field after a lookup settled
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub key: String,
    pub options: Vec<OptionEntry>,
    pub recovered: bool,
}

struct Settlement {
    key: String,
    generation: u64,
    outcome: LookupResult<OptionsResponse>,
}

struct FieldSlot {
    label: String,
    generation: u64,
    in_flight: Option<ConfigValues>,
    sender: watch::Sender<DropdownState>,
}

impl FieldSlot {
    fn new(label: String) -> Self {
        let (sender, _) = watch::channel(DropdownState::Idle);
        Self {
            label,
            generation: 0,
            in_flight: None,
            sender,
        }
    }
}

pub struct DropdownResolver {
    service: Arc<dyn LookupService>,
    step_name: String,
    component_name: String,
    fields: BTreeMap<String, FieldSlot>,
    next_generation: u64,
    in_flight: FuturesUnordered<BoxFuture<'static, Settlement>>,
}

impl DropdownResolver {
    pub fn new(
        service: Arc<dyn LookupService>,
        step_name: impl Into<String>,
        component_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            step_name: step_name.into(),
            component_name: component_name.into(),
            fields: BTreeMap::new(),
            next_generation: 0,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    /// Track exactly the dropdown descriptors of a new field set. Fields that
    /// stay dropdowns keep their channel, so existing observers stay attached.
    pub fn sync_fields(&mut self, descriptors: &[ConfigDescriptor]) {
        let dropdowns: BTreeMap<&str, &ConfigDescriptor> = descriptors
            .iter()
            .filter(|descriptor| descriptor.is_dropdown())
            .map(|descriptor| (descriptor.key.as_str(), descriptor))
            .collect();

        self.fields
            .retain(|key, _| dropdowns.contains_key(key.as_str()));
        for (key, descriptor) in dropdowns {
            self.fields
                .entry(key.to_string())
                .and_modify(|slot| slot.label.clone_from(&descriptor.label))
                .or_insert_with(|| FieldSlot::new(descriptor.label.clone()));
        }
    }

    /// Issue a lookup for every dropdown field with `mapping` as context.
    ///
    /// A field already waiting on the very same mapping keeps its request.
    pub fn refresh(&mut self, mapping: &ConfigValues) {
        for (key, slot) in &mut self.fields {
            if slot.in_flight.as_ref() == Some(mapping) {
                tracing::debug!(field = %key, "Lookup for this mapping already in flight");
                continue;
            }

            self.next_generation += 1;
            let generation = self.next_generation;
            slot.generation = generation;
            slot.in_flight = Some(mapping.clone());
            slot.sender.send_replace(DropdownState::Loading { generation });
            tracing::debug!(field = %key, generation, "Resolving dropdown options");

            let service = Arc::clone(&self.service);
            let request = OptionsRequest {
                config_name: key.clone(),
                step_name: self.step_name.clone(),
                configs: mapping.clone(),
            };
            let component_name = self.component_name.clone();
            let key = key.clone();
            self.in_flight.push(
                async move {
                    let outcome = service.fetch_options(request, &component_name).await;
                    Settlement {
                        key,
                        generation,
                        outcome,
                    }
                }
                .boxed(),
            );
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Wait for the next lookup that still matters and apply it.
    ///
    /// Settlements superseded by a newer request, or for fields no longer in
    /// the form, are discarded. Returns `None` once nothing is in flight.
    pub async fn next_resolution(&mut self) -> Option<Resolution> {
        while let Some(settlement) = self.in_flight.next().await {
            if let Some(resolution) = self.apply(settlement) {
                return Some(resolution);
            }
        }
        None
    }

    fn apply(&mut self, settlement: Settlement) -> Option<Resolution> {
        let Settlement {
            key,
            generation,
            outcome,
        } = settlement;
        let Some(slot) = self.fields.get_mut(&key) else {
            tracing::debug!(field = %key, "Dropping lookup for a field no longer in the form");
            return None;
        };
        if slot.generation != generation {
            tracing::debug!(
                field = %key,
                generation,
                current = slot.generation,
                "Dropping superseded lookup"
            );
            return None;
        }
        slot.in_flight = None;

        let (options, recovered) = match outcome {
            Ok(response) => (decode_options(&slot.label, response.options), false),
            Err(error) => {
                tracing::error!(field = %key, "Failed to resolve dropdown options: {}", error);
                (Vec::new(), true)
            }
        };

        slot.sender.send_replace(DropdownState::Ready {
            options: options.clone(),
            generation,
            recovered,
        });
        Some(Resolution {
            key,
            options,
            recovered,
        })
    }

    /// Observe a field's state. Every receiver shares the same lookups.
    pub fn subscribe(&self, key: &str) -> Option<watch::Receiver<DropdownState>> {
        self.fields.get(key).map(|slot| slot.sender.subscribe())
    }

    pub fn state(&self, key: &str) -> Option<DropdownState> {
        self.fields.get(key).map(|slot| slot.sender.borrow().clone())
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.fields
            .get(key)
            .is_some_and(|slot| slot.sender.borrow().is_loading())
    }

    pub fn options(&self, key: &str) -> Vec<OptionEntry> {
        self.fields
            .get(key)
            .map(|slot| slot.sender.borrow().options().to_vec())
            .unwrap_or_default()
    }

    /// Keys of tracked dropdown fields, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Drop every in-flight lookup and all field channels.
    pub fn clear(&mut self) {
        self.in_flight = FuturesUnordered::new();
        self.fields.clear();
    }
}

impl fmt::Debug for DropdownResolver {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DropdownResolver")
            .field("step_name", &self.step_name)
            .field("component_name", &self.component_name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

fn decode_options(label: &str, payload: Value) -> Vec<OptionEntry> {
    let entries = match payload {
        Value::Array(entries) => entries,
        other => {
            tracing::error!(
                "Config {} options are not returned in array form --> {}",
                label,
                other
            );
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<OptionEntry>(entry) {
            Ok(option) => Some(option),
            Err(error) => {
                tracing::warn!("Skipping malformed option of config {}: {}", label, error);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::lookup::{LookupError, StaticLookupService};
    use crate::models::InputType;

    type Gate = oneshot::Receiver<LookupResult<OptionsResponse>>;

    /// Answers each call through a gate keyed by its triggering mapping, so
    /// tests decide when and in which order lookups settle.
    #[derive(Default)]
    struct GatedLookup {
        gates: Mutex<Vec<(ConfigValues, Gate)>>,
        calls: AtomicUsize,
    }

    impl GatedLookup {
        fn gate(&self, configs: ConfigValues) -> oneshot::Sender<LookupResult<OptionsResponse>> {
            let (sender, receiver) = oneshot::channel();
            self.gates.lock().unwrap().push((configs, receiver));
            sender
        }
    }

    #[async_trait]
    impl LookupService for GatedLookup {
        async fn fetch_options(
            &self,
            request: OptionsRequest,
            _component_name: &str,
        ) -> LookupResult<OptionsResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = {
                let mut gates = self.gates.lock().unwrap();
                gates
                    .iter()
                    .position(|(configs, _)| *configs == request.configs)
                    .map(|index| gates.remove(index).1)
            };
            match gate {
                Some(receiver) => receiver
                    .await
                    .unwrap_or_else(|_| Err(LookupError::Api("gate closed".to_string()))),
                None => Err(LookupError::Api("no gate".to_string())),
            }
        }
    }

    fn dropdowns() -> Vec<ConfigDescriptor> {
        vec![
            ConfigDescriptor::new("a", "A", InputType::ShortText).required(),
            ConfigDescriptor::new("b", "B", InputType::Dropdown),
        ]
    }

    fn mapping(value: Value) -> ConfigValues {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn entries(value: Value) -> Vec<OptionEntry> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn loading_flag_is_set_on_trigger_and_cleared_on_settle() {
        let service = StaticLookupService::new()
            .with_options("b", &entries(json!([{"label": "X", "value": 1}])));
        let mut resolver = DropdownResolver::new(Arc::new(service), "step", "app");
        resolver.sync_fields(&dropdowns());
        assert_eq!(resolver.state("b"), Some(DropdownState::Idle));
        assert_eq!(resolver.state("a"), None);

        resolver.refresh(&mapping(json!({})));
        assert!(resolver.is_loading("b"));

        let resolution = resolver.next_resolution().await.unwrap();
        assert_eq!(resolution.key, "b");
        assert!(!resolution.recovered);
        assert!(!resolver.is_loading("b"));
        assert_eq!(resolver.options("b"), entries(json!([{"label": "X", "value": 1}])));
        assert!(resolver.next_resolution().await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_lookup_recovers_to_empty_options() {
        let mut resolver =
            DropdownResolver::new(Arc::new(StaticLookupService::new()), "step", "app");
        resolver.sync_fields(&dropdowns());
        resolver.refresh(&mapping(json!({"a": "x"})));

        let resolution = resolver.next_resolution().await.unwrap();
        assert!(resolution.recovered);
        assert!(resolution.options.is_empty());
        assert!(matches!(
            resolver.state("b"),
            Some(DropdownState::Ready { recovered: true, ref options, .. }) if options.is_empty()
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn non_list_payload_settles_as_empty_success() {
        let service = StaticLookupService::new().with_payload("b", json!({"oops": true}));
        let mut resolver = DropdownResolver::new(Arc::new(service), "step", "app");
        resolver.sync_fields(&dropdowns());
        resolver.refresh(&mapping(json!({})));

        let resolution = resolver.next_resolution().await.unwrap();
        assert!(!resolution.recovered);
        assert!(resolution.options.is_empty());
        assert!(!resolver.is_loading("b"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_entries_are_skipped() {
        let service = StaticLookupService::new()
            .with_payload("b", json!([{"label": "X", "value": 1}, {"nope": 2}]));
        let mut resolver = DropdownResolver::new(Arc::new(service), "step", "app");
        resolver.sync_fields(&dropdowns());
        resolver.refresh(&mapping(json!({})));

        let resolution = resolver.next_resolution().await.unwrap();
        assert_eq!(resolution.options, entries(json!([{"label": "X", "value": 1}])));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn same_mapping_in_flight_is_not_requested_twice() {
        let lookup = Arc::new(GatedLookup::default());
        let gate = lookup.gate(mapping(json!({"a": 1})));
        let mut resolver = DropdownResolver::new(lookup.clone(), "step", "app");
        resolver.sync_fields(&dropdowns());

        resolver.refresh(&mapping(json!({"a": 1})));
        resolver.refresh(&mapping(json!({"a": 1})));
        gate.send(Ok(OptionsResponse::from_entries(&[]))).unwrap();

        assert!(resolver.next_resolution().await.is_some());
        assert!(resolver.next_resolution().await.is_none());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn superseded_lookup_is_ignored() {
        let lookup = Arc::new(GatedLookup::default());
        let first = lookup.gate(mapping(json!({"a": 1})));
        let second = lookup.gate(mapping(json!({"a": 2})));
        let mut resolver = DropdownResolver::new(lookup.clone(), "step", "app");
        resolver.sync_fields(&dropdowns());
        let mut observer = resolver.subscribe("b").unwrap();

        resolver.refresh(&mapping(json!({"a": 1})));
        resolver.refresh(&mapping(json!({"a": 2})));

        second
            .send(Ok(OptionsResponse::from_entries(&entries(
                json!([{"label": "New", "value": "new"}]),
            ))))
            .unwrap();
        first
            .send(Ok(OptionsResponse::from_entries(&entries(
                json!([{"label": "Old", "value": "old"}]),
            ))))
            .unwrap();

        let resolution = resolver.next_resolution().await.unwrap();
        assert_eq!(resolution.options[0].label, "New");
        assert!(resolver.next_resolution().await.is_none());

        assert!(observer.has_changed().unwrap());
        assert_eq!(observer.borrow_and_update().options()[0].label, "New");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn removed_field_drops_its_lookup_and_channel() {
        let lookup = Arc::new(GatedLookup::default());
        let gate = lookup.gate(mapping(json!({})));
        let mut resolver = DropdownResolver::new(lookup.clone(), "step", "app");
        resolver.sync_fields(&dropdowns());
        let observer = resolver.subscribe("b").unwrap();
        resolver.refresh(&mapping(json!({})));

        resolver.sync_fields(&dropdowns()[..1]);
        gate.send(Ok(OptionsResponse::from_entries(&[]))).unwrap();

        assert!(resolver.next_resolution().await.is_none());
        assert!(resolver.subscribe("b").is_none());
        assert!(observer.has_changed().is_err());
    }
}
