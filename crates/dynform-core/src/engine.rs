//! The dynamic configuration form.
//!
//! Owns the form state for one descriptor set and wires it to the change
//! pipeline, the dropdown resolver and the authentication bridge. All work
//! runs on the caller's task: edits are synchronous, lookups settle when the
//! owner drives [`DynamicConfigForm::next_settlement`] or
//! [`DynamicConfigForm::settle`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::auth::{AuthOutcome, AuthenticationBridge, CredentialEditor, CredentialStore};
use crate::dropdown::{DropdownResolver, DropdownState, Resolution};
use crate::error::{Error, Result};
use crate::form::{
    ChangeListener, ConfigValueAccessor, FieldBucket, FormState, TouchedListener, ValidationError,
};
use crate::lookup::LookupService;
use crate::models::{
    initial_values, validate_descriptors, ConfigDescriptor, ConfigValues, InputType, OptionEntry,
};
use crate::pipeline::ChangePipeline;
use crate::util::option_value_matches;

/// External collaborators of a form
#[derive(Clone)]
pub struct FormServices {
    pub lookup: Arc<dyn LookupService>,
    pub credentials: Arc<dyn CredentialStore>,
    pub editor: Arc<dyn CredentialEditor>,
}

pub struct DynamicConfigForm {
    descriptors: Vec<ConfigDescriptor>,
    state: FormState,
    pipeline: ChangePipeline,
    resolver: DropdownResolver,
    auth: AuthenticationBridge,
    on_touched: Option<TouchedListener>,
    touched_notified: bool,
    enabled: bool,
}

impl DynamicConfigForm {
    pub fn new(
        step_name: impl Into<String>,
        component_name: impl Into<String>,
        services: FormServices,
    ) -> Self {
        Self {
            descriptors: Vec::new(),
            state: FormState::default(),
            pipeline: ChangePipeline::new(),
            resolver: DropdownResolver::new(services.lookup, step_name, component_name),
            auth: AuthenticationBridge::new(services.credentials, services.editor),
            on_touched: None,
            touched_notified: false,
            enabled: true,
        }
    }

    /// Replace the field set and rebuild everything from it.
    ///
    /// Dropdowns resolve once against the descriptor values even before any
    /// edit. The enabled flag carries over to the rebuilt controls.
    pub fn load(&mut self, descriptors: Vec<ConfigDescriptor>) -> Result<()> {
        validate_descriptors(&descriptors)?;

        let mut state = FormState::build(&descriptors);
        state.set_enabled(self.enabled);
        self.state = state;
        self.resolver.sync_fields(&descriptors);
        let initial = initial_values(&descriptors);
        self.descriptors = descriptors;
        self.touched_notified = false;

        tracing::debug!(
            fields = self.descriptors.len(),
            controls = self.state.len(),
            "Built configuration form"
        );
        let trigger = self.pipeline.seed(initial);
        self.resolver.refresh(&trigger);
        Ok(())
    }

    pub fn descriptors(&self) -> &[ConfigDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, key: &str) -> Option<&ConfigDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.key == key)
    }

    pub const fn state(&self) -> &FormState {
        &self.state
    }

    pub const fn bucket(&self) -> &FieldBucket {
        self.state.bucket()
    }

    pub fn value(&self, key: &str) -> Result<&Value> {
        self.state.value(key)
    }

    /// Current key → value mapping of the live controls.
    pub fn snapshot(&self) -> ConfigValues {
        self.state.snapshot()
    }

    pub fn set_value(&mut self, key: &str, value: Value) -> Result<()> {
        self.ensure_enabled()?;
        self.state.set_value(key, value)?;
        self.notify_touched();
        self.emit_change();
        Ok(())
    }

    /// Show an optional field with an empty control.
    pub fn add_optional(&mut self, key: &str) -> Result<()> {
        self.ensure_enabled()?;
        let descriptor = self
            .descriptor(key)
            .cloned()
            .ok_or_else(|| Error::UnknownField(key.to_string()))?;
        self.state.add_optional(&descriptor)?;
        self.notify_touched();
        self.emit_change();
        Ok(())
    }

    /// Hide a selected optional field. Unknown or unselected keys are a no-op
    /// returning `false`.
    pub fn remove_optional(&mut self, key: &str) -> Result<bool> {
        self.ensure_enabled()?;
        if !self.state.remove_optional(key) {
            return Ok(false);
        }
        self.notify_touched();
        self.emit_change();
        Ok(true)
    }

    pub fn invalid_fields(&self) -> Vec<&str> {
        self.state.invalid_fields()
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Observe the option state of a dropdown field.
    pub fn subscribe_options(&self, key: &str) -> Option<watch::Receiver<DropdownState>> {
        self.resolver.subscribe(key)
    }

    pub fn dropdown_state(&self, key: &str) -> Option<DropdownState> {
        self.resolver.state(key)
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.resolver.is_loading(key)
    }

    pub fn options(&self, key: &str) -> Vec<OptionEntry> {
        self.resolver.options(key)
    }

    pub fn dropdown_fields(&self) -> impl Iterator<Item = &str> {
        self.resolver.fields()
    }

    pub fn has_pending_lookups(&self) -> bool {
        self.resolver.has_pending()
    }

    /// Wait for the next relevant lookup, apply it and return its field key.
    /// Returns `None` once nothing is in flight.
    pub async fn next_settlement(&mut self) -> Option<String> {
        let resolution = self.resolver.next_resolution().await?;
        if !resolution.recovered {
            self.reconcile(&resolution);
        }
        Some(resolution.key)
    }

    /// Drive lookups until none are in flight, including the ones triggered by
    /// clearing stale selections.
    pub async fn settle(&mut self) {
        while self.next_settlement().await.is_some() {}
    }

    /// Label of the credential most recently written back.
    pub fn updated_auth_label(&self) -> Option<&str> {
        self.auth.updated_label()
    }

    /// Stored OAuth2 credentials as dropdown entries.
    pub fn credential_options(&self) -> Vec<OptionEntry> {
        self.auth.credential_options()
    }

    /// Open the credential editor to create a credential for `field`.
    pub async fn create_credential(&mut self, field: &str) -> Result<AuthOutcome> {
        self.ensure_enabled()?;
        if !self.state.contains(field) {
            return Err(Error::UnknownField(field.to_string()));
        }

        let connector = self.connector_auth_config();
        let app_name = self.resolver.component_name().to_string();
        let outcome = self.auth.create(connector, &app_name).await;
        self.apply_auth_outcome(field, &outcome)?;
        Ok(outcome)
    }

    /// Open the credential editor on the credential selected in `field`.
    /// Nothing happens when no stored credential shares its access token.
    pub async fn edit_credential(&mut self, field: &str) -> Result<AuthOutcome> {
        self.ensure_enabled()?;
        let selected = self.state.value(field)?.clone();

        let connector = self.connector_auth_config();
        let app_name = self.resolver.component_name().to_string();
        let outcome = self.auth.edit(&selected, connector, &app_name).await;
        self.apply_auth_outcome(field, &outcome)?;
        Ok(outcome)
    }

    /// Drop in-flight lookups and dropdown channels.
    pub fn dispose(&mut self) {
        self.resolver.clear();
    }

    fn connector_auth_config(&self) -> Option<ConfigDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.input_type == InputType::Oauth2)
            .cloned()
    }

    fn apply_auth_outcome(&mut self, field: &str, outcome: &AuthOutcome) -> Result<()> {
        if let AuthOutcome::Updated { value, .. } = outcome {
            self.state.set_value(field, value.clone())?;
            self.notify_touched();
            self.emit_change();
        }
        Ok(())
    }

    /// Clear a selection that is not among freshly resolved options.
    fn reconcile(&mut self, resolution: &Resolution) {
        let Ok(current) = self.state.value(&resolution.key) else {
            return;
        };
        if current.is_null()
            || resolution
                .options
                .iter()
                .any(|option| option_value_matches(current, &option.value))
        {
            return;
        }

        tracing::debug!(field = %resolution.key, "Clearing selection missing from resolved options");
        if self.state.set_value(&resolution.key, Value::Null).is_ok() {
            self.emit_change();
        }
    }

    fn emit_change(&mut self) {
        if let Some(trigger) = self.pipeline.emit(self.state.snapshot()) {
            self.resolver.refresh(&trigger);
        }
    }

    fn notify_touched(&mut self) {
        if self.touched_notified {
            return;
        }
        self.touched_notified = true;
        if let Some(listener) = self.on_touched.as_mut() {
            listener();
        }
    }

    const fn ensure_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(Error::Disabled)
        }
    }
}

impl ConfigValueAccessor for DynamicConfigForm {
    fn write_value(&mut self, descriptors: Vec<ConfigDescriptor>) -> Result<()> {
        self.load(descriptors)
    }

    fn register_on_change(&mut self, listener: ChangeListener) {
        self.pipeline.set_listener(listener);
    }

    fn register_on_touched(&mut self, listener: TouchedListener) {
        self.on_touched = Some(listener);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.state.set_enabled(enabled);
    }

    fn validate(&self) -> Option<ValidationError> {
        self.state.validate()
    }
}

impl fmt::Debug for DynamicConfigForm {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DynamicConfigForm")
            .field("descriptors", &self.descriptors)
            .field("state", &self.state)
            .field("pipeline", &self.pipeline)
            .field("resolver", &self.resolver)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::auth::{CredentialEditorContext, DismissingEditor, StaticCredentialStore};
    use crate::lookup::{LookupResult, StaticLookupService};
    use crate::models::{Credential, OptionsRequest, OptionsResponse};

    /// Static lookup that records every request it serves.
    struct CountingLookup {
        inner: StaticLookupService,
        requests: Mutex<Vec<OptionsRequest>>,
    }

    impl CountingLookup {
        fn new(inner: StaticLookupService) -> Arc<Self> {
            Arc::new(Self {
                inner,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LookupService for CountingLookup {
        async fn fetch_options(
            &self,
            request: OptionsRequest,
            component_name: &str,
        ) -> LookupResult<OptionsResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.inner.fetch_options(request, component_name).await
        }
    }

    struct ScriptedEditor {
        reply: Option<Credential>,
        opened: AtomicUsize,
    }

    #[async_trait]
    impl CredentialEditor for ScriptedEditor {
        async fn open(&self, _context: CredentialEditorContext) -> Option<Credential> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn options_x() -> StaticLookupService {
        StaticLookupService::new().with_options("b", &[OptionEntry::new("X", json!(1))])
    }

    fn form_with(lookup: Arc<CountingLookup>) -> DynamicConfigForm {
        DynamicConfigForm::new(
            "step_1",
            "gmail",
            FormServices {
                lookup,
                credentials: Arc::new(StaticCredentialStore::default()),
                editor: Arc::new(DismissingEditor),
            },
        )
    }

    fn form_with_editor(
        credentials: Vec<Credential>,
        reply: Option<Credential>,
    ) -> (DynamicConfigForm, Arc<ScriptedEditor>) {
        let editor = Arc::new(ScriptedEditor {
            reply,
            opened: AtomicUsize::new(0),
        });
        let form = DynamicConfigForm::new(
            "step_1",
            "gmail",
            FormServices {
                lookup: Arc::new(StaticLookupService::new()),
                credentials: Arc::new(StaticCredentialStore::new(credentials)),
                editor: editor.clone(),
            },
        );
        (form, editor)
    }

    fn scenario() -> Vec<ConfigDescriptor> {
        vec![
            ConfigDescriptor::new("a", "A", InputType::ShortText).required(),
            ConfigDescriptor::new("b", "B", InputType::Dropdown),
        ]
    }

    fn auth_descriptors(value: Option<Value>) -> Vec<ConfigDescriptor> {
        let mut auth = ConfigDescriptor::new("auth", "Connection", InputType::Oauth2).required();
        auth.value = value;
        vec![auth, ConfigDescriptor::new("label", "Label", InputType::ShortText)]
    }

    #[tokio::test(flavor = "current_thread")]
    async fn add_and_remove_optional_dropdown() {
        let mut form = form_with(CountingLookup::new(options_x()));
        form.load(scenario()).unwrap();
        assert_eq!(form.state().keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(form.validate(), Some(ValidationError::INVALID));

        form.add_optional("b").unwrap();
        assert_eq!(form.state().keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(form.bucket().is_selected("b"));

        assert!(form.remove_optional("b").unwrap());
        assert_eq!(form.state().keys().collect::<Vec<_>>(), vec!["a"]);
        assert!(!form.remove_optional("b").unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dropdowns_resolve_once_at_load_with_descriptor_values() {
        let lookup = CountingLookup::new(options_x());
        let mut form = form_with(lookup.clone());
        let mut descriptors = scenario();
        descriptors[0].value = Some(json!("seed"));

        form.load(descriptors).unwrap();
        assert!(form.is_loading("b"));
        form.settle().await;

        assert!(!form.is_loading("b"));
        assert_eq!(form.options("b"), vec![OptionEntry::new("X", json!(1))]);
        let requests = lookup.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].config_name, "b");
        assert_eq!(requests[0].step_name, "step_1");
        assert_eq!(Value::Object(requests[0].configs.clone()), json!({"a": "seed"}));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn identical_mappings_resolve_once_but_notify_every_time() {
        let lookup = CountingLookup::new(options_x());
        let mut form = form_with(lookup.clone());
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        form.register_on_change(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        form.load(scenario()).unwrap();
        form.set_value("a", json!("x")).unwrap();
        form.set_value("a", json!("x")).unwrap();
        form.settle().await;

        assert_eq!(changes.load(Ordering::SeqCst), 2);
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stale_selection_is_cleared_after_resolution() {
        let lookup = CountingLookup::new(options_x());
        let mut form = form_with(lookup.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        form.register_on_change(Box::new(move |mapping| {
            sink.lock().unwrap().push(Value::Object(mapping.clone()));
        }));

        let mut descriptors = scenario();
        descriptors[1].value = Some(json!(2));
        form.load(descriptors).unwrap();
        assert_eq!(form.value("b").unwrap(), &json!(2));

        form.settle().await;
        assert_eq!(form.value("b").unwrap(), &Value::Null);
        assert_eq!(*seen.lock().unwrap(), vec![json!({"a": null, "b": null})]);
        // The cleared mapping is distinct, so dropdowns resolve once more.
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn matching_selection_is_kept() {
        let mut form = form_with(CountingLookup::new(options_x()));
        let mut descriptors = scenario();
        descriptors[1].value = Some(json!("1"));
        form.load(descriptors).unwrap();

        form.settle().await;
        assert_eq!(form.value("b").unwrap(), &json!("1"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn decimal_text_selection_matches_integer_option() {
        let mut form = form_with(CountingLookup::new(options_x()));
        let mut descriptors = scenario();
        descriptors[1].value = Some(json!("1.0"));
        form.load(descriptors).unwrap();

        form.settle().await;
        assert_eq!(form.value("b").unwrap(), &json!("1.0"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_lookup_keeps_selection_and_clears_loading() {
        let mut form = form_with(CountingLookup::new(StaticLookupService::new()));
        let mut descriptors = scenario();
        descriptors[1].value = Some(json!(2));
        form.load(descriptors).unwrap();

        assert_eq!(form.next_settlement().await.as_deref(), Some("b"));
        assert!(!form.is_loading("b"));
        assert!(form.options("b").is_empty());
        assert_eq!(form.value("b").unwrap(), &json!(2));
        assert!(!form.has_pending_lookups());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reloading_identical_descriptors_is_idempotent() {
        let lookup = CountingLookup::new(options_x());
        let mut form = form_with(lookup.clone());
        let mut descriptors = scenario();
        descriptors[0].value = Some(json!("kept"));

        form.write_value(descriptors.clone()).unwrap();
        let first_snapshot = form.snapshot();
        let first_validity = form.validate();
        form.write_value(descriptors).unwrap();
        form.settle().await;

        assert_eq!(form.snapshot(), first_snapshot);
        assert_eq!(form.validate(), first_validity);
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disabled_form_rejects_edits_and_keeps_values() {
        let mut form = form_with(CountingLookup::new(options_x()));
        form.load(scenario()).unwrap();
        form.set_value("a", json!("x")).unwrap();

        form.set_enabled(false);
        assert!(matches!(form.set_value("a", json!("y")), Err(Error::Disabled)));
        assert!(matches!(form.add_optional("b"), Err(Error::Disabled)));
        assert_eq!(form.value("a").unwrap(), &json!("x"));
        assert_eq!(form.validate(), None);

        form.load(scenario()).unwrap();
        assert!(!form.state().is_enabled());

        form.set_enabled(true);
        form.set_value("a", json!("y")).unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn touched_listener_fires_once_per_load() {
        let mut form = form_with(CountingLookup::new(options_x()));
        let touches = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&touches);
        form.register_on_touched(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        form.load(scenario()).unwrap();
        form.set_value("a", json!("x")).unwrap();
        form.add_optional("b").unwrap();
        assert_eq!(touches.load(Ordering::SeqCst), 1);

        form.load(scenario()).unwrap();
        form.set_value("a", json!("y")).unwrap();
        assert_eq!(touches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn load_rejects_duplicate_keys() {
        let mut form = form_with(CountingLookup::new(options_x()));
        let mut descriptors = scenario();
        descriptors.push(ConfigDescriptor::new("a", "Again", InputType::Number));
        assert!(matches!(
            form.load(descriptors),
            Err(Error::InvalidDescriptors(_))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn create_credential_writes_value_and_label() {
        let (mut form, editor) = form_with_editor(
            Vec::new(),
            Some(Credential::oauth2("cred1", json!({"access_token": "tok"}))),
        );
        form.load(auth_descriptors(None)).unwrap();

        let outcome = form.create_credential("auth").await.unwrap();
        assert!(matches!(outcome, AuthOutcome::Updated { .. }));
        assert_eq!(form.value("auth").unwrap(), &json!({"access_token": "tok"}));
        assert_eq!(form.updated_auth_label(), Some("cred1"));
        assert_eq!(editor.opened.load(Ordering::SeqCst), 1);
        assert_eq!(form.validate(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancelled_editor_leaves_field_untouched() {
        let (mut form, _) = form_with_editor(Vec::new(), None);
        form.load(auth_descriptors(Some(json!({"access_token": "old"}))))
            .unwrap();

        let outcome = form.create_credential("auth").await.unwrap();
        assert_eq!(outcome, AuthOutcome::Cancelled);
        assert_eq!(form.value("auth").unwrap(), &json!({"access_token": "old"}));
        assert_eq!(form.updated_auth_label(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn edit_without_matching_token_changes_nothing() {
        let (mut form, editor) = form_with_editor(
            vec![Credential::oauth2("other", json!({"access_token": "nope"}))],
            Some(Credential::oauth2("cred1", json!({"access_token": "new"}))),
        );
        form.load(auth_descriptors(Some(json!({"access_token": "tok"}))))
            .unwrap();
        let before = form.snapshot();

        let outcome = form.edit_credential("auth").await.unwrap();
        assert_eq!(outcome, AuthOutcome::NoMatch);
        assert_eq!(editor.opened.load(Ordering::SeqCst), 0);
        assert_eq!(form.snapshot(), before);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn edit_with_matching_token_writes_back() {
        let (mut form, editor) = form_with_editor(
            vec![Credential::oauth2("cred1", json!({"access_token": "tok"}))],
            Some(Credential::oauth2("cred1", json!({"access_token": "fresh"}))),
        );
        form.load(auth_descriptors(Some(json!({"access_token": "tok"}))))
            .unwrap();

        let outcome = form.edit_credential("auth").await.unwrap();
        assert!(matches!(outcome, AuthOutcome::Updated { ref label, .. } if label == "cred1"));
        assert_eq!(editor.opened.load(Ordering::SeqCst), 1);
        assert_eq!(form.value("auth").unwrap(), &json!({"access_token": "fresh"}));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn credential_flows_require_a_live_control() {
        let (mut form, editor) = form_with_editor(Vec::new(), None);
        form.load(auth_descriptors(None)).unwrap();

        assert!(matches!(
            form.create_credential("label").await,
            Err(Error::UnknownField(_))
        ));
        assert!(matches!(
            form.edit_credential("missing").await,
            Err(Error::UnknownField(_))
        ));
        assert_eq!(editor.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn observers_share_dropdown_state() {
        let lookup = CountingLookup::new(options_x());
        let mut form = form_with(lookup.clone());
        form.load(scenario()).unwrap();

        let first = form.subscribe_options("b").unwrap();
        let second = form.subscribe_options("b").unwrap();
        assert!(first.borrow().is_loading());
        form.settle().await;

        assert_eq!(first.borrow().options(), second.borrow().options());
        assert_eq!(lookup.calls(), 1);
        assert!(form.subscribe_options("a").is_none());
    }
}
