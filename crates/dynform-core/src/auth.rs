//! Credential create/edit flows for OAuth2 reference fields.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::models::{access_token_of, ConfigDescriptor, Credential, OptionEntry};

/// Read-only source of stored credentials, in display order.
pub trait CredentialStore: Send + Sync {
    fn list_credentials(&self) -> Vec<Credential>;
}

/// Credential create/edit dialog. Resolves to `None` when dismissed.
#[async_trait]
pub trait CredentialEditor: Send + Sync {
    async fn open(&self, context: CredentialEditorContext) -> Option<Credential>;
}

/// Credential being edited and its position in the store listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialToUpdate {
    pub config: Credential,
    pub index_in_list: usize,
}

/// Data handed to the credential editor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEditorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_to_update_with_index: Option<CredentialToUpdate>,
    /// First OAuth2 descriptor of the form
    pub connector_auth_config: Option<ConfigDescriptor>,
    pub app_name: String,
}

/// Result of a create or edit flow
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// An OAuth2 credential came back; its value belongs in the field
    Updated { label: String, value: Value },
    /// Dismissed, or a credential of another kind came back
    Cancelled,
    /// Edit found no credential sharing the field's access token
    NoMatch,
}

/// Same credential when both sides carry the same access token.
pub fn same_credential(option: &Value, current: &Value) -> bool {
    match (access_token_of(option), access_token_of(current)) {
        (Some(option), Some(current)) => option == current,
        _ => false,
    }
}

/// Fixed list of credentials, e.g. loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticCredentialStore {
    credentials: Vec<Credential>,
}

impl StaticCredentialStore {
    pub const fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    pub fn from_json_str(raw: &str) -> crate::Result<Self> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

impl CredentialStore for StaticCredentialStore {
    fn list_credentials(&self) -> Vec<Credential> {
        self.credentials.clone()
    }
}

/// Editor that is always dismissed; used where no dialog is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DismissingEditor;

#[async_trait]
impl CredentialEditor for DismissingEditor {
    async fn open(&self, _context: CredentialEditorContext) -> Option<Credential> {
        None
    }
}

/// Opens the credential editor and keeps the label of the last credential
/// written back.
pub struct AuthenticationBridge {
    store: Arc<dyn CredentialStore>,
    editor: Arc<dyn CredentialEditor>,
    updated_label: Option<String>,
}

impl AuthenticationBridge {
    pub fn new(store: Arc<dyn CredentialStore>, editor: Arc<dyn CredentialEditor>) -> Self {
        Self {
            store,
            editor,
            updated_label: None,
        }
    }

    pub fn updated_label(&self) -> Option<&str> {
        self.updated_label.as_deref()
    }

    /// OAuth2 credentials as dropdown entries, labelled by credential key.
    pub fn credential_options(&self) -> Vec<OptionEntry> {
        self.store
            .list_credentials()
            .into_iter()
            .filter(Credential::is_oauth2)
            .map(|credential| OptionEntry::new(credential.key, credential.value))
            .collect()
    }

    /// First stored OAuth2 credential sharing the selected access token.
    /// Duplicates resolve to the earliest index; the index counts OAuth2
    /// credentials only.
    pub fn find_credential(&self, selected: &Value) -> Option<CredentialToUpdate> {
        let token = access_token_of(selected)?;
        self.store
            .list_credentials()
            .into_iter()
            .filter(Credential::is_oauth2)
            .enumerate()
            .find(|(_, credential)| credential.access_token() == Some(token))
            .map(|(index_in_list, config)| CredentialToUpdate {
                config,
                index_in_list,
            })
    }

    pub async fn create(
        &mut self,
        connector_auth_config: Option<ConfigDescriptor>,
        app_name: &str,
    ) -> AuthOutcome {
        let context = CredentialEditorContext {
            config_to_update_with_index: None,
            connector_auth_config,
            app_name: app_name.to_string(),
        };
        self.open_editor(context).await
    }

    /// Edit the credential currently selected in a field. Without a match the
    /// editor is not opened.
    pub async fn edit(
        &mut self,
        selected: &Value,
        connector_auth_config: Option<ConfigDescriptor>,
        app_name: &str,
    ) -> AuthOutcome {
        let Some(existing) = self.find_credential(selected) else {
            tracing::debug!("No stored credential matches the selected access token");
            return AuthOutcome::NoMatch;
        };

        let context = CredentialEditorContext {
            config_to_update_with_index: Some(existing),
            connector_auth_config,
            app_name: app_name.to_string(),
        };
        self.open_editor(context).await
    }

    async fn open_editor(&mut self, context: CredentialEditorContext) -> AuthOutcome {
        match self.editor.open(context).await {
            Some(credential) if credential.is_oauth2() => {
                self.updated_label = Some(credential.key.clone());
                AuthOutcome::Updated {
                    label: credential.key,
                    value: credential.value,
                }
            }
            Some(credential) => {
                tracing::debug!(
                    "Ignoring credential {} of type {:?}",
                    credential.key,
                    credential.config_type
                );
                AuthOutcome::Cancelled
            }
            None => AuthOutcome::Cancelled,
        }
    }
}
