//! Process-local session store threaded through every step.
//!
//! The store is a keyed map with typed accessors. Which keys are present is
//! what the workflow state machine reads; nothing else records progress.
mod types;

pub use types::{
    ApplicationSummary, AssetDetails, EnrichmentDetails, FieldRecord, OperationType,
};

use crate::backend::{AssetRef, ClientHandle, Credentials, Principal};
use crate::labels::Labeled;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    BaseUrl,
    ApiToken,
    Client,
    User,
    OperationType,
    SelectedApplication,
    ApplicationDraft,
    ApplicationFields,
    AssetDetails,
    EnrichmentDetails,
    SearchResults,
}

/// Keys that survive a workflow reset: the connection and who it belongs to.
pub const PERSISTENT_KEYS: [SessionKey; 4] = [
    SessionKey::Client,
    SessionKey::User,
    SessionKey::BaseUrl,
    SessionKey::ApiToken,
];

#[derive(Debug, Clone)]
pub enum SessionValue {
    Text(String),
    Client(ClientHandle),
    User(Principal),
    Operation(OperationType),
    Application(ApplicationSummary),
    Asset(AssetDetails),
    Fields(Vec<FieldRecord>),
    Enrichment(EnrichmentDetails),
    Results(Labeled<AssetRef>),
}

/// Key presence as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub operation_type: Option<OperationType>,
    pub has_selected_application: bool,
    pub has_asset_details: bool,
    pub has_enrichment_details: bool,
}

#[derive(Debug, Default)]
pub struct WorkflowContext {
    values: HashMap<SessionKey, SessionValue>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SessionKey) -> Option<&SessionValue> {
        self.values.get(&key)
    }

    pub fn set(&mut self, key: SessionKey, value: SessionValue) {
        self.values.insert(key, value);
    }

    pub fn contains(&self, key: SessionKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn remove(&mut self, key: SessionKey) -> Option<SessionValue> {
        self.values.remove(&key)
    }

    /// Drop every key not listed in `preserve`.
    pub fn clear_except(&mut self, preserve: &[SessionKey]) {
        self.values.retain(|key, _| preserve.contains(key));
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            operation_type: self.operation_type(),
            has_selected_application: self.contains(SessionKey::SelectedApplication),
            has_asset_details: self.contains(SessionKey::AssetDetails),
            has_enrichment_details: self.contains(SessionKey::EnrichmentDetails),
        }
    }

    fn text(&self, key: SessionKey) -> Option<&str> {
        match self.get(key) {
            Some(SessionValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.text(SessionKey::BaseUrl)
    }

    /// Stored URL and token, when both are present.
    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            base_url: self.base_url()?.to_string(),
            api_token: self.text(SessionKey::ApiToken)?.to_string(),
        })
    }

    pub fn client(&self) -> Option<&ClientHandle> {
        match self.get(SessionKey::Client) {
            Some(SessionValue::Client(handle)) => Some(handle),
            _ => None,
        }
    }

    pub fn set_client(&mut self, handle: ClientHandle) {
        self.set(SessionKey::Client, SessionValue::Client(handle));
    }

    pub fn user(&self) -> Option<&Principal> {
        match self.get(SessionKey::User) {
            Some(SessionValue::User(user)) => Some(user),
            _ => None,
        }
    }

    /// Record a freshly validated connection under the persistent keys.
    pub fn store_connection(
        &mut self,
        credentials: &Credentials,
        handle: ClientHandle,
        user: Principal,
    ) {
        self.set(
            SessionKey::BaseUrl,
            SessionValue::Text(credentials.base_url.clone()),
        );
        self.set(
            SessionKey::ApiToken,
            SessionValue::Text(credentials.api_token.clone()),
        );
        self.set_client(handle);
        self.set(SessionKey::User, SessionValue::User(user));
    }

    pub fn operation_type(&self) -> Option<OperationType> {
        match self.get(SessionKey::OperationType) {
            Some(SessionValue::Operation(operation)) => Some(*operation),
            _ => None,
        }
    }

    pub fn set_operation_type(&mut self, operation: OperationType) {
        self.set(SessionKey::OperationType, SessionValue::Operation(operation));
    }

    pub fn is_update(&self) -> bool {
        self.operation_type().is_some_and(|operation| operation.is_update())
    }

    pub fn selected_application(&self) -> Option<&ApplicationSummary> {
        match self.get(SessionKey::SelectedApplication) {
            Some(SessionValue::Application(application)) => Some(application),
            _ => None,
        }
    }

    pub fn set_selected_application(&mut self, application: ApplicationSummary) {
        self.set(
            SessionKey::SelectedApplication,
            SessionValue::Application(application),
        );
    }

    /// Asset details seeded by the selection step, before the user edits them.
    pub fn application_draft(&self) -> Option<&AssetDetails> {
        match self.get(SessionKey::ApplicationDraft) {
            Some(SessionValue::Asset(details)) => Some(details),
            _ => None,
        }
    }

    pub fn set_application_draft(&mut self, draft: AssetDetails) {
        self.set(SessionKey::ApplicationDraft, SessionValue::Asset(draft));
    }

    /// Field editor rows; seeded from the draft in update mode, else empty.
    pub fn application_fields(&self) -> Vec<FieldRecord> {
        match self.get(SessionKey::ApplicationFields) {
            Some(SessionValue::Fields(fields)) => fields.clone(),
            _ => self
                .application_draft()
                .filter(|draft| draft.is_update)
                .map(|draft| draft.fields.clone())
                .unwrap_or_default(),
        }
    }

    pub fn set_application_fields(&mut self, fields: Vec<FieldRecord>) {
        self.set(SessionKey::ApplicationFields, SessionValue::Fields(fields));
    }

    pub fn asset_details(&self) -> Option<&AssetDetails> {
        match self.get(SessionKey::AssetDetails) {
            Some(SessionValue::Asset(details)) => Some(details),
            _ => None,
        }
    }

    pub fn set_asset_details(&mut self, details: AssetDetails) {
        self.set(SessionKey::AssetDetails, SessionValue::Asset(details));
    }

    pub fn enrichment_details(&self) -> Option<&EnrichmentDetails> {
        match self.get(SessionKey::EnrichmentDetails) {
            Some(SessionValue::Enrichment(details)) => Some(details),
            _ => None,
        }
    }

    pub fn set_enrichment_details(&mut self, details: EnrichmentDetails) {
        self.set(
            SessionKey::EnrichmentDetails,
            SessionValue::Enrichment(details),
        );
    }

    pub fn search_results(&self) -> Option<&Labeled<AssetRef>> {
        match self.get(SessionKey::SearchResults) {
            Some(SessionValue::Results(results)) => Some(results),
            _ => None,
        }
    }

    pub fn set_search_results(&mut self, results: Labeled<AssetRef>) {
        self.set(SessionKey::SearchResults, SessionValue::Results(results));
    }
}

/// Reset the workflow, keeping only the connection. Idempotent.
pub fn clear_workflow_state(ctx: &mut WorkflowContext) {
    ctx.clear_except(&PERSISTENT_KEYS);
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
