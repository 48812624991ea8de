//! Typed builders for the entities the workflow writes.
//!
//! Each builder carries optional attributes; only the ones that are `Some`
//! reach the payload, so an updater leaves everything else untouched on the
//! catalog side. Create and update paths share the same `merge` helpers.
use super::model::{attr, reference, AssetRef, EntityPayload, API_CONNECTOR};
use super::model::{APPLICATION, APPLICATION_FIELD, CONNECTION, PROCESS};
use crate::util::{non_empty, non_empty_list, sha256_hex};
use serde_json::Value;
use std::collections::BTreeSet;

/// Attribute changes coming from user input, applied to create and update alike.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationPatch {
    pub app_id: Option<String>,
    pub description: Option<String>,
    pub owner_users: Option<Vec<String>>,
    pub owner_groups: Option<Vec<String>>,
}

impl ApplicationPatch {
    /// Blank inputs become `None` and are left untouched server-side.
    pub fn from_inputs(
        app_id: &str,
        description: &str,
        owner_users: &[String],
        owner_groups: &[String],
    ) -> Self {
        Self {
            app_id: non_empty(app_id),
            description: non_empty(description),
            owner_users: non_empty_list(owner_users),
            owner_groups: non_empty_list(owner_groups),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub qualified_name: String,
    pub name: String,
    pub connection_qualified_name: Option<String>,
    pub app_id: Option<String>,
    pub description: Option<String>,
    pub owner_users: Option<Vec<String>>,
    pub owner_groups: Option<Vec<String>>,
    pub owned_assets: Option<Vec<AssetRef>>,
}

impl Application {
    /// New application under `connection_qualified_name`.
    pub fn creator(name: &str, connection_qualified_name: &str) -> Self {
        let mut app = Self::updater(&format!("{connection_qualified_name}/{name}"), name);
        app.connection_qualified_name = Some(connection_qualified_name.to_string());
        app
    }

    /// Modification-only request keyed by an existing qualified name.
    pub fn updater(qualified_name: &str, name: &str) -> Self {
        Self {
            qualified_name: qualified_name.to_string(),
            name: name.to_string(),
            connection_qualified_name: None,
            app_id: None,
            description: None,
            owner_users: None,
            owner_groups: None,
            owned_assets: None,
        }
    }

    pub fn merge(&mut self, patch: &ApplicationPatch) {
        merge_opt(&mut self.app_id, &patch.app_id);
        merge_opt(&mut self.description, &patch.description);
        merge_opt(&mut self.owner_users, &patch.owner_users);
        merge_opt(&mut self.owner_groups, &patch.owner_groups);
    }

    pub fn to_payload(&self) -> EntityPayload {
        let mut payload = EntityPayload::new(APPLICATION, &self.qualified_name, &self.name);
        if let Some(connection) = &self.connection_qualified_name {
            payload.set(attr::CONNECTION_QUALIFIED_NAME, connection.as_str());
            if let Some(connector) = connector_of(connection) {
                payload.set(attr::CONNECTOR_NAME, connector);
            }
        }
        payload.set_opt(attr::APP_ID, self.app_id.as_deref());
        payload.set_opt(attr::DESCRIPTION, self.description.as_deref());
        if let Some(users) = &self.owner_users {
            payload.set(attr::OWNER_USERS, dedup(users));
        }
        if let Some(groups) = &self.owner_groups {
            payload.set(attr::OWNER_GROUPS, dedup(groups));
        }
        if let Some(assets) = &self.owned_assets {
            let refs: Vec<Value> = assets.iter().map(AssetRef::to_reference).collect();
            payload.set(attr::APPLICATION_OWNED_ASSETS, refs);
        }
        payload
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    pub field_type: Option<String>,
    pub description: Option<String>,
}

impl FieldPatch {
    pub fn from_inputs(field_type: &str, description: &str) -> Self {
        Self {
            field_type: non_empty(field_type),
            description: non_empty(description),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationField {
    pub qualified_name: String,
    pub name: String,
    pub application_qualified_name: Option<String>,
    pub field_type: Option<String>,
    pub description: Option<String>,
}

impl ApplicationField {
    /// New field parented to `application_qualified_name`.
    pub fn creator(name: &str, application_qualified_name: &str) -> Self {
        let mut field = Self::updater(&format!("{application_qualified_name}/{name}"), name);
        field.application_qualified_name = Some(application_qualified_name.to_string());
        field
    }

    pub fn updater(qualified_name: &str, name: &str) -> Self {
        Self {
            qualified_name: qualified_name.to_string(),
            name: name.to_string(),
            application_qualified_name: None,
            field_type: None,
            description: None,
        }
    }

    pub fn merge(&mut self, patch: &FieldPatch) {
        merge_opt(&mut self.field_type, &patch.field_type);
        merge_opt(&mut self.description, &patch.description);
    }

    pub fn to_payload(&self) -> EntityPayload {
        let mut payload = EntityPayload::new(APPLICATION_FIELD, &self.qualified_name, &self.name);
        if let Some(parent) = &self.application_qualified_name {
            payload.set(attr::APPLICATION_PARENT_QUALIFIED_NAME, parent.as_str());
            payload.set(attr::APPLICATION_PARENT, reference(APPLICATION, parent));
        }
        payload.set_opt(attr::APPLICATION_FIELD_TYPE, self.field_type.as_deref());
        payload.set_opt(attr::DESCRIPTION, self.description.as_deref());
        payload
    }
}

/// New API connection administered by the given users and roles.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub qualified_name: String,
    pub name: String,
    pub admin_users: Vec<String>,
    pub admin_roles: Vec<String>,
}

impl Connection {
    pub fn creator(
        name: &str,
        epoch_secs: u64,
        admin_users: Vec<String>,
        admin_roles: Vec<String>,
    ) -> Self {
        Self {
            qualified_name: format!("default/{API_CONNECTOR}/{epoch_secs}"),
            name: name.to_string(),
            admin_users,
            admin_roles,
        }
    }

    pub fn to_payload(&self) -> EntityPayload {
        let mut payload = EntityPayload::new(CONNECTION, &self.qualified_name, &self.name);
        payload.set(attr::CONNECTOR_NAME, API_CONNECTOR);
        payload.set(attr::CATEGORY, "API");
        payload.set(attr::ADMIN_USERS, self.admin_users.clone());
        payload.set(attr::ADMIN_ROLES, self.admin_roles.clone());
        payload
    }
}

/// A lineage edge from `inputs` to `outputs`, referenced by qualified name.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageProcess {
    pub qualified_name: String,
    pub name: String,
    pub connection_qualified_name: String,
    pub inputs: Vec<AssetRef>,
    pub outputs: Vec<AssetRef>,
}

impl LineageProcess {
    /// The qualified name is derived from the endpoints, so re-submitting the
    /// same edge updates the existing process instead of adding a new one.
    pub fn creator(
        name: &str,
        connection_qualified_name: &str,
        inputs: Vec<AssetRef>,
        outputs: Vec<AssetRef>,
    ) -> Self {
        let mut key = String::new();
        for endpoint in inputs.iter().chain(outputs.iter()) {
            key.push_str(&endpoint.qualified_name);
            key.push('\n');
        }
        key.push_str(name);
        let digest = sha256_hex(key.as_bytes());
        Self {
            qualified_name: format!("{connection_qualified_name}/{}", &digest[..32]),
            name: name.to_string(),
            connection_qualified_name: connection_qualified_name.to_string(),
            inputs,
            outputs,
        }
    }

    pub fn to_payload(&self) -> EntityPayload {
        let mut payload = EntityPayload::new(PROCESS, &self.qualified_name, &self.name);
        payload.set(
            attr::CONNECTION_QUALIFIED_NAME,
            self.connection_qualified_name.as_str(),
        );
        if let Some(connector) = connector_of(&self.connection_qualified_name) {
            payload.set(attr::CONNECTOR_NAME, connector);
        }
        let inputs: Vec<Value> = self.inputs.iter().map(AssetRef::to_reference).collect();
        let outputs: Vec<Value> = self.outputs.iter().map(AssetRef::to_reference).collect();
        payload.set(attr::INPUTS, inputs);
        payload.set(attr::OUTPUTS, outputs);
        payload
    }
}

/// Asset-side half of the owned-assets link: the asset's minimal payload with
/// its back-reference pointed at the application.
pub fn owned_asset_update(asset: &AssetRef, application_qualified_name: &str) -> EntityPayload {
    let mut payload = asset.trim_to_required();
    payload.set(attr::APPLICATION_QUALIFIED_NAME, application_qualified_name);
    payload
}

fn merge_opt<T: Clone>(target: &mut Option<T>, patch: &Option<T>) {
    if let Some(value) = patch {
        *target = Some(value.clone());
    }
}

fn dedup(values: &[String]) -> Vec<String> {
    values
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Connector segment of a `default/{connector}/{epoch}` connection name.
fn connector_of(connection_qualified_name: &str) -> Option<&str> {
    let mut parts = connection_qualified_name.split('/');
    match (parts.next(), parts.next()) {
        (Some("default"), Some(connector)) if !connector.is_empty() => Some(connector),
        _ => None,
    }
}
