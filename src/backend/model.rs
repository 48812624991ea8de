use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const APPLICATION: &str = "Application";
pub const APPLICATION_FIELD: &str = "ApplicationField";
pub const CONNECTION: &str = "Connection";
pub const PROCESS: &str = "Process";

/// Connector name for API-type connections.
pub const API_CONNECTOR: &str = "api";

/// Attribute names used in search projections and entity payloads.
pub mod attr {
    pub const NAME: &str = "name";
    pub const QUALIFIED_NAME: &str = "qualifiedName";
    pub const DESCRIPTION: &str = "description";
    pub const APP_ID: &str = "appId";
    pub const CONNECTION_QUALIFIED_NAME: &str = "connectionQualifiedName";
    pub const CONNECTOR_NAME: &str = "connectorName";
    pub const CATEGORY: &str = "category";
    pub const ADMIN_USERS: &str = "adminUsers";
    pub const ADMIN_ROLES: &str = "adminRoles";
    pub const OWNER_USERS: &str = "ownerUsers";
    pub const OWNER_GROUPS: &str = "ownerGroups";
    pub const APPLICATION_FIELD_TYPE: &str = "applicationFieldType";
    pub const APPLICATION_PARENT: &str = "applicationParent";
    pub const APPLICATION_PARENT_QUALIFIED_NAME: &str = "applicationParentQualifiedName";
    pub const APPLICATION_QUALIFIED_NAME: &str = "applicationQualifiedName";
    pub const APPLICATION_OWNED_ASSETS: &str = "applicationOwnedAssets";
    pub const INPUTS: &str = "inputs";
    pub const OUTPUTS: &str = "outputs";
}

/// Entity as returned by search and by save responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl AssetSummary {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            guid: None,
            attributes: Map::new(),
        }
    }

    pub fn with_guid(mut self, guid: &str) -> Self {
        self.guid = Some(guid.to_string());
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// String attribute, treating blank values as absent.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.attr_str(attr::NAME)
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.attr_str(attr::QUALIFIED_NAME)
    }

    /// Reference form; `None` when the summary lacks a name or qualified name.
    pub fn to_ref(&self) -> Option<AssetRef> {
        Some(AssetRef {
            type_name: self.type_name.clone(),
            qualified_name: self.qualified_name()?.to_string(),
            name: self.name()?.to_string(),
        })
    }
}

/// Identity of an asset picked from search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub type_name: String,
    pub qualified_name: String,
    pub name: String,
}

impl AssetRef {
    pub fn new(type_name: &str, qualified_name: &str, name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            qualified_name: qualified_name.to_string(),
            name: name.to_string(),
        }
    }

    /// Relationship reference by unique attribute.
    pub fn to_reference(&self) -> Value {
        reference(&self.type_name, &self.qualified_name)
    }

    /// Smallest payload the catalog accepts as an update of this asset.
    pub fn trim_to_required(&self) -> EntityPayload {
        EntityPayload::new(&self.type_name, &self.qualified_name, &self.name)
    }
}

pub fn reference(type_name: &str, qualified_name: &str) -> Value {
    json!({
        "typeName": type_name,
        "uniqueAttributes": { "qualifiedName": qualified_name },
    })
}

/// Entity write request: a type plus the attributes to set.
///
/// Attributes that are not present are left untouched by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPayload {
    pub type_name: String,
    pub attributes: Map<String, Value>,
}

impl EntityPayload {
    pub fn new(type_name: &str, qualified_name: &str, name: &str) -> Self {
        let mut payload = Self {
            type_name: type_name.to_string(),
            attributes: Map::new(),
        };
        payload.set(attr::QUALIFIED_NAME, qualified_name);
        payload.set(attr::NAME, name);
        payload
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn set_opt(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.attr_str(attr::QUALIFIED_NAME)
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }
}

/// Outcome of a save: the entities the catalog created and updated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveResponse {
    pub created: Vec<AssetSummary>,
    pub updated: Vec<AssetSummary>,
}

impl SaveResponse {
    pub fn created_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a AssetSummary> + 'a {
        self.created
            .iter()
            .filter(move |asset| asset.type_name == type_name)
    }

    pub fn updated_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a AssetSummary> + 'a {
        self.updated
            .iter()
            .filter(move |asset| asset.type_name == type_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Type definition entry; classification definitions are the catalog's tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Classification,
}

impl TypeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCategory::Classification => "classification",
        }
    }
}
