use crate::backend::model::{attr, APPLICATION};
use crate::backend::{AssetRef, AssetSummary};
use crate::util::truncate_chars;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
}

impl OperationType {
    pub fn label(&self) -> &'static str {
        match self {
            OperationType::Create => "Create a new Application",
            OperationType::Update => "Update an existing Application",
        }
    }

    /// Progressive verb used in error messages ("while creating the asset").
    pub fn verb(&self) -> &'static str {
        match self {
            OperationType::Create => "creating",
            OperationType::Update => "updating",
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self, OperationType::Update)
    }
}

/// One row of the field editor.
///
/// Names are not required to be unique. An existing record always carries the
/// qualified name it was loaded with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldRecord {
    pub name: String,
    pub field_type: String,
    pub description: String,
    pub qualified_name: Option<String>,
    pub is_existing: bool,
    pub mark_for_deletion: bool,
}

impl FieldRecord {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn new(name: &str, field_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            description: description.to_string(),
            ..Self::default()
        }
    }

    pub fn existing(name: &str, field_type: &str, description: &str, qualified_name: &str) -> Self {
        Self {
            qualified_name: Some(qualified_name.to_string()),
            is_existing: true,
            ..Self::new(name, field_type, description)
        }
    }

    pub fn from_asset(asset: &AssetSummary) -> Option<Self> {
        let qualified_name = asset.qualified_name()?;
        Some(Self::existing(
            asset.name().unwrap_or_default(),
            asset.attr_str(attr::APPLICATION_FIELD_TYPE).unwrap_or_default(),
            asset.attr_str(attr::DESCRIPTION).unwrap_or_default(),
            qualified_name,
        ))
    }

    /// Qualified name when it is present and non-blank.
    pub fn known_qualified_name(&self) -> Option<&str> {
        self.qualified_name
            .as_deref()
            .filter(|qualified_name| !qualified_name.trim().is_empty())
    }
}

/// An Application found by search and picked for update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationSummary {
    pub guid: Option<String>,
    pub qualified_name: String,
    pub name: String,
    pub app_id: Option<String>,
    pub description: Option<String>,
    pub connection_qualified_name: Option<String>,
}

impl ApplicationSummary {
    pub fn from_asset(asset: &AssetSummary) -> Option<Self> {
        let owned = |key: &str| asset.attr_str(key).map(str::to_string);
        Some(Self {
            guid: asset.guid.clone(),
            qualified_name: asset.qualified_name()?.to_string(),
            name: asset.name()?.to_string(),
            app_id: owned(attr::APP_ID),
            description: owned(attr::DESCRIPTION),
            connection_qualified_name: owned(attr::CONNECTION_QUALIFIED_NAME),
        })
    }

    /// `"{name} (ID: {app id}) - {description snippet}..."`, parts omitted when absent.
    pub fn display_label(&self, snippet_chars: usize) -> String {
        let mut label = self.name.clone();
        if let Some(app_id) = &self.app_id {
            label.push_str(&format!(" (ID: {app_id})"));
        }
        if let Some(description) = &self.description {
            label.push_str(&format!(" - {}...", truncate_chars(description, snippet_chars)));
        }
        label
    }

    pub fn to_ref(&self) -> AssetRef {
        AssetRef::new(APPLICATION, &self.qualified_name, &self.name)
    }
}

/// Output of the define-asset step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetDetails {
    pub name: String,
    pub app_id: String,
    pub connection_qualified_name: Option<String>,
    pub fields: Vec<FieldRecord>,
    pub is_update: bool,
    /// Set in update mode only.
    pub qualified_name: Option<String>,
    pub create_new_connection: bool,
    pub new_connection_name: Option<String>,
}

impl AssetDetails {
    /// Draft seeded from a selected application and its loaded fields.
    pub fn from_selection(application: &ApplicationSummary, fields: Vec<FieldRecord>) -> Self {
        Self {
            name: application.name.clone(),
            app_id: application.app_id.clone().unwrap_or_default(),
            connection_qualified_name: application.connection_qualified_name.clone(),
            fields,
            is_update: true,
            qualified_name: Some(application.qualified_name.clone()),
            create_new_connection: false,
            new_connection_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentDetails {
    pub description: String,
    pub owner_users: Vec<String>,
    pub owner_groups: Vec<String>,
    pub tag_names: Vec<String>,
}
