//! Form contract for the presentation layer, plus the validation that turns
//! raw form input into session values.
use crate::backend::{AssetRef, TypeDefinition};
use crate::catalog::{ConnectionSummary, Owner};
use crate::labels::Labeled;
use crate::session::{ApplicationSummary, AssetDetails, EnrichmentDetails, FieldRecord, OperationType};

/// What the user did with a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction<T> {
    Submit(T),
    GoBack,
    StartOver,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Application Name is a required field.")]
    MissingName,
    #[error("New Connection Name is required when creating a new connection.")]
    MissingNewConnectionName,
    #[error("You must select an existing connection.")]
    MissingConnection,
    #[error("Please enter at least {min} characters to search.")]
    SearchTooShort { min: usize },
    #[error("Unknown selection: {0}")]
    UnknownLabel(String),
    #[error("No application draft is loaded; select the application again.")]
    MissingDraft,
}

/// Search, or pick one of the current results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectApplication {
    Search(String),
    Pick(String),
}

pub struct SelectApplicationView<'a> {
    pub min_search_chars: usize,
    /// Results of the last search, if one ran.
    pub results: Option<&'a Labeled<ApplicationSummary>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionChoice {
    /// Qualified name of an existing connection, `None` if nothing was picked.
    Existing(Option<String>),
    New(String),
}

pub struct DefineAssetView<'a> {
    pub operation: OperationType,
    pub fields: &'a [FieldRecord],
    pub default_name: &'a str,
    pub default_app_id: &'a str,
    /// API connections to choose from; create mode only.
    pub api_connections: &'a [ConnectionSummary],
    /// Connection of the application being updated; cannot change.
    pub locked_connection: Option<&'a str>,
    pub selected: Option<&'a ApplicationSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineAssetInput {
    pub fields: Vec<FieldRecord>,
    pub name: String,
    pub app_id: String,
    pub connection: ConnectionChoice,
}

pub struct EnrichView<'a> {
    pub operation: OperationType,
    pub application_name: &'a str,
    pub default_description: &'a str,
    pub owners: &'a Labeled<Owner>,
    pub tags: &'a Labeled<TypeDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichInput {
    pub description: String,
    /// Owner labels as shown in the view.
    pub owners: Vec<String>,
    /// Tag display names.
    pub tags: Vec<String>,
}

pub struct RelationshipsView<'a> {
    pub operation: OperationType,
    pub application_name: &'a str,
    pub search_results: &'a Labeled<AssetRef>,
}

/// Labels picked from the current search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    /// `None` leaves ownership alone; `Some(vec![])` clears it.
    pub owned_assets: Option<Vec<String>>,
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipsAction {
    Search(String),
    Submit(Relationships),
}

/// Collects input for each step. Implementations render however they like.
pub trait Forms {
    fn choose_operation(&mut self) -> FormAction<OperationType>;

    fn select_application(
        &mut self,
        view: &SelectApplicationView<'_>,
    ) -> FormAction<SelectApplication>;

    fn define_asset(&mut self, view: &DefineAssetView<'_>) -> FormAction<DefineAssetInput>;

    fn enrich(&mut self, view: &EnrichView<'_>) -> FormAction<EnrichInput>;

    fn relationships(&mut self, view: &RelationshipsView<'_>) -> FormAction<RelationshipsAction>;
}

pub fn check_search_term(term: &str, min_chars: usize) -> Result<&str, ValidationError> {
    let term = term.trim();
    if term.chars().count() < min_chars {
        return Err(ValidationError::SearchTooShort { min: min_chars });
    }
    Ok(term)
}

/// Validate the define-asset form.
///
/// Update mode takes identity and connection from the draft; create mode
/// requires a connection choice.
pub fn build_asset_details(
    operation: OperationType,
    draft: Option<&AssetDetails>,
    input: DefineAssetInput,
) -> Result<AssetDetails, ValidationError> {
    if input.name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    let mut details = AssetDetails {
        name: input.name.trim().to_string(),
        app_id: input.app_id.trim().to_string(),
        fields: input.fields,
        is_update: operation.is_update(),
        ..AssetDetails::default()
    };
    match operation {
        OperationType::Update => {
            let draft = draft.ok_or(ValidationError::MissingDraft)?;
            details.qualified_name = draft.qualified_name.clone();
            details.connection_qualified_name = draft.connection_qualified_name.clone();
        }
        OperationType::Create => match input.connection {
            ConnectionChoice::Existing(Some(qualified_name)) if !qualified_name.trim().is_empty() => {
                details.connection_qualified_name = Some(qualified_name);
            }
            ConnectionChoice::Existing(_) => return Err(ValidationError::MissingConnection),
            ConnectionChoice::New(name) if name.trim().is_empty() => {
                return Err(ValidationError::MissingNewConnectionName)
            }
            ConnectionChoice::New(name) => {
                details.create_new_connection = true;
                details.new_connection_name = Some(name.trim().to_string());
            }
        },
    }
    Ok(details)
}

/// Split owner picks into users and groups and check tag picks exist.
pub fn build_enrichment(
    input: EnrichInput,
    owners: &Labeled<Owner>,
    tags: &Labeled<TypeDefinition>,
) -> Result<EnrichmentDetails, ValidationError> {
    let mut details = EnrichmentDetails {
        description: input.description,
        ..EnrichmentDetails::default()
    };
    for label in &input.owners {
        match owners.get(label) {
            Some(Owner::User(username)) => details.owner_users.push(username.clone()),
            Some(Owner::Group(alias)) => details.owner_groups.push(alias.clone()),
            None => return Err(ValidationError::UnknownLabel(label.clone())),
        }
    }
    for tag in &input.tags {
        if !tags.contains(tag) {
            return Err(ValidationError::UnknownLabel(tag.clone()));
        }
        details.tag_names.push(tag.clone());
    }
    Ok(details)
}
