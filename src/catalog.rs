//! Read-side catalog queries used by the step forms.
//!
//! Every query goes through the gateway and is bounded by [`SearchSettings`].
//! A failed read never blocks the workflow: it degrades to an empty result and
//! a warning. Owners and tags are cached per client handle.
use crate::backend::model::{attr, API_CONNECTOR, APPLICATION, APPLICATION_FIELD, CONNECTION};
use crate::backend::search::paged;
use crate::backend::{AssetRef, AssetSummary, BackendError, CatalogBackend, SearchQuery};
use crate::backend::{TypeCategory, TypeDefinition};
use crate::gateway::Gateway;
use crate::labels::Labeled;
use crate::report::Reporter;
use crate::session::{ApplicationSummary, FieldRecord, WorkflowContext};
use crate::settings::SearchSettings;
use std::cell::RefCell;
use std::rc::Rc;

/// A user or group that can own an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    User(String),
    Group(String),
}

impl Owner {
    pub fn label(&self) -> String {
        match self {
            Owner::User(username) => format!("User: {username}"),
            Owner::Group(alias) => format!("Group: {alias}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub qualified_name: String,
    pub name: String,
    pub connector_name: Option<String>,
}

impl ConnectionSummary {
    fn from_asset(asset: &AssetSummary) -> Option<Self> {
        Some(Self {
            qualified_name: asset.qualified_name()?.to_string(),
            name: asset.name()?.to_string(),
            connector_name: asset.attr_str(attr::CONNECTOR_NAME).map(str::to_string),
        })
    }

    /// `"{connector} - {name}"`.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.connector_name.as_deref().unwrap_or("Unknown"),
            self.name
        )
    }
}

/// Result of a bounded connection scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionScan {
    pub connections: Vec<ConnectionSummary>,
    pub iterations: usize,
    pub hit_iteration_cap: bool,
}

/// Keep only API-type connections.
pub fn filter_api_connections(connections: &[ConnectionSummary]) -> Vec<ConnectionSummary> {
    connections
        .iter()
        .filter(|connection| connection.connector_name.as_deref() == Some(API_CONNECTOR))
        .cloned()
        .collect()
}

fn name_contains(asset: &AssetSummary, needle: &str) -> bool {
    asset
        .name()
        .is_some_and(|name| name.to_lowercase().contains(needle))
}

/// Active applications whose name contains `term`, in server order, capped.
pub fn search_applications_in(
    backend: &dyn CatalogBackend,
    settings: &SearchSettings,
    term: &str,
) -> Result<Labeled<ApplicationSummary>, BackendError> {
    let needle = term.to_lowercase();
    let query = SearchQuery::new(settings.application_page_size)
        .of_type(APPLICATION)
        .active()
        .include(&[attr::DESCRIPTION, attr::APP_ID, attr::CONNECTION_QUALIFIED_NAME]);
    let mut applications = Labeled::new();
    for asset in paged(backend, query) {
        let asset = asset?;
        if !name_contains(&asset, &needle) {
            continue;
        }
        if let Some(application) = ApplicationSummary::from_asset(&asset) {
            let label = application.display_label(settings.description_snippet_chars);
            applications.insert(label, application);
            if applications.len() >= settings.max_application_results {
                break;
            }
        }
    }
    Ok(applications)
}

pub fn load_fields_in(
    backend: &dyn CatalogBackend,
    settings: &SearchSettings,
    application_qualified_name: &str,
) -> Result<Vec<FieldRecord>, BackendError> {
    let query = SearchQuery::new(settings.default_page_size)
        .of_type(APPLICATION_FIELD)
        .active()
        .where_eq(attr::APPLICATION_PARENT_QUALIFIED_NAME, application_qualified_name)
        .include(&[attr::DESCRIPTION, attr::APPLICATION_FIELD_TYPE]);
    let mut fields = Vec::new();
    for asset in paged(backend, query) {
        if let Some(field) = FieldRecord::from_asset(&asset?) {
            fields.push(field);
        }
    }
    Ok(fields)
}

/// Active assets of any type whose name contains `term`, capped.
pub fn search_assets_in(
    backend: &dyn CatalogBackend,
    settings: &SearchSettings,
    term: &str,
) -> Result<Vec<AssetSummary>, BackendError> {
    let needle = term.to_lowercase();
    let query = SearchQuery::new(settings.default_page_size).active();
    let mut matches = Vec::new();
    for asset in paged(backend, query) {
        let asset = asset?;
        if name_contains(&asset, &needle) {
            matches.push(asset);
            if matches.len() >= settings.max_asset_results {
                break;
            }
        }
    }
    Ok(matches)
}

/// Server-side exact name match, used when the substring scan finds nothing.
pub fn exact_name_assets_in(
    backend: &dyn CatalogBackend,
    settings: &SearchSettings,
    term: &str,
) -> Result<Vec<AssetSummary>, BackendError> {
    let query = SearchQuery::new(settings.exact_match_page_size)
        .active()
        .where_eq(attr::NAME, term);
    paged(backend, query)
        .take(settings.max_asset_results)
        .collect()
}

/// Connections in server order. Stops at the target count or after the
/// iteration cap, whichever comes first.
pub fn list_connections_in(
    backend: &dyn CatalogBackend,
    settings: &SearchSettings,
) -> Result<ConnectionScan, BackendError> {
    let query = SearchQuery::new(settings.connection_page_size)
        .of_type(CONNECTION)
        .active()
        .include(&[attr::CONNECTOR_NAME]);
    let mut scan = ConnectionScan::default();
    for asset in paged(backend, query).take(settings.max_connection_iterations) {
        scan.iterations += 1;
        let asset = asset?;
        if asset.type_name != CONNECTION {
            continue;
        }
        if let Some(connection) = ConnectionSummary::from_asset(&asset) {
            scan.connections.push(connection);
            if scan.connections.len() >= settings.max_connections {
                return Ok(scan);
            }
        }
    }
    scan.hit_iteration_cap = scan.iterations >= settings.max_connection_iterations;
    Ok(scan)
}

pub fn list_owners_in(backend: &dyn CatalogBackend) -> Result<Labeled<Owner>, BackendError> {
    let users = backend.list_users()?;
    let groups = backend.list_groups()?;
    let mut owners = Labeled::new();
    for username in users.into_iter().filter_map(|user| user.username) {
        let owner = Owner::User(username);
        owners.insert(owner.label(), owner);
    }
    for alias in groups.into_iter().filter_map(|group| group.alias) {
        let owner = Owner::Group(alias);
        owners.insert(owner.label(), owner);
    }
    Ok(owners)
}

pub fn list_tags_in(
    backend: &dyn CatalogBackend,
) -> Result<Labeled<TypeDefinition>, BackendError> {
    let mut tags = Labeled::new();
    for definition in backend.list_type_definitions(TypeCategory::Classification)? {
        if let Some(display_name) = definition.display_name.clone() {
            tags.insert(display_name, definition);
        }
    }
    Ok(tags)
}

/// Per-client cache entry.
struct Cached<T> {
    client_id: u64,
    value: T,
}

pub struct Catalog {
    gateway: Rc<Gateway>,
    reporter: Rc<dyn Reporter>,
    settings: SearchSettings,
    owners: RefCell<Option<Cached<Labeled<Owner>>>>,
    tags: RefCell<Option<Cached<Labeled<TypeDefinition>>>>,
}

impl Catalog {
    pub fn new(gateway: Rc<Gateway>, reporter: Rc<dyn Reporter>, settings: SearchSettings) -> Self {
        Self {
            gateway,
            reporter,
            settings,
            owners: RefCell::new(None),
            tags: RefCell::new(None),
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    fn degrade<T: Default>(&self, what: &str, result: Result<T, BackendError>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, what, "catalog read failed");
                self.reporter
                    .warning(&format!("Error fetching {what}: {err}"));
                T::default()
            }
        }
    }

    pub fn search_applications(
        &self,
        ctx: &mut WorkflowContext,
        term: &str,
    ) -> Labeled<ApplicationSummary> {
        let settings = &self.settings;
        let result = self
            .gateway
            .execute(ctx, |backend| search_applications_in(backend, settings, term));
        let applications = self.degrade("applications", result);
        tracing::info!(term, found = applications.len(), "application search");
        applications
    }

    pub fn load_fields(
        &self,
        ctx: &mut WorkflowContext,
        application_qualified_name: &str,
    ) -> Vec<FieldRecord> {
        let settings = &self.settings;
        let result = self.gateway.execute(ctx, |backend| {
            load_fields_in(backend, settings, application_qualified_name)
        });
        match result {
            Ok(fields) if fields.is_empty() => {
                self.reporter
                    .info("No existing fields found for this application");
                fields
            }
            Ok(fields) => {
                self.reporter.success(&format!(
                    "Loaded {} existing fields from the application",
                    fields.len()
                ));
                fields
            }
            Err(err) => {
                tracing::warn!(error = %err, application_qualified_name, "field load failed");
                self.reporter.warning(&format!(
                    "Could not load existing fields ({err}). You can still proceed to update the application."
                ));
                Vec::new()
            }
        }
    }

    /// Substring search with an exact-name fallback when nothing matches.
    pub fn search_assets(&self, ctx: &mut WorkflowContext, term: &str) -> Labeled<AssetRef> {
        let settings = &self.settings;
        let result = self
            .gateway
            .execute(ctx, |backend| search_assets_in(backend, settings, term));
        let assets = match result {
            Ok(found) if found.is_empty() => self.exact_name_fallback(ctx, term),
            other => self.degrade("assets", other),
        };

        let mut results = Labeled::new();
        for asset in &assets {
            if let Some(asset_ref) = asset.to_ref() {
                results.insert(format!("{}: {}", asset_ref.type_name, asset_ref.name), asset_ref);
            }
        }
        tracing::info!(term, found = results.len(), "asset search");
        results
    }

    fn exact_name_fallback(&self, ctx: &mut WorkflowContext, term: &str) -> Vec<AssetSummary> {
        let settings = &self.settings;
        self.reporter.info(&format!(
            "No partial matches found for '{term}', trying exact match..."
        ));
        let exact = self
            .gateway
            .execute(ctx, |backend| exact_name_assets_in(backend, settings, term));
        match exact {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, term, "exact-name search failed");
                self.reporter
                    .warning(&format!("Exact match search also failed: {err}"));
                Vec::new()
            }
        }
    }

    pub fn list_connections(&self, ctx: &mut WorkflowContext) -> Vec<ConnectionSummary> {
        let settings = &self.settings;
        let result = self
            .gateway
            .execute(ctx, |backend| list_connections_in(backend, settings));
        let scan = self.degrade("connections", result);
        if scan.hit_iteration_cap {
            self.reporter.warning(&format!(
                "Stopped connection search after {} results",
                scan.iterations
            ));
        }
        tracing::info!(
            found = scan.connections.len(),
            iterations = scan.iterations,
            "connection scan"
        );
        scan.connections
    }

    pub fn list_owners(&self, ctx: &mut WorkflowContext) -> Labeled<Owner> {
        if let Some(cached) = self.cached(&self.owners, ctx) {
            return cached;
        }
        let result = self.gateway.execute(ctx, list_owners_in);
        self.store(&self.owners, ctx, "users and groups", result)
    }

    pub fn list_tags(&self, ctx: &mut WorkflowContext) -> Labeled<TypeDefinition> {
        if let Some(cached) = self.cached(&self.tags, ctx) {
            return cached;
        }
        let result = self.gateway.execute(ctx, list_tags_in);
        self.store(&self.tags, ctx, "tags", result)
    }

    fn cached<T: Clone>(
        &self,
        slot: &RefCell<Option<Cached<T>>>,
        ctx: &WorkflowContext,
    ) -> Option<T> {
        let client_id = ctx.client()?.id();
        slot.borrow()
            .as_ref()
            .filter(|entry| entry.client_id == client_id)
            .map(|entry| entry.value.clone())
    }

    /// Cache successful results under the handle they were fetched with.
    fn store<T: Clone + Default>(
        &self,
        slot: &RefCell<Option<Cached<T>>>,
        ctx: &WorkflowContext,
        what: &str,
        result: Result<T, BackendError>,
    ) -> T {
        let fetched = result.is_ok();
        let value = self.degrade(what, result);
        if let (true, Some(handle)) = (fetched, ctx.client()) {
            *slot.borrow_mut() = Some(Cached {
                client_id: handle.id(),
                value: value.clone(),
            });
        }
        value
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
