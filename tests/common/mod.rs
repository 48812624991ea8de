//! Shared test infrastructure for integration tests.
//!
//! `FakeCatalog` is an in-memory backend with call recording; `ScriptedForms`
//! replays canned form actions step by step.
#![allow(dead_code)]

use app_builder::app::App;
use app_builder::backend::model::attr;
use app_builder::backend::{
    AssetSummary, BackendError, CatalogBackend, ClientHandle, Connector, Credentials,
    EntityPayload, Group, Principal, SaveResponse, SearchPage, SearchQuery, TypeCategory,
    TypeDefinition,
};
use app_builder::report::BufferedReporter;
use app_builder::session::{OperationType, WorkflowContext};
use app_builder::settings::default_settings;
use app_builder::workflow::{
    DefineAssetInput, DefineAssetView, EnrichInput, EnrichView, FormAction, Forms,
    RelationshipsAction, RelationshipsView, SelectApplication, SelectApplicationView,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub const BASE_URL: &str = "https://tenant.example.com";

type SaveRule = Box<dyn Fn(&[EntityPayload]) -> Option<BackendError>>;

/// In-memory catalog. Saves upsert by type and qualified name.
#[derive(Default)]
pub struct FakeCatalog {
    pub entities: RefCell<Vec<AssetSummary>>,
    pub users: Vec<Principal>,
    pub groups: Vec<Group>,
    pub tags: Vec<TypeDefinition>,
    pub saves: RefCell<Vec<Vec<EntityPayload>>>,
    pub tag_requests: RefCell<Vec<(String, String, Vec<String>, bool)>>,
    /// Fail the next save with a dead-session error.
    pub expire_next_save: Cell<bool>,
    pub reject: RefCell<Option<SaveRule>>,
    pub next_guid: Cell<u32>,
}

impl FakeCatalog {
    pub fn with_entities(entities: Vec<AssetSummary>) -> Self {
        Self {
            entities: RefCell::new(entities),
            ..Self::default()
        }
    }

    pub fn reject_saves_where(
        &self,
        rule: impl Fn(&[EntityPayload]) -> Option<BackendError> + 'static,
    ) {
        *self.reject.borrow_mut() = Some(Box::new(rule));
    }

    /// Every saved payload, flattened in call order.
    pub fn saved(&self) -> Vec<EntityPayload> {
        self.saves.borrow().iter().flatten().cloned().collect()
    }

    pub fn saved_of_type(&self, type_name: &str) -> Vec<EntityPayload> {
        self.saved()
            .into_iter()
            .filter(|payload| payload.type_name == type_name)
            .collect()
    }

    pub fn stored(&self, type_name: &str, qualified_name: &str) -> Option<AssetSummary> {
        self.entities
            .borrow()
            .iter()
            .find(|e| e.type_name == type_name && e.qualified_name() == Some(qualified_name))
            .cloned()
    }
}

impl CatalogBackend for FakeCatalog {
    fn search_page(&self, query: &SearchQuery, from: usize) -> Result<SearchPage, BackendError> {
        let matching: Vec<AssetSummary> = self
            .entities
            .borrow()
            .iter()
            .filter(|entity| {
                query
                    .type_name
                    .as_ref()
                    .is_none_or(|type_name| &entity.type_name == type_name)
            })
            .filter(|entity| match &query.equals {
                Some((attribute, value)) => entity.attr_str(attribute) == Some(value.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        let total = matching.len() as u64;
        Ok(SearchPage {
            entities: matching.into_iter().skip(from).take(query.page_size).collect(),
            approximate_count: Some(total),
        })
    }

    fn save(&self, entities: &[EntityPayload]) -> Result<SaveResponse, BackendError> {
        if self.expire_next_save.replace(false) {
            return Err(BackendError::NoActiveSession(
                "No instance of AtlanClient has been created".to_string(),
            ));
        }
        self.saves.borrow_mut().push(entities.to_vec());
        if let Some(err) = self.reject.borrow().as_ref().and_then(|rule| rule(entities)) {
            return Err(err);
        }
        let mut response = SaveResponse::default();
        let mut stored = self.entities.borrow_mut();
        for payload in entities {
            let qualified_name = payload.qualified_name().unwrap_or_default();
            let existing = stored.iter().position(|entity| {
                entity.type_name == payload.type_name
                    && entity.qualified_name() == Some(qualified_name)
            });
            match existing {
                Some(index) => {
                    let entity = &mut stored[index];
                    for (key, value) in &payload.attributes {
                        entity.attributes.insert(key.clone(), value.clone());
                    }
                    response.updated.push(entity.clone());
                }
                None => {
                    self.next_guid.set(self.next_guid.get() + 1);
                    let mut created = AssetSummary::new(&payload.type_name)
                        .with_guid(&format!("new-{}", self.next_guid.get()));
                    created.attributes = payload.attributes.clone();
                    stored.push(created.clone());
                    response.created.push(created);
                }
            }
        }
        Ok(response)
    }

    fn add_tags(
        &self,
        type_name: &str,
        qualified_name: &str,
        tag_names: &[String],
        propagate: bool,
    ) -> Result<(), BackendError> {
        self.tag_requests.borrow_mut().push((
            type_name.to_string(),
            qualified_name.to_string(),
            tag_names.to_vec(),
            propagate,
        ));
        Ok(())
    }

    fn current_user(&self) -> Result<Principal, BackendError> {
        Ok(Principal {
            id: Some("u-1".to_string()),
            username: Some("jdoe".to_string()),
        })
    }

    fn list_users(&self) -> Result<Vec<Principal>, BackendError> {
        Ok(self.users.clone())
    }

    fn list_groups(&self) -> Result<Vec<Group>, BackendError> {
        Ok(self.groups.clone())
    }

    fn list_type_definitions(
        &self,
        _category: TypeCategory,
    ) -> Result<Vec<TypeDefinition>, BackendError> {
        Ok(self.tags.clone())
    }

    fn find_role_id(&self, _name: &str) -> Result<Option<String>, BackendError> {
        Ok(None)
    }
}

/// Hands out the shared fake on every connect.
pub struct FakeConnector {
    pub catalog: Rc<FakeCatalog>,
    pub connects: Rc<Cell<usize>>,
}

impl Connector for FakeConnector {
    fn connect(&self, _credentials: &Credentials) -> Result<ClientHandle, BackendError> {
        self.connects.set(self.connects.get() + 1);
        Ok(ClientHandle::new(self.catalog.clone()))
    }
}

/// App wired to `catalog`, already connected.
pub struct Harness {
    pub catalog: Rc<FakeCatalog>,
    pub reporter: Rc<BufferedReporter>,
    pub connects: Rc<Cell<usize>>,
    pub app: App,
    pub ctx: WorkflowContext,
}

impl Harness {
    pub fn new(catalog: FakeCatalog) -> Self {
        let catalog = Rc::new(catalog);
        let reporter = Rc::new(BufferedReporter::new());
        let connects = Rc::new(Cell::new(0));
        let connector = FakeConnector {
            catalog: catalog.clone(),
            connects: connects.clone(),
        };
        let app = App::new(default_settings(), Box::new(connector), reporter.clone());
        let mut ctx = WorkflowContext::new();
        app.connect(&mut ctx, "tenant.example.com", "token")
            .expect("connect to fake catalog");
        Self {
            catalog,
            reporter,
            connects,
            app,
            ctx,
        }
    }
}

pub fn asset(type_name: &str, qualified_name: &str, name: &str) -> AssetSummary {
    AssetSummary::new(type_name)
        .with_guid(&format!("guid-{name}"))
        .with_attr(attr::QUALIFIED_NAME, qualified_name)
        .with_attr(attr::NAME, name)
}

/// Replays queued actions; an exhausted queue quits.
#[derive(Default)]
pub struct ScriptedForms {
    pub operations: VecDeque<FormAction<OperationType>>,
    pub selections: VecDeque<FormAction<SelectApplication>>,
    pub definitions: VecDeque<FormAction<DefineAssetInput>>,
    pub enrichments: VecDeque<FormAction<EnrichInput>>,
    pub relationships: VecDeque<FormAction<RelationshipsAction>>,
    /// Field names shown by each define-asset view.
    pub shown_fields: Vec<Vec<String>>,
    /// Search result labels shown by each relationships view.
    pub shown_assets: Vec<Vec<String>>,
}

impl Forms for ScriptedForms {
    fn choose_operation(&mut self) -> FormAction<OperationType> {
        self.operations.pop_front().unwrap_or(FormAction::Quit)
    }

    fn select_application(
        &mut self,
        _view: &SelectApplicationView<'_>,
    ) -> FormAction<SelectApplication> {
        self.selections.pop_front().unwrap_or(FormAction::Quit)
    }

    fn define_asset(&mut self, view: &DefineAssetView<'_>) -> FormAction<DefineAssetInput> {
        self.shown_fields
            .push(view.fields.iter().map(|field| field.name.clone()).collect());
        self.definitions.pop_front().unwrap_or(FormAction::Quit)
    }

    fn enrich(&mut self, _view: &EnrichView<'_>) -> FormAction<EnrichInput> {
        self.enrichments.pop_front().unwrap_or(FormAction::Quit)
    }

    fn relationships(&mut self, view: &RelationshipsView<'_>) -> FormAction<RelationshipsAction> {
        self.shown_assets
            .push(view.search_results.labels().map(str::to_string).collect());
        self.relationships.pop_front().unwrap_or(FormAction::Quit)
    }
}
