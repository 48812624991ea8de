use super::model::{attr, AssetSummary, EntityPayload, Group, Principal, SaveResponse};
use super::model::{TypeCategory, TypeDefinition};
use super::search::{SearchPage, SearchQuery};
use super::{BackendError, CatalogBackend, ClientHandle, Connector, Credentials};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Search,
    Save,
    AddTags,
    CurrentUser,
    ListUsers,
    ListGroups,
    TypeDefinitions,
    FindRole,
}

type SaveRule = Box<dyn Fn(&[EntityPayload]) -> Option<BackendError>>;

#[derive(Default)]
pub(crate) struct StubBackend {
    pub entities: RefCell<Vec<AssetSummary>>,
    pub users: Vec<Principal>,
    pub groups: Vec<Group>,
    pub tags: Vec<TypeDefinition>,
    pub role_id: Option<String>,
    pub calls: RefCell<Vec<Call>>,
    pub searches: RefCell<Vec<(SearchQuery, usize)>>,
    pub saves: RefCell<Vec<Vec<EntityPayload>>>,
    pub tag_requests: RefCell<Vec<(String, String, Vec<String>, bool)>>,
    pub failures: RefCell<VecDeque<(Call, BackendError)>>,
    pub next_guid: Cell<u32>,
    pub save_rule: RefCell<Option<SaveRule>>,
}

impl StubBackend {
    pub fn with_entities(entities: Vec<AssetSummary>) -> Self {
        Self {
            entities: RefCell::new(entities),
            ..Self::default()
        }
    }

    /// Fail the next call of `call` with `err`.
    pub fn fail_next(&self, call: Call, err: BackendError) {
        self.failures.borrow_mut().push_back((call, err));
    }

    /// Fail every save for which `rule` returns an error.
    pub fn fail_saves_where(
        &self,
        rule: impl Fn(&[EntityPayload]) -> Option<BackendError> + 'static,
    ) {
        *self.save_rule.borrow_mut() = Some(Box::new(rule));
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    fn enter(&self, call: Call) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(call);
        let mut failures = self.failures.borrow_mut();
        match failures.iter().position(|(pending, _)| *pending == call) {
            Some(index) => match failures.remove(index) {
                Some((_, err)) => Err(err),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn matches(query: &SearchQuery, entity: &AssetSummary) -> bool {
        if let Some(type_name) = &query.type_name {
            if &entity.type_name != type_name {
                return false;
            }
        }
        match &query.equals {
            Some((attribute, value)) => entity.attr_str(attribute) == Some(value.as_str()),
            None => true,
        }
    }
}

impl CatalogBackend for StubBackend {
    fn search_page(&self, query: &SearchQuery, from: usize) -> Result<SearchPage, BackendError> {
        self.enter(Call::Search)?;
        self.searches.borrow_mut().push((query.clone(), from));
        let matching: Vec<AssetSummary> = self
            .entities
            .borrow()
            .iter()
            .filter(|entity| Self::matches(query, entity))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        Ok(SearchPage {
            entities: matching.into_iter().skip(from).take(query.page_size).collect(),
            approximate_count: Some(total),
        })
    }

    fn save(&self, entities: &[EntityPayload]) -> Result<SaveResponse, BackendError> {
        self.enter(Call::Save)?;
        self.saves.borrow_mut().push(entities.to_vec());
        if let Some(err) = self.save_rule.borrow().as_ref().and_then(|rule| rule(entities)) {
            return Err(err);
        }
        let mut response = SaveResponse::default();
        for payload in entities {
            let qualified_name = payload.qualified_name().unwrap_or_default().to_string();
            let mut stored = self.entities.borrow_mut();
            let existing = stored.iter().find(|entity| {
                entity.type_name == payload.type_name
                    && entity.qualified_name() == Some(qualified_name.as_str())
            });
            match existing {
                Some(entity) => response.updated.push(entity.clone()),
                None => {
                    let guid = self.next_guid.get() + 1;
                    self.next_guid.set(guid);
                    let mut created =
                        AssetSummary::new(&payload.type_name).with_guid(&format!("guid-{guid}"));
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
        self.enter(Call::AddTags)?;
        self.tag_requests.borrow_mut().push((
            type_name.to_string(),
            qualified_name.to_string(),
            tag_names.to_vec(),
            propagate,
        ));
        Ok(())
    }

    fn current_user(&self) -> Result<Principal, BackendError> {
        self.enter(Call::CurrentUser)?;
        Ok(Principal {
            id: Some("u-1".to_string()),
            username: Some("jdoe".to_string()),
        })
    }

    fn list_users(&self) -> Result<Vec<Principal>, BackendError> {
        self.enter(Call::ListUsers)?;
        Ok(self.users.clone())
    }

    fn list_groups(&self) -> Result<Vec<Group>, BackendError> {
        self.enter(Call::ListGroups)?;
        Ok(self.groups.clone())
    }

    fn list_type_definitions(
        &self,
        _category: TypeCategory,
    ) -> Result<Vec<TypeDefinition>, BackendError> {
        self.enter(Call::TypeDefinitions)?;
        Ok(self.tags.clone())
    }

    fn find_role_id(&self, _name: &str) -> Result<Option<String>, BackendError> {
        self.enter(Call::FindRole)?;
        Ok(self.role_id.clone())
    }
}

/// Hands out the same backend on every connect and counts the attempts.
pub(crate) struct StubConnector {
    pub backend: Rc<dyn CatalogBackend>,
    pub connects: Cell<usize>,
    pub fail: Cell<bool>,
}

impl StubConnector {
    pub fn new(backend: Rc<dyn CatalogBackend>) -> Self {
        Self {
            backend,
            connects: Cell::new(0),
            fail: Cell::new(false),
        }
    }
}

impl Connector for StubConnector {
    fn connect(&self, _credentials: &Credentials) -> Result<ClientHandle, BackendError> {
        self.connects.set(self.connects.get() + 1);
        if self.fail.get() {
            return Err(BackendError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(ClientHandle::new(self.backend.clone()))
    }
}

pub(crate) fn asset(type_name: &str, qualified_name: &str, name: &str) -> AssetSummary {
    AssetSummary::new(type_name)
        .with_guid(&format!("guid-{qualified_name}"))
        .with_attr(attr::QUALIFIED_NAME, qualified_name)
        .with_attr(attr::NAME, name)
}

/// Gateway over `backend` plus a session already connected through it.
pub(crate) fn connected_gateway(
    backend: Rc<dyn CatalogBackend>,
    reporter: Rc<dyn crate::report::Reporter>,
) -> (crate::gateway::Gateway, crate::session::WorkflowContext) {
    let gateway = crate::gateway::Gateway::new(Box::new(StubConnector::new(backend)), reporter);
    let mut ctx = crate::session::WorkflowContext::new();
    gateway
        .connect(&mut ctx, "https://tenant.example.com", "token")
        .expect("connect");
    (gateway, ctx)
}
