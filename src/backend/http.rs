//! Blocking REST client for the catalog.
//!
//! Request bodies and response parsing are plain functions over JSON so they
//! can be tested without a server.
use super::error::BackendError;
use super::model::{attr, AssetSummary, Group, Principal, SaveResponse, TypeCategory};
use super::model::{EntityPayload, TypeDefinition};
use super::search::{SearchPage, SearchQuery};
use super::{CatalogBackend, ClientHandle, Connector, Credentials};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::rc::Rc;
use std::time::{Duration, Instant};
use ureq::Agent;

const SEARCH_PATH: &str = "/api/meta/search/indexsearch";
const BULK_PATH: &str = "/api/meta/entity/bulk";
const TYPEDEFS_PATH: &str = "/api/meta/types/typedefs";
const CURRENT_USER_PATH: &str = "/api/service/users/current";
const USERS_PATH: &str = "/api/service/users";
const GROUPS_PATH: &str = "/api/service/groups";
const ROLES_PATH: &str = "/api/service/roles";
const LIST_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

/// Catalog backend over HTTP with bearer-token auth.
pub struct HttpCatalog {
    agent: Agent,
    base_url: String,
    api_token: String,
}

impl HttpCatalog {
    pub fn new(credentials: &Credentials, timeouts: Timeouts) -> Self {
        let config = Agent::config_builder()
            .timeout_connect(Some(timeouts.connect))
            .timeout_recv_response(Some(timeouts.read))
            .timeout_recv_body(Some(timeouts.read))
            .http_status_as_error(false)
            .build();
        Self {
            agent: Agent::new_with_config(config),
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            api_token: credentials.api_token.clone(),
        }
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, BackendError> {
        self.send("GET", path, query, None)
    }

    fn post(&self, path: &str, query: &[(&str, String)], body: &Value) -> Result<Value, BackendError> {
        self.send("POST", path, query, Some(body))
    }

    fn send(
        &self,
        method: &'static str,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let auth = format!("Bearer {}", self.api_token);
        let started = Instant::now();
        let result = match body {
            Some(body) => {
                let mut request = self.agent.post(&url).header("Authorization", auth.as_str());
                for (key, value) in query {
                    request = request.query(*key, value);
                }
                request.send_json(body)
            }
            None => {
                let mut request = self.agent.get(&url).header("Authorization", auth.as_str());
                for (key, value) in query {
                    request = request.query(*key, value);
                }
                request.call()
            }
        };
        let mut response =
            result.map_err(|err| BackendError::transport(method, &url, err.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|err| BackendError::transport(method, &url, err.to_string()))?;
        tracing::debug!(
            method,
            path,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "catalog request"
        );
        if !(200..300).contains(&status) {
            return Err(BackendError::from_status(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| BackendError::Decode(format!("{path}: {err}")))
    }

    /// Walk an offset-paged admin listing until the reported total is reached.
    fn list_records<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, BackendError> {
        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let query = [
                ("limit", LIST_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ];
            let page = self.get(path, &query)?;
            let (batch, total) = parse_record_page::<T>(&page, path)?;
            let fetched = batch.len();
            records.extend(batch);
            offset += fetched;
            if fetched < LIST_PAGE_SIZE || total.is_some_and(|total| offset as u64 >= total) {
                return Ok(records);
            }
        }
    }
}

impl CatalogBackend for HttpCatalog {
    fn search_page(&self, query: &SearchQuery, from: usize) -> Result<SearchPage, BackendError> {
        let response = self.post(SEARCH_PATH, &[], &index_search_body(query, from))?;
        parse_search_page(response)
    }

    fn save(&self, entities: &[EntityPayload]) -> Result<SaveResponse, BackendError> {
        let body = json!({ "entities": entities });
        let response = self.post(BULK_PATH, &[], &body)?;
        parse_mutations(&response)
    }

    fn add_tags(
        &self,
        type_name: &str,
        qualified_name: &str,
        tag_names: &[String],
        propagate: bool,
    ) -> Result<(), BackendError> {
        let definitions = self.list_type_definitions(TypeCategory::Classification)?;
        let internal = internal_tag_names(&definitions, tag_names)?;
        let body = classification_body(&internal, propagate);
        let path = format!("/api/meta/entity/uniqueAttribute/type/{type_name}/classifications");
        let query = [("attr:qualifiedName", qualified_name.to_string())];
        self.post(&path, &query, &body)?;
        Ok(())
    }

    fn current_user(&self) -> Result<Principal, BackendError> {
        let response = self.get(CURRENT_USER_PATH, &[])?;
        serde_json::from_value(response)
            .map_err(|err| BackendError::Decode(format!("{CURRENT_USER_PATH}: {err}")))
    }

    fn list_users(&self) -> Result<Vec<Principal>, BackendError> {
        self.list_records(USERS_PATH)
    }

    fn list_groups(&self) -> Result<Vec<Group>, BackendError> {
        self.list_records(GROUPS_PATH)
    }

    fn list_type_definitions(
        &self,
        category: TypeCategory,
    ) -> Result<Vec<TypeDefinition>, BackendError> {
        let response = self.get(TYPEDEFS_PATH, &[("type", category.as_str().to_string())])?;
        parse_type_definitions(&response, category)
    }

    fn find_role_id(&self, name: &str) -> Result<Option<String>, BackendError> {
        let filter = json!({ "name": name }).to_string();
        let response = self.get(ROLES_PATH, &[("filter", filter)])?;
        Ok(response
            .get("records")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|role| role.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|role| role.get("id").and_then(Value::as_str))
            .map(str::to_string))
    }
}

/// Builds [`HttpCatalog`] handles with fixed timeouts.
pub struct HttpConnector {
    timeouts: Timeouts,
}

impl HttpConnector {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, credentials: &Credentials) -> Result<ClientHandle, BackendError> {
        if credentials.base_url.trim().is_empty() || credentials.api_token.trim().is_empty() {
            return Err(BackendError::MissingCredentials);
        }
        let catalog = HttpCatalog::new(credentials, self.timeouts);
        Ok(ClientHandle::new(Rc::new(catalog)))
    }
}

/// Elasticsearch DSL for an index search page, sorted by guid for stable paging.
pub fn index_search_body(query: &SearchQuery, from: usize) -> Value {
    let mut filters = Vec::new();
    if let Some(type_name) = &query.type_name {
        filters.push(json!({ "term": { "__typeName.keyword": { "value": type_name } } }));
    }
    if query.active_only {
        filters.push(json!({ "term": { "__state": { "value": "ACTIVE" } } }));
    }
    if let Some((attribute, value)) = &query.equals {
        filters.push(json!({ "term": { keyword_field(attribute): { "value": value } } }));
    }
    json!({
        "dsl": {
            "from": from,
            "size": query.page_size,
            "query": { "bool": { "filter": filters } },
            "sort": [ { "__guid": { "order": "asc" } } ],
        },
        "attributes": query.attributes,
        "suppressLogs": true,
    })
}

/// Text attributes are indexed with a `.keyword` subfield for exact matches.
fn keyword_field(attribute: &str) -> String {
    match attribute {
        attr::NAME | attr::DESCRIPTION => format!("{attribute}.keyword"),
        other => other.to_string(),
    }
}

pub fn parse_search_page(response: Value) -> Result<SearchPage, BackendError> {
    let approximate_count = response.get("approximateCount").and_then(Value::as_u64);
    let entities = match response.get("entities") {
        None | Some(Value::Null) => Vec::new(),
        Some(entities) => serde_json::from_value::<Vec<AssetSummary>>(entities.clone())
            .map_err(|err| BackendError::Decode(format!("search entities: {err}")))?,
    };
    Ok(SearchPage {
        entities,
        approximate_count,
    })
}

pub fn parse_mutations(response: &Value) -> Result<SaveResponse, BackendError> {
    let mutated = response.get("mutatedEntities");
    let read = |key: &str| -> Result<Vec<AssetSummary>, BackendError> {
        match mutated.and_then(|value| value.get(key)) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(entities) => serde_json::from_value(entities.clone())
                .map_err(|err| BackendError::Decode(format!("mutated {key}: {err}"))),
        }
    };
    let mut updated = read("UPDATE")?;
    updated.extend(read("PARTIAL_UPDATE")?);
    Ok(SaveResponse {
        created: read("CREATE")?,
        updated,
    })
}

fn parse_record_page<T: DeserializeOwned>(
    page: &Value,
    path: &str,
) -> Result<(Vec<T>, Option<u64>), BackendError> {
    let records = match page.get("records") {
        None | Some(Value::Null) => Vec::new(),
        Some(records) => serde_json::from_value(records.clone())
            .map_err(|err| BackendError::Decode(format!("{path}: {err}")))?,
    };
    let total = page
        .get("filterRecord")
        .or_else(|| page.get("totalRecord"))
        .and_then(Value::as_u64);
    Ok((records, total))
}

fn parse_type_definitions(
    response: &Value,
    category: TypeCategory,
) -> Result<Vec<TypeDefinition>, BackendError> {
    let key = match category {
        TypeCategory::Classification => "classificationDefs",
    };
    match response.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(defs) => serde_json::from_value(defs.clone())
            .map_err(|err| BackendError::Decode(format!("{key}: {err}"))),
    }
}

/// Map tag display names to the internal names the catalog stores.
pub fn internal_tag_names(
    definitions: &[TypeDefinition],
    display_names: &[String],
) -> Result<Vec<String>, BackendError> {
    display_names
        .iter()
        .map(|display| {
            definitions
                .iter()
                .find(|def| def.display_name.as_deref() == Some(display.as_str()))
                .map(|def| def.name.clone())
                .ok_or_else(|| BackendError::UnknownTag(display.clone()))
        })
        .collect()
}

fn classification_body(internal_names: &[String], propagate: bool) -> Value {
    Value::Array(
        internal_names
            .iter()
            .map(|name| {
                json!({
                    "typeName": name,
                    "propagate": propagate,
                    "removePropagationsOnEntityDelete": true,
                    "restrictPropagationThroughLineage": false,
                })
            })
            .collect(),
    )
}
