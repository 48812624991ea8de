//! Catalog backend contract and the handles the workflow holds onto.
//!
//! The workflow never talks to HTTP directly. It goes through
//! [`CatalogBackend`], reached via a [`ClientHandle`] stored in the session so
//! the gateway can swap it out after a reconnect.
pub mod entities;
pub mod error;
pub mod http;
pub mod model;
pub mod search;
#[cfg(test)]
pub(crate) mod testing;

pub use error::BackendError;
pub use model::{AssetRef, AssetSummary, EntityPayload, Group, Principal, SaveResponse};
pub use model::{TypeCategory, TypeDefinition};
pub use search::{SearchPage, SearchQuery};

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operations the workflow needs from the catalog.
pub trait CatalogBackend {
    /// One page of an index search starting at offset `from`.
    fn search_page(&self, query: &SearchQuery, from: usize) -> Result<SearchPage, BackendError>;

    /// Upsert entities in one request.
    fn save(&self, entities: &[EntityPayload]) -> Result<SaveResponse, BackendError>;

    /// Attach tags (by display name) to the entity identified by type and qualified name.
    fn add_tags(
        &self,
        type_name: &str,
        qualified_name: &str,
        tag_names: &[String],
        propagate: bool,
    ) -> Result<(), BackendError>;

    fn current_user(&self) -> Result<Principal, BackendError>;

    fn list_users(&self) -> Result<Vec<Principal>, BackendError>;

    fn list_groups(&self) -> Result<Vec<Group>, BackendError>;

    fn list_type_definitions(
        &self,
        category: TypeCategory,
    ) -> Result<Vec<TypeDefinition>, BackendError>;

    /// Id of the role with this name; `None` when no such role exists.
    fn find_role_id(&self, name: &str) -> Result<Option<String>, BackendError>;
}

/// URL and API token used to (re)establish a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub api_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// A live backend client plus a process-unique identity.
///
/// Clones share the client and the identity; a reconnect produces a new
/// handle with a new id, which invalidates anything cached per client.
#[derive(Clone)]
pub struct ClientHandle {
    id: u64,
    backend: Rc<dyn CatalogBackend>,
}

impl ClientHandle {
    pub fn new(backend: Rc<dyn CatalogBackend>) -> Self {
        Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            backend,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn backend(&self) -> &dyn CatalogBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Builds client handles from credentials.
pub trait Connector {
    fn connect(&self, credentials: &Credentials) -> Result<ClientHandle, BackendError>;
}
