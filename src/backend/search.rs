use super::error::BackendError;
use super::model::{attr, AssetSummary};
use super::CatalogBackend;

/// Index search request: type filter, active-only filter, one optional
/// equality filter, and the attributes to project.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub type_name: Option<String>,
    pub active_only: bool,
    pub equals: Option<(String, String)>,
    pub attributes: Vec<String>,
    pub page_size: usize,
}

impl SearchQuery {
    pub fn new(page_size: usize) -> Self {
        Self {
            type_name: None,
            active_only: false,
            equals: None,
            attributes: vec![attr::NAME.to_string(), attr::QUALIFIED_NAME.to_string()],
            page_size: page_size.max(1),
        }
    }

    pub fn of_type(mut self, type_name: &str) -> Self {
        self.type_name = Some(type_name.to_string());
        self
    }

    pub fn active(mut self) -> Self {
        self.active_only = true;
        self
    }

    /// Exact match on an attribute's keyword value.
    pub fn where_eq(mut self, attribute: &str, value: &str) -> Self {
        self.equals = Some((attribute.to_string(), value.to_string()));
        self
    }

    pub fn include(mut self, attributes: &[&str]) -> Self {
        for attribute in attributes {
            if !self.attributes.iter().any(|existing| existing == attribute) {
                self.attributes.push((*attribute).to_string());
            }
        }
        self
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub entities: Vec<AssetSummary>,
    pub approximate_count: Option<u64>,
}

/// Iterator that fetches pages on demand until a short or empty page.
///
/// Callers bound the scan by taking only what they need; nothing beyond the
/// page currently being consumed is requested.
pub struct SearchResults<'b> {
    backend: &'b dyn CatalogBackend,
    query: SearchQuery,
    buffer: std::vec::IntoIter<AssetSummary>,
    next_from: usize,
    exhausted: bool,
}

pub fn paged<'b>(backend: &'b dyn CatalogBackend, query: SearchQuery) -> SearchResults<'b> {
    SearchResults {
        backend,
        query,
        buffer: Vec::new().into_iter(),
        next_from: 0,
        exhausted: false,
    }
}

impl SearchResults<'_> {
    fn fetch_next(&mut self) -> Result<(), BackendError> {
        let page = self.backend.search_page(&self.query, self.next_from)?;
        let fetched = page.entities.len();
        self.next_from += fetched;
        let reached_count = page
            .approximate_count
            .is_some_and(|count| self.next_from as u64 >= count);
        if fetched < self.query.page_size || reached_count {
            self.exhausted = true;
        }
        self.buffer = page.entities.into_iter();
        Ok(())
    }
}

impl Iterator for SearchResults<'_> {
    type Item = Result<AssetSummary, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entity) = self.buffer.next() {
                return Some(Ok(entity));
            }
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.fetch_next() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
    }
}
