//! Bounded-size buffering of entity writes.
//!
//! A batch bounds request size. It is not a transaction: each flush is one
//! save, and what the catalog does with a partly invalid save is up to it.
use crate::backend::{BackendError, EntityPayload, SaveResponse};
use crate::gateway::Gateway;
use crate::session::WorkflowContext;

pub struct Batch<'g> {
    gateway: &'g Gateway,
    max_size: usize,
    pending: Vec<EntityPayload>,
    saved: usize,
    created: usize,
    updated: usize,
}

impl<'g> Batch<'g> {
    pub fn new(gateway: &'g Gateway, max_size: usize) -> Self {
        Self {
            gateway,
            max_size: max_size.max(1),
            pending: Vec::new(),
            saved: 0,
            created: 0,
            updated: 0,
        }
    }

    /// Buffer `entity`; a full buffer is flushed immediately.
    pub fn add(
        &mut self,
        ctx: &mut WorkflowContext,
        entity: EntityPayload,
    ) -> Result<Option<SaveResponse>, BackendError> {
        self.pending.push(entity);
        if self.pending.len() >= self.max_size {
            return self.flush(ctx).map(Some);
        }
        Ok(None)
    }

    /// Send everything buffered. An empty buffer makes no backend call.
    pub fn flush(&mut self, ctx: &mut WorkflowContext) -> Result<SaveResponse, BackendError> {
        if self.pending.is_empty() {
            return Ok(SaveResponse::default());
        }
        let entities = std::mem::take(&mut self.pending);
        let response = self
            .gateway
            .execute(ctx, |backend| backend.save(&entities))?;
        self.saved += entities.len();
        self.created += response.created.len();
        self.updated += response.updated.len();
        tracing::debug!(
            flushed = entities.len(),
            created = response.created.len(),
            updated = response.updated.len(),
            "batch flushed"
        );
        Ok(response)
    }

    /// Current buffer depth.
    pub fn size(&self) -> usize {
        self.pending.len()
    }

    /// Entities sent in flushes the catalog accepted. Flushes go out in
    /// add order, so these are always the first `saved` entities added.
    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn updated(&self) -> usize {
        self.updated
    }
}
