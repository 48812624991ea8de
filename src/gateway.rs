//! Backend access with one transparent reconnect on a dead session.
//!
//! Every backend call goes through [`Gateway::execute`], which reads the client
//! handle from the session on each call. A reconnect replaces the stored
//! handle, so later calls in the same step pick up the new one.
use crate::backend::{BackendError, CatalogBackend, ClientHandle, Connector, Credentials, Principal};
use crate::report::Reporter;
use crate::session::WorkflowContext;
use crate::util::normalize_base_url;
use std::rc::Rc;

pub struct Gateway {
    connector: Box<dyn Connector>,
    reporter: Rc<dyn Reporter>,
}

impl Gateway {
    pub fn new(connector: Box<dyn Connector>, reporter: Rc<dyn Reporter>) -> Self {
        Self {
            connector,
            reporter,
        }
    }

    /// Establish and validate a client, then record it under the persistent keys.
    ///
    /// The store is left untouched when the connection or validation fails.
    pub fn connect(
        &self,
        ctx: &mut WorkflowContext,
        url: &str,
        api_token: &str,
    ) -> Result<Principal, BackendError> {
        let credentials = Credentials {
            base_url: normalize_base_url(url),
            api_token: api_token.trim().to_string(),
        };
        let handle = self.connector.connect(&credentials)?;
        let user = handle.backend().current_user()?;
        tracing::info!(
            base_url = %credentials.base_url,
            client_id = handle.id(),
            user = user.username.as_deref().unwrap_or("<unknown>"),
            "connected to catalog"
        );
        ctx.store_connection(&credentials, handle, user.clone());
        Ok(user)
    }

    /// Run `operation` against the active client.
    ///
    /// On a session-expired failure (including a missing handle) the client is
    /// rebuilt from stored credentials and the operation retried exactly once.
    /// Any other failure is returned as is.
    pub fn execute<T, F>(&self, ctx: &mut WorkflowContext, mut operation: F) -> Result<T, BackendError>
    where
        F: FnMut(&dyn CatalogBackend) -> Result<T, BackendError>,
    {
        let first = match ctx.client().cloned() {
            Some(handle) => operation(handle.backend()),
            None => Err(BackendError::NoActiveSession(
                "no client handle in session".to_string(),
            )),
        };
        let err = match first {
            Err(err) if err.is_session_expired() => err,
            other => return other,
        };

        tracing::warn!(error = %err, "catalog session expired; reconnecting");
        self.reporter
            .warning("Client session expired. Attempting to reconnect...");
        let handle = self.reconnect(ctx)?;
        self.reporter.success("Reconnected! Retrying operation...");
        let retried = operation(handle.backend());
        if let Err(err) = &retried {
            tracing::warn!(error = %err, client_id = handle.id(), "retry after reconnect failed");
        }
        retried
    }

    fn reconnect(&self, ctx: &mut WorkflowContext) -> Result<ClientHandle, BackendError> {
        let Some(credentials) = ctx.credentials() else {
            self.reporter
                .error("Cannot reconnect - missing credentials. Please connect again.");
            return Err(BackendError::MissingCredentials);
        };
        let handle = match self.connector.connect(&credentials) {
            Ok(handle) => handle,
            Err(err) => {
                self.reporter.error(&format!("Failed to reconnect: {err}"));
                return Err(BackendError::Reconnect(Box::new(err)));
            }
        };
        tracing::info!(client_id = handle.id(), "reconnected to catalog");
        ctx.set_client(handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
