//! Submission: turn the accumulated session state into catalog writes.
//!
//! The sequence is fixed: connection, application, owned assets, fields,
//! tags, lineage. Only the identity-producing writes (new connection, new
//! application) abort the sequence; every later step reports its own outcome
//! and nothing already saved is rolled back.
use super::fields::plan_fields;
use super::forms::{Relationships, ValidationError};
use crate::backend::entities::{owned_asset_update, Application, ApplicationField};
use crate::backend::entities::{ApplicationPatch, Connection, LineageProcess};
use crate::backend::model::{APPLICATION, CONNECTION};
use crate::backend::{AssetRef, BackendError, EntityPayload, SaveResponse};
use crate::batch::Batch;
use crate::gateway::Gateway;
use crate::labels::Labeled;
use crate::report::Reporter;
use crate::session::{clear_workflow_state, AssetDetails, EnrichmentDetails, OperationType};
use crate::session::WorkflowContext;
use crate::util::{now_epoch_secs, truncate_chars};
use serde::Serialize;
use std::rc::Rc;

const ADMIN_ROLE: &str = "$admin";

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Cannot submit: no {0} in session")]
    MissingState(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("An error occurred while {verb} the asset: {source}")]
    Backend {
        verb: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Could not extract {0} from the save response")]
    Identity(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepStatus {
    Skipped,
    Done,
    Failed(String),
}

impl StepStatus {
    fn failed(err: impl std::fmt::Display) -> Self {
        StepStatus::Failed(err.to_string())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StepStatus::Done)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Both sides written.
    Full,
    /// One side written; the relationship may not display correctly.
    Partial,
    Failed,
}

/// Outcome of the two-sided owned-assets write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnedAssetsOutcome {
    pub requested: usize,
    /// Sides written, 0 to 2.
    pub success_count: u8,
    pub application_side: StepStatus,
    pub asset_side: StepStatus,
    /// Assets written by batched saves, counted up to the first failed chunk.
    pub batch_saved: usize,
    /// Assets updated one at a time after a batch failed. Only the assets
    /// no earlier chunk saved are retried.
    pub individually_updated: Option<usize>,
}

impl OwnedAssetsOutcome {
    pub fn state(&self) -> LinkState {
        match self.success_count {
            0 => LinkState::Failed,
            1 => LinkState::Partial,
            _ => LinkState::Full,
        }
    }
}

/// What each step of a submission did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReport {
    pub operation: OperationType,
    pub application_name: String,
    pub application_qualified_name: String,
    pub connection_qualified_name: Option<String>,
    pub connection: StepStatus,
    pub owned_assets: Option<OwnedAssetsOutcome>,
    pub fields: StepStatus,
    pub fields_created: usize,
    pub fields_updated: usize,
    pub tags: StepStatus,
    pub upstream_lineage: StepStatus,
    pub downstream_lineage: StepStatus,
    pub asset_url: Option<String>,
}

/// What reached the catalog from a run of batched saves.
#[derive(Debug, Default, Clone, Copy)]
struct BatchProgress {
    saved: usize,
    created: usize,
    updated: usize,
}

/// A batched save that stopped at a failed chunk. `progress` covers the
/// chunks accepted before it.
struct BatchFailure {
    progress: BatchProgress,
    source: BackendError,
}

/// Relationship labels resolved against the stored search results.
struct ResolvedLinks {
    owned: Option<Vec<AssetRef>>,
    upstream: Vec<AssetRef>,
    downstream: Vec<AssetRef>,
}

fn resolve(labels: &[String], results: &Labeled<AssetRef>) -> Result<Vec<AssetRef>, ValidationError> {
    labels
        .iter()
        .map(|label| {
            results
                .get(label)
                .cloned()
                .ok_or_else(|| ValidationError::UnknownLabel(label.clone()))
        })
        .collect()
}

pub struct Submitter {
    gateway: Rc<Gateway>,
    reporter: Rc<dyn Reporter>,
    field_batch_size: usize,
}

impl Submitter {
    pub fn new(gateway: Rc<Gateway>, reporter: Rc<dyn Reporter>, field_batch_size: usize) -> Self {
        Self {
            gateway,
            reporter,
            field_batch_size,
        }
    }

    /// Run the full write sequence. On success the workflow state is cleared;
    /// on error it is left as is so the user can retry from the same step.
    pub fn submit(
        &self,
        ctx: &mut WorkflowContext,
        relationships: &Relationships,
    ) -> Result<SubmissionReport, SubmitError> {
        let operation = ctx
            .operation_type()
            .ok_or(SubmitError::MissingState("operation type"))?;
        let details = ctx
            .asset_details()
            .cloned()
            .ok_or(SubmitError::MissingState("asset details"))?;
        let enrichment = ctx
            .enrichment_details()
            .cloned()
            .ok_or(SubmitError::MissingState("enrichment details"))?;
        let results = ctx.search_results().cloned().unwrap_or_default();
        let links = ResolvedLinks {
            owned: match &relationships.owned_assets {
                Some(labels) => Some(resolve(labels, &results)?),
                None => None,
            },
            upstream: resolve(&relationships.upstream, &results)?,
            downstream: resolve(&relationships.downstream, &results)?,
        };
        let verb = operation.verb();
        tracing::info!(
            operation = verb,
            name = %details.name,
            fields = details.fields.len(),
            "submission started"
        );

        let (connection_qualified_name, connection) =
            if operation == OperationType::Create && details.create_new_connection {
                let qualified_name = self.create_connection(ctx, &details)?;
                (Some(qualified_name), StepStatus::Done)
            } else {
                (details.connection_qualified_name.clone(), StepStatus::Skipped)
            };

        let patch = ApplicationPatch::from_inputs(
            &details.app_id,
            &enrichment.description,
            &enrichment.owner_users,
            &enrichment.owner_groups,
        );
        let application_qualified_name = match operation {
            OperationType::Update => self.update_application(ctx, &details, &patch)?,
            OperationType::Create => {
                let connection = connection_qualified_name
                    .as_deref()
                    .ok_or(ValidationError::MissingConnection)?;
                self.create_application(ctx, &details, connection, &patch)?
            }
        };

        let owned_assets = links.owned.as_ref().map(|owned| {
            self.reconcile_owned_assets(ctx, &application_qualified_name, &details.name, owned)
        });

        let (fields, fields_created, fields_updated) =
            self.reconcile_fields(ctx, &details, &application_qualified_name);

        let tags = self.assign_tags(ctx, &enrichment, &application_qualified_name);

        let application_ref = AssetRef::new(APPLICATION, &application_qualified_name, &details.name);
        let upstream_lineage = self.build_lineage(
            ctx,
            &format!("{} Upstream Lineage", details.name),
            connection_qualified_name.as_deref(),
            links.upstream,
            vec![application_ref.clone()],
        );
        let downstream_lineage = self.build_lineage(
            ctx,
            &format!("{} Downstream Lineage", details.name),
            connection_qualified_name.as_deref(),
            vec![application_ref],
            links.downstream,
        );

        let asset_url = match operation {
            OperationType::Update => ctx.base_url().map(|base| {
                match ctx.selected_application().and_then(|app| app.guid.as_deref()) {
                    Some(guid) => format!("{base}/assets/{guid}/overview"),
                    None => format!("{base}/assets"),
                }
            }),
            OperationType::Create => None,
        };
        match (operation, &asset_url) {
            (OperationType::Update, Some(url)) => self.reporter.success(&format!(
                "Successfully updated Application: {} ({url})",
                details.name
            )),
            (OperationType::Update, None) => self
                .reporter
                .success(&format!("Successfully updated Application: {}", details.name)),
            (OperationType::Create, _) => self
                .reporter
                .success(&format!("Successfully created Application: {}", details.name)),
        }

        let report = SubmissionReport {
            operation,
            application_name: details.name.clone(),
            application_qualified_name,
            connection_qualified_name,
            connection,
            owned_assets,
            fields,
            fields_created,
            fields_updated,
            tags,
            upstream_lineage,
            downstream_lineage,
            asset_url,
        };
        tracing::info!(
            operation = verb,
            qualified_name = %report.application_qualified_name,
            fields_created = report.fields_created,
            fields_updated = report.fields_updated,
            "submission finished"
        );
        clear_workflow_state(ctx);
        Ok(report)
    }

    fn save(
        &self,
        ctx: &mut WorkflowContext,
        entities: &[EntityPayload],
    ) -> Result<SaveResponse, BackendError> {
        self.gateway.execute(ctx, |backend| backend.save(entities))
    }

    /// Best effort; a missing or unreachable role is not an error.
    fn admin_role_id(&self, ctx: &mut WorkflowContext) -> Option<String> {
        match self
            .gateway
            .execute(ctx, |backend| backend.find_role_id(ADMIN_ROLE))
        {
            Ok(id) => id,
            Err(err) => {
                tracing::debug!(error = %err, "admin role lookup failed; continuing without it");
                None
            }
        }
    }

    fn create_connection(
        &self,
        ctx: &mut WorkflowContext,
        details: &AssetDetails,
    ) -> Result<String, SubmitError> {
        let name = details
            .new_connection_name
            .as_deref()
            .ok_or(ValidationError::MissingNewConnectionName)?;
        self.reporter
            .info(&format!("Creating a new API connection named '{name}'..."));
        let admin_users: Vec<String> = ctx
            .user()
            .and_then(|user| user.username.clone())
            .into_iter()
            .collect();
        let admin_roles: Vec<String> = self.admin_role_id(ctx).into_iter().collect();
        let connection = Connection::creator(name, now_epoch_secs(), admin_users, admin_roles);

        let response = self
            .save(ctx, &[connection.to_payload()])
            .map_err(|source| SubmitError::Backend {
                verb: OperationType::Create.verb(),
                source,
            })?;
        let qualified_name = response
            .created_of_type(CONNECTION)
            .find_map(|created| created.qualified_name())
            .map(str::to_string)
            .ok_or(SubmitError::Identity("connection"))?;
        tracing::info!(step = "connection", %qualified_name, "connection created");
        self.reporter.success(&format!(
            "Connection '{name}' created successfully with qualified_name: {qualified_name}"
        ));
        Ok(qualified_name)
    }

    fn update_application(
        &self,
        ctx: &mut WorkflowContext,
        details: &AssetDetails,
        patch: &ApplicationPatch,
    ) -> Result<String, SubmitError> {
        let qualified_name = details
            .qualified_name
            .clone()
            .ok_or(SubmitError::MissingState("application qualified name"))?;
        let mut application = Application::updater(&qualified_name, &details.name);
        application.merge(patch);
        if let Some(description) = &patch.description {
            self.reporter.info(&format!(
                "Updated description: {}...",
                truncate_chars(description, 50)
            ));
        }

        let response = self
            .save(ctx, &[application.to_payload()])
            .map_err(|source| SubmitError::Backend {
                verb: OperationType::Update.verb(),
                source,
            })?;
        match response.updated_of_type(APPLICATION).next() {
            Some(_) => self.reporter.success(&format!(
                "Application updated successfully: {qualified_name}"
            )),
            // Identity is already known in update mode.
            None => {
                tracing::warn!(%qualified_name, "save response did not list the updated application");
                self.reporter
                    .warning("Could not extract updated application from response");
            }
        }
        Ok(qualified_name)
    }

    fn create_application(
        &self,
        ctx: &mut WorkflowContext,
        details: &AssetDetails,
        connection_qualified_name: &str,
        patch: &ApplicationPatch,
    ) -> Result<String, SubmitError> {
        let mut application = Application::creator(&details.name, connection_qualified_name);
        application.merge(patch);

        let response = self
            .save(ctx, &[application.to_payload()])
            .map_err(|source| SubmitError::Backend {
                verb: OperationType::Create.verb(),
                source,
            })?;
        let qualified_name = response
            .created_of_type(APPLICATION)
            .find_map(|created| created.qualified_name())
            .map(str::to_string)
            .ok_or(SubmitError::Identity("application"))?;
        tracing::info!(step = "application", %qualified_name, "application created");
        self.reporter.success(&format!(
            "Application created successfully with qualified_name: {qualified_name}"
        ));
        Ok(qualified_name)
    }

    /// Write both halves of the owned-assets link. Each half is attempted
    /// regardless of the other; a failed asset batch falls back to one save
    /// per asset.
    fn reconcile_owned_assets(
        &self,
        ctx: &mut WorkflowContext,
        application_qualified_name: &str,
        application_name: &str,
        owned: &[AssetRef],
    ) -> OwnedAssetsOutcome {
        let mut outcome = OwnedAssetsOutcome {
            requested: owned.len(),
            success_count: 0,
            application_side: StepStatus::Skipped,
            asset_side: StepStatus::Skipped,
            batch_saved: 0,
            individually_updated: None,
        };
        if owned.is_empty() {
            self.reporter.info("Clearing owned assets (none selected)...");
        } else {
            self.reporter.info(&format!(
                "Setting {} owned assets with bidirectional relationship...",
                owned.len()
            ));
        }

        let mut application = Application::updater(application_qualified_name, application_name);
        application.owned_assets = Some(owned.to_vec());
        match self.save(ctx, &[application.to_payload()]) {
            Ok(_) => {
                outcome.success_count += 1;
                outcome.application_side = StepStatus::Done;
                self.reporter
                    .success("Successfully updated Application-side relationship");
            }
            Err(err) => {
                tracing::warn!(error = %err, "owned assets: application side failed");
                self.reporter
                    .warning(&format!("Application-side relationship update failed: {err}"));
                outcome.application_side = StepStatus::failed(err);
            }
        }

        if !owned.is_empty() {
            let payloads = owned
                .iter()
                .map(|asset| owned_asset_update(asset, application_qualified_name));
            match self.save_in_batches(ctx, payloads) {
                Ok(progress) => {
                    outcome.batch_saved = progress.saved;
                    outcome.success_count += 1;
                    outcome.asset_side = StepStatus::Done;
                    self.reporter.success(&format!(
                        "Successfully updated {} assets with applicationQualifiedName",
                        owned.len()
                    ));
                }
                Err(BatchFailure {
                    progress,
                    source: err,
                }) => {
                    outcome.batch_saved = progress.saved;
                    tracing::warn!(
                        error = %err,
                        batch_saved = progress.saved,
                        "owned assets: batch failed, updating individually"
                    );
                    self.reporter.warning(&format!(
                        "Batch update of owned assets failed: {err}. Trying individual updates..."
                    ));
                    if progress.saved > 0 {
                        self.reporter.info(&format!(
                            "{}/{} assets were already saved before the failed batch",
                            progress.saved,
                            owned.len()
                        ));
                    }
                    let remaining = owned.get(progress.saved..).unwrap_or_default();
                    let updated =
                        self.update_owned_individually(ctx, application_qualified_name, remaining);
                    outcome.individually_updated = Some(updated);
                    if progress.saved + updated > 0 {
                        outcome.success_count += 1;
                        outcome.asset_side = StepStatus::Done;
                        self.reporter.success(&format!(
                            "Updated {updated}/{} assets individually",
                            remaining.len()
                        ));
                    } else {
                        outcome.asset_side = StepStatus::failed(err);
                    }
                }
            }
        }

        match outcome.state() {
            LinkState::Full => self.reporter.success(
                "Owned assets relationship fully established: both sides have been set.",
            ),
            LinkState::Partial => self.reporter.warning(
                "Partial success: only one side of the relationship was set. Owned assets may not display properly.",
            ),
            LinkState::Failed => {
                self.reporter
                    .error("Failed to establish owned assets relationship.");
                self.reporter.info(
                    "The Application itself was saved, but its owned assets may need to be linked manually.",
                );
            }
        }
        tracing::info!(
            step = "owned_assets",
            requested = outcome.requested,
            success_count = outcome.success_count,
            "owned assets reconciled"
        );
        outcome
    }

    /// Save `payloads` in bounded chunks, stopping at the first rejected one.
    fn save_in_batches(
        &self,
        ctx: &mut WorkflowContext,
        payloads: impl IntoIterator<Item = EntityPayload>,
    ) -> Result<BatchProgress, BatchFailure> {
        let mut batch = Batch::new(&self.gateway, self.field_batch_size);
        let mut result = Ok(());
        for payload in payloads {
            if let Err(err) = batch.add(ctx, payload) {
                result = Err(err);
                break;
            }
        }
        if result.is_ok() {
            result = batch.flush(ctx).map(drop);
        }
        let progress = BatchProgress {
            saved: batch.saved(),
            created: batch.created(),
            updated: batch.updated(),
        };
        result
            .map(|()| progress)
            .map_err(|source| BatchFailure { progress, source })
    }

    fn update_owned_individually(
        &self,
        ctx: &mut WorkflowContext,
        application_qualified_name: &str,
        owned: &[AssetRef],
    ) -> usize {
        let mut updated = 0;
        for asset in owned {
            let payload = owned_asset_update(asset, application_qualified_name);
            match self.save(ctx, std::slice::from_ref(&payload)) {
                Ok(_) => updated += 1,
                Err(err) => {
                    tracing::warn!(error = %err, qualified_name = %asset.qualified_name, "owned asset update failed");
                    self.reporter
                        .warning(&format!("Failed: {} - {err}", asset.qualified_name));
                }
            }
        }
        updated
    }

    fn reconcile_fields(
        &self,
        ctx: &mut WorkflowContext,
        details: &AssetDetails,
        application_qualified_name: &str,
    ) -> (StepStatus, usize, usize) {
        if details.fields.is_empty() {
            return (StepStatus::Skipped, 0, 0);
        }
        let plan = plan_fields(&details.fields, application_qualified_name);
        let (created, create_failure) = self.write_fields(ctx, &plan.create, "create");
        let (updated, update_failure) = self.write_fields(ctx, &plan.update, "update");
        let status = match update_failure.or(create_failure) {
            Some(detail) => StepStatus::Failed(detail),
            None => StepStatus::Done,
        };
        tracing::info!(
            step = "fields",
            created,
            updated,
            skipped = plan.skipped,
            "fields reconciled"
        );
        (status, created, updated)
    }

    /// Returns how many fields reached the catalog, plus the failure detail
    /// when a chunk was rejected. Chunks saved before the failure still count.
    fn write_fields(
        &self,
        ctx: &mut WorkflowContext,
        fields: &[ApplicationField],
        action: &str,
    ) -> (usize, Option<String>) {
        if fields.is_empty() {
            return (0, None);
        }
        let result = self.save_in_batches(ctx, fields.iter().map(ApplicationField::to_payload));
        match result {
            Ok(progress) => {
                tracing::debug!(
                    action,
                    created = progress.created,
                    updated = progress.updated,
                    "field batches saved"
                );
                self.reporter
                    .success(&format!("Fields to {action}: {} saved", progress.saved));
                (progress.saved, None)
            }
            Err(BatchFailure { progress, source }) => {
                tracing::warn!(
                    error = %source,
                    action,
                    saved = progress.saved,
                    total = fields.len(),
                    "field batch failed"
                );
                let detail = format!("{source} ({}/{} saved)", progress.saved, fields.len());
                self.reporter
                    .warning(&format!("Could not {action} fields: {detail}"));
                (progress.saved, Some(detail))
            }
        }
    }

    fn assign_tags(
        &self,
        ctx: &mut WorkflowContext,
        enrichment: &EnrichmentDetails,
        application_qualified_name: &str,
    ) -> StepStatus {
        if enrichment.tag_names.is_empty() {
            return StepStatus::Skipped;
        }
        let result = self.gateway.execute(ctx, |backend| {
            backend.add_tags(
                APPLICATION,
                application_qualified_name,
                &enrichment.tag_names,
                true,
            )
        });
        match result {
            Ok(()) => {
                self.reporter.success(&format!(
                    "Applied tags: {}",
                    enrichment.tag_names.join(", ")
                ));
                StepStatus::Done
            }
            Err(err) => {
                tracing::warn!(error = %err, "tag assignment failed");
                self.reporter.warning(&format!("Could not apply tags: {err}"));
                StepStatus::failed(err)
            }
        }
    }

    /// One lineage process from `inputs` to `outputs`; skipped when the
    /// selected side is empty.
    fn build_lineage(
        &self,
        ctx: &mut WorkflowContext,
        name: &str,
        connection_qualified_name: Option<&str>,
        inputs: Vec<AssetRef>,
        outputs: Vec<AssetRef>,
    ) -> StepStatus {
        if inputs.is_empty() || outputs.is_empty() {
            return StepStatus::Skipped;
        }
        let Some(connection) = connection_qualified_name else {
            self.reporter
                .warning(&format!("Cannot create '{name}': application has no connection"));
            return StepStatus::failed("no connection qualified name");
        };
        let process = LineageProcess::creator(name, connection, inputs, outputs);
        match self.save(ctx, &[process.to_payload()]) {
            Ok(_) => {
                tracing::info!(step = "lineage", name, qualified_name = %process.qualified_name, "lineage saved");
                self.reporter.success(&format!("Created lineage process '{name}'"));
                StepStatus::Done
            }
            Err(err) => {
                tracing::warn!(error = %err, name, "lineage save failed");
                self.reporter
                    .warning(&format!("Could not create lineage '{name}': {err}"));
                StepStatus::failed(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
