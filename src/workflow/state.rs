//! Step selection derived from session contents.
//!
//! The active step is never stored. It is recomputed from key presence, and
//! going back means deleting the key that gates the current step.
use crate::session::{OperationType, SessionKey, Snapshot, WorkflowContext};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ChooseOperation,
    SelectExistingApplication,
    DefineAsset,
    Enrich,
    RelationshipsAndSubmit,
}

impl Step {
    pub fn title(&self, operation: Option<OperationType>) -> &'static str {
        let update = operation.is_some_and(|op| op.is_update());
        match (self, update) {
            (Step::ChooseOperation, _) => "Choose an operation",
            (Step::SelectExistingApplication, _) => "Step 1: Select Application to Update",
            (Step::DefineAsset, false) => "Step 1: Define Application Asset",
            (Step::DefineAsset, true) => "Step 2: Update Application Details",
            (Step::Enrich, false) => "Step 2: Add Enrichment Details",
            (Step::Enrich, true) => "Step 3: Update Enrichment Details",
            (Step::RelationshipsAndSubmit, false) => "Step 3: Define Relationships & Submit",
            (Step::RelationshipsAndSubmit, true) => "Step 4: Update Relationships & Submit",
        }
    }
}

/// Pure function of key presence; first matching rule wins.
pub fn current_step(snapshot: &Snapshot) -> Step {
    match snapshot.operation_type {
        None => Step::ChooseOperation,
        Some(OperationType::Update) if !snapshot.has_selected_application => {
            Step::SelectExistingApplication
        }
        Some(_) if !snapshot.has_asset_details => Step::DefineAsset,
        Some(_) if !snapshot.has_enrichment_details => Step::Enrich,
        Some(_) => Step::RelationshipsAndSubmit,
    }
}

/// Step back by deleting the key that gates the current step.
///
/// Returns the step now active. Going back from the first step is a no-op.
pub fn go_back(ctx: &mut WorkflowContext) -> Step {
    match current_step(&ctx.snapshot()) {
        Step::ChooseOperation => {}
        Step::SelectExistingApplication => {
            ctx.remove(SessionKey::OperationType);
        }
        Step::DefineAsset => {
            ctx.remove(SessionKey::ApplicationFields);
            if ctx.is_update() {
                ctx.remove(SessionKey::SelectedApplication);
                ctx.remove(SessionKey::ApplicationDraft);
            } else {
                ctx.remove(SessionKey::OperationType);
            }
        }
        Step::Enrich => {
            ctx.remove(SessionKey::AssetDetails);
        }
        Step::RelationshipsAndSubmit => {
            ctx.remove(SessionKey::EnrichmentDetails);
        }
    }
    current_step(&ctx.snapshot())
}
