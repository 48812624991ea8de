//! The guided create/update workflow.
//!
//! `state` decides which step is active, `steps` runs one step against a
//! [`Forms`] implementation, and `submit` performs the writes at the end.
pub mod fields;
pub mod forms;
pub mod state;
pub mod steps;
pub mod submit;

pub use forms::{
    ConnectionChoice, DefineAssetInput, DefineAssetView, EnrichInput, EnrichView, FormAction,
    Forms, Relationships, RelationshipsAction, RelationshipsView, SelectApplication,
    SelectApplicationView, ValidationError,
};
pub use state::{current_step, go_back, Step};
pub use steps::{Flow, Steps};
pub use submit::{LinkState, OwnedAssetsOutcome, StepStatus, SubmissionReport, SubmitError, Submitter};
