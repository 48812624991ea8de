//! Step handlers: show the form for the active step and commit its result.
//!
//! A handler only ever adds the key that completes its step (or removes the
//! one that gates it on `GoBack`). Validation failures are reported and leave
//! the session unchanged, so the same step is shown again.
use super::forms::{
    build_asset_details, build_enrichment, check_search_term, DefineAssetView, EnrichView,
    FormAction, Forms, RelationshipsAction, RelationshipsView, SelectApplication,
    SelectApplicationView,
};
use super::state::{current_step, go_back, Step};
use super::submit::{SubmissionReport, Submitter};
use crate::catalog::{filter_api_connections, Catalog};
use crate::labels::Labeled;
use crate::report::Reporter;
use crate::session::{clear_workflow_state, ApplicationSummary, AssetDetails, WorkflowContext};

/// What the driver loop should do after a step.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Submitted(Box<SubmissionReport>),
    Quit,
}

pub struct Steps<'a> {
    catalog: &'a Catalog,
    submitter: &'a Submitter,
    reporter: &'a dyn Reporter,
}

impl<'a> Steps<'a> {
    pub fn new(catalog: &'a Catalog, submitter: &'a Submitter, reporter: &'a dyn Reporter) -> Self {
        Self {
            catalog,
            submitter,
            reporter,
        }
    }

    /// Run the active step once.
    pub fn advance(&self, ctx: &mut WorkflowContext, forms: &mut dyn Forms) -> Flow {
        let step = current_step(&ctx.snapshot());
        tracing::debug!(?step, "showing step");
        match step {
            Step::ChooseOperation => self.choose_operation(ctx, forms),
            Step::SelectExistingApplication => self.select_application(ctx, forms),
            Step::DefineAsset => self.define_asset(ctx, forms),
            Step::Enrich => self.enrich(ctx, forms),
            Step::RelationshipsAndSubmit => self.relationships(ctx, forms),
        }
    }

    /// Drive steps until the user quits; returns every completed submission.
    pub fn run(&self, ctx: &mut WorkflowContext, forms: &mut dyn Forms) -> Vec<SubmissionReport> {
        let mut reports = Vec::new();
        loop {
            match self.advance(ctx, forms) {
                Flow::Continue => {}
                Flow::Submitted(report) => reports.push(*report),
                Flow::Quit => return reports,
            }
        }
    }

    /// Shared handling of the non-submit actions.
    fn navigate<T>(&self, ctx: &mut WorkflowContext, action: FormAction<T>) -> Result<T, Flow> {
        match action {
            FormAction::Submit(value) => Ok(value),
            FormAction::GoBack => {
                let step = go_back(ctx);
                tracing::debug!(?step, "went back");
                Err(Flow::Continue)
            }
            FormAction::StartOver => {
                clear_workflow_state(ctx);
                self.reporter.info("Starting over.");
                Err(Flow::Continue)
            }
            FormAction::Quit => Err(Flow::Quit),
        }
    }

    pub fn choose_operation(&self, ctx: &mut WorkflowContext, forms: &mut dyn Forms) -> Flow {
        match self.navigate(ctx, forms.choose_operation()) {
            Ok(operation) => {
                ctx.set_operation_type(operation);
                Flow::Continue
            }
            Err(flow) => flow,
        }
    }

    /// Search until the user picks an application, then load its fields and
    /// seed the draft.
    pub fn select_application(&self, ctx: &mut WorkflowContext, forms: &mut dyn Forms) -> Flow {
        let settings = self.catalog.settings();
        let mut results: Option<Labeled<ApplicationSummary>> = None;
        loop {
            let view = SelectApplicationView {
                min_search_chars: settings.min_search_chars,
                results: results.as_ref(),
            };
            let choice = match self.navigate(ctx, forms.select_application(&view)) {
                Ok(choice) => choice,
                Err(flow) => return flow,
            };
            match choice {
                SelectApplication::Search(term) => {
                    match check_search_term(&term, settings.min_search_chars) {
                        Ok(term) => {
                            let found = self.catalog.search_applications(ctx, term);
                            if found.is_empty() {
                                self.reporter
                                    .info(&format!("No applications found matching '{term}'"));
                            }
                            results = Some(found);
                        }
                        Err(err) => self.reporter.warning(&err.to_string()),
                    }
                }
                SelectApplication::Pick(label) => {
                    let Some(selected) = results.as_ref().and_then(|r| r.get(&label)).cloned()
                    else {
                        self.reporter.warning(&format!("Unknown selection: {label}"));
                        continue;
                    };
                    let fields = self.catalog.load_fields(ctx, &selected.qualified_name);
                    tracing::info!(
                        qualified_name = %selected.qualified_name,
                        fields = fields.len(),
                        "application selected"
                    );
                    ctx.set_application_draft(AssetDetails::from_selection(&selected, fields));
                    ctx.set_selected_application(selected);
                    return Flow::Continue;
                }
            }
        }
    }

    pub fn define_asset(&self, ctx: &mut WorkflowContext, forms: &mut dyn Forms) -> Flow {
        let Some(operation) = ctx.operation_type() else {
            return Flow::Continue;
        };
        let fields = ctx.application_fields();
        let draft = ctx.application_draft().cloned();
        let selected = ctx.selected_application().cloned();
        let connections = if operation.is_update() {
            Vec::new()
        } else {
            filter_api_connections(&self.catalog.list_connections(ctx))
        };
        let view = DefineAssetView {
            operation,
            fields: &fields,
            default_name: draft.as_ref().map_or("", |d| d.name.as_str()),
            default_app_id: draft.as_ref().map_or("", |d| d.app_id.as_str()),
            api_connections: &connections,
            locked_connection: draft
                .as_ref()
                .and_then(|d| d.connection_qualified_name.as_deref()),
            selected: selected.as_ref(),
        };
        let input = match self.navigate(ctx, forms.define_asset(&view)) {
            Ok(input) => input,
            Err(flow) => return flow,
        };
        // Keep edits even if validation fails below.
        ctx.set_application_fields(input.fields.clone());
        match build_asset_details(operation, draft.as_ref(), input) {
            Ok(details) => {
                ctx.set_asset_details(details);
            }
            Err(err) => self.reporter.error(&err.to_string()),
        }
        Flow::Continue
    }

    pub fn enrich(&self, ctx: &mut WorkflowContext, forms: &mut dyn Forms) -> Flow {
        let Some(operation) = ctx.operation_type() else {
            return Flow::Continue;
        };
        let owners = self.catalog.list_owners(ctx);
        let tags = self.catalog.list_tags(ctx);
        let application_name = ctx
            .asset_details()
            .map(|details| details.name.clone())
            .unwrap_or_default();
        let default_description = if operation.is_update() {
            ctx.selected_application()
                .and_then(|app| app.description.clone())
                .unwrap_or_default()
        } else {
            String::new()
        };
        let view = EnrichView {
            operation,
            application_name: &application_name,
            default_description: &default_description,
            owners: &owners,
            tags: &tags,
        };
        let input = match self.navigate(ctx, forms.enrich(&view)) {
            Ok(input) => input,
            Err(flow) => return flow,
        };
        match build_enrichment(input, &owners, &tags) {
            Ok(details) => ctx.set_enrichment_details(details),
            Err(err) => self.reporter.error(&err.to_string()),
        }
        Flow::Continue
    }

    /// Asset searches feed the relationship pickers; submit runs the writes.
    pub fn relationships(&self, ctx: &mut WorkflowContext, forms: &mut dyn Forms) -> Flow {
        let Some(operation) = ctx.operation_type() else {
            return Flow::Continue;
        };
        let min_chars = self.catalog.settings().min_search_chars;
        loop {
            let application_name = ctx
                .asset_details()
                .map(|details| details.name.clone())
                .unwrap_or_default();
            let search_results = ctx.search_results().cloned().unwrap_or_default();
            let view = RelationshipsView {
                operation,
                application_name: &application_name,
                search_results: &search_results,
            };
            let action = match self.navigate(ctx, forms.relationships(&view)) {
                Ok(action) => action,
                Err(flow) => return flow,
            };
            match action {
                RelationshipsAction::Search(term) => match check_search_term(&term, min_chars) {
                    Ok(term) => {
                        let found = self.catalog.search_assets(ctx, term);
                        if found.is_empty() {
                            self.reporter
                                .info(&format!("No assets found matching '{term}'"));
                        }
                        ctx.set_search_results(found);
                    }
                    Err(err) => self.reporter.warning(&err.to_string()),
                },
                RelationshipsAction::Submit(relationships) => {
                    return match self.submitter.submit(ctx, &relationships) {
                        Ok(report) => Flow::Submitted(Box::new(report)),
                        Err(err) => {
                            tracing::error!(error = %err, "submission failed");
                            self.reporter.error(&err.to_string());
                            Flow::Continue
                        }
                    };
                }
            }
        }
    }
}
