use crate::backend::http::HttpConnector;
use crate::backend::{Connector, Principal};
use crate::catalog::Catalog;
use crate::gateway::Gateway;
use crate::report::Reporter;
use crate::session::WorkflowContext;
use crate::settings::Settings;
use crate::workflow::{Forms, Steps, SubmissionReport, Submitter};
use anyhow::{Context, Result};
use std::rc::Rc;

pub struct App {
    settings: Settings,
    reporter: Rc<dyn Reporter>,
    gateway: Rc<Gateway>,
    catalog: Catalog,
    submitter: Submitter,
}

impl App {
    pub fn new(settings: Settings, connector: Box<dyn Connector>, reporter: Rc<dyn Reporter>) -> Self {
        let gateway = Rc::new(Gateway::new(connector, reporter.clone()));
        let catalog = Catalog::new(gateway.clone(), reporter.clone(), settings.search.clone());
        let submitter = Submitter::new(gateway.clone(), reporter.clone(), settings.field_batch_size);
        Self {
            settings,
            reporter,
            gateway,
            catalog,
            submitter,
        }
    }

    /// App backed by the catalog's REST API.
    pub fn with_http(settings: Settings, reporter: Rc<dyn Reporter>) -> Self {
        let connector = HttpConnector::new(settings.timeouts());
        Self::new(settings, Box::new(connector), reporter)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    /// Connect and validate, reporting the outcome. A failure leaves the
    /// session untouched.
    pub fn connect(&self, ctx: &mut WorkflowContext, url: &str, api_token: &str) -> Result<Principal> {
        match self.gateway.connect(ctx, url, api_token) {
            Ok(user) => {
                self.reporter.success(&format!(
                    "Connected as {}",
                    user.username.as_deref().unwrap_or("<unknown user>")
                ));
                Ok(user)
            }
            Err(err) => {
                self.reporter.error(&format!("Connection failed: {err}"));
                Err(err).with_context(|| format!("connect to {url}"))
            }
        }
    }

    pub fn steps(&self) -> Steps<'_> {
        Steps::new(&self.catalog, &self.submitter, self.reporter.as_ref())
    }

    /// Drive the workflow until the forms quit.
    pub fn run(&self, ctx: &mut WorkflowContext, forms: &mut dyn Forms) -> Vec<SubmissionReport> {
        let reports = self.steps().run(ctx, forms);
        tracing::info!(submissions = reports.len(), "workflow finished");
        reports
    }
}
