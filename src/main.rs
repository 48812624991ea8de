use anyhow::{Context, Result};
use app_builder::app::App;
use app_builder::cli::{CheckArgs, Command, ConnectionArgs, RootArgs, RunArgs};
use app_builder::report::TerminalReporter;
use app_builder::session::WorkflowContext;
use app_builder::settings::{resolve_settings, Settings};
use app_builder::terminal::TerminalForms;
use clap::Parser;
use serde::Serialize;
use std::rc::Rc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "APPB_LOG";

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| "app_builder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Run(args) => run(args),
        Command::Check(args) => check(args),
    }
}

fn connect(connection: &ConnectionArgs) -> Result<(App, WorkflowContext)> {
    let settings = resolve_settings(connection.config.as_deref())?;
    let app = App::with_http(settings, Rc::new(TerminalReporter));
    let mut ctx = WorkflowContext::new();
    app.connect(&mut ctx, &connection.url, &connection.token)?;
    Ok((app, ctx))
}

fn run(args: RunArgs) -> Result<()> {
    let (app, mut ctx) = connect(&args.connection)?;
    let mut forms = TerminalForms::stdio();
    let reports = app.run(&mut ctx, &mut forms);
    println!("Submitted {} application(s).", reports.len());
    Ok(())
}

#[derive(Serialize)]
struct CheckSummary<'a> {
    base_url: Option<&'a str>,
    username: Option<&'a str>,
    settings: &'a Settings,
}

fn check(args: CheckArgs) -> Result<()> {
    let (app, ctx) = connect(&args.connection)?;
    let summary = CheckSummary {
        base_url: ctx.base_url(),
        username: ctx.user().and_then(|user| user.username.as_deref()),
        settings: app.settings(),
    };
    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize check summary")?;
        println!("{text}");
    } else {
        println!("base_url: {}", summary.base_url.unwrap_or("-"));
        println!("user: {}", summary.username.unwrap_or("<unknown>"));
        println!("field_batch_size: {}", summary.settings.field_batch_size);
        println!(
            "timeouts: connect {}s, read {}s",
            summary.settings.connect_timeout_secs, summary.settings.read_timeout_secs
        );
    }
    Ok(())
}
