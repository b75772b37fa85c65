use anyhow::{Context, Result};
use arthur::cli::{Args, Repl};
use arthur::config::Config;
use arthur::metrics::MetricsCollector;
use arthur::{Session, TemplateStore};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "arthur=warn";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    args.apply(&mut config);

    init_logging(&config, args.verbose);

    let store = match &config.templates.path {
        Some(path) => TemplateStore::load(path)
            .with_context(|| format!("refusing to start with templates {}", path.display()))?,
        None => TemplateStore::builtin().context("built-in templates are invalid")?,
    };
    tracing::debug!(summary = %store.summary(), "templates loaded");

    if args.check {
        println!("templates OK: {}", store.summary());
        return Ok(());
    }

    let metrics = Arc::new(MetricsCollector::new()?);
    let session =
        Session::new(Arc::new(store), config.session_settings()).with_metrics(Arc::clone(&metrics));

    Repl::new(session, metrics, args.json, config.history_path()).run()
}

/// Logs go to stderr so they never mix with the conversation.
/// `ARTHUR_LOG` wins over the config file; `-v` adds crate debug output.
fn init_logging(config: &Config, verbose: bool) {
    let mut filter = EnvFilter::try_from_env("ARTHUR_LOG").unwrap_or_else(|_| {
        EnvFilter::new(config.logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });
    if verbose {
        if let Ok(directive) = "arthur=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
