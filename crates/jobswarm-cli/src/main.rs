//! jobswarm - command line front end for the job-application swarm.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands, LogFormat};
use commands::AppContext;

fn init_logging(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobswarm=info,jobswarm_cli=info"));
    let json = format == LogFormat::Json;

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| fmt::layer().with_target(false).compact()))
        .with(json.then(|| fmt::layer().json()));
    tracing::subscriber::set_global_default(subscriber)?;

    // The ledger's storage layer logs through `log`.
    LogTracer::init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let ctx = AppContext::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::init(&ctx)?,
        Commands::Run(args) => commands::run(ctx, args).await?,
        Commands::Stats(args) => commands::stats(&ctx, args)?,
        Commands::Portals => commands::portals(&ctx)?,
        Commands::Session(command) => commands::session(&ctx, command)?,
        Commands::Vault(command) => commands::vault(&ctx, command)?,
        Commands::MarkInterview { fingerprint } => commands::mark_interview(&ctx, &fingerprint)?,
        Commands::RequeueStale { older_than } => commands::requeue_stale(&ctx, older_than)?,
    }

    Ok(())
}
