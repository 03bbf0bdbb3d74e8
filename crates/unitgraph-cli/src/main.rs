//! unitgraph - installable-unit dependency resolution CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use unitgraph_cli::cmd;
use unitgraph_cli::context::Context;
use unitgraph_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::discover(&cli)?;
    if let Some(path) = &ctx.manifest_path {
        tracing::debug!("Using manifest {}", path.display());
    }

    match &cli.command {
        Commands::Resolve(args) => cmd::resolve::resolve(&ctx, args, cli.json),
        Commands::Info { unit } => cmd::info::info(&ctx, unit, cli.json),
        Commands::Providers { namespace, name } => {
            cmd::providers::providers(&ctx, namespace, name, cli.json)
        }
        Commands::Stats => cmd::stats::stats(&ctx, cli.json),
    }
}
